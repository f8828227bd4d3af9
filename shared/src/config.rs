//! Configuration management for Lambda functions.

use std::env;

use crate::{Error, Result};

/// Application configuration loaded from environment variables.
///
/// Each binary only needs a subset of these, so everything is optional here
/// and checked by the accessor that needs it.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Allowed cross-origin caller (the web client)
    pub client_url: Option<String>,
    /// Postgres connection string
    pub database_url: Option<String>,
    /// PEM-encoded RS256 public key of the identity provider
    pub auth_public_key: Option<String>,
    /// HS256 shared secret, used when no public key is configured
    pub auth_secret: Option<String>,
    /// Expected `iss` claim
    pub auth_issuer: Option<String>,
    /// Image CDN endpoint
    pub imagekit_endpoint: Option<String>,
    /// Image CDN public key
    pub imagekit_public_key: Option<String>,
    /// Image CDN private key, used to sign upload parameters
    pub imagekit_private_key: Option<String>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{} not set", name)))
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            client_url: env::var("CLIENT_URL").ok(),
            database_url: env::var("DATABASE_URL").ok(),
            auth_public_key: env::var("AUTH_JWT_PUBLIC_KEY").ok(),
            auth_secret: env::var("AUTH_JWT_SECRET").ok(),
            auth_issuer: env::var("AUTH_ISSUER").ok(),
            imagekit_endpoint: env::var("IMAGEKIT_ENDPOINT").ok(),
            imagekit_public_key: env::var("IMAGEKIT_PUBLIC_KEY").ok(),
            imagekit_private_key: env::var("IMAGEKIT_PRIVATE_KEY").ok(),
        }
    }

    pub fn database_url(&self) -> Result<&str> {
        required(&self.database_url, "DATABASE_URL")
    }

    pub fn imagekit_endpoint(&self) -> Result<&str> {
        required(&self.imagekit_endpoint, "IMAGEKIT_ENDPOINT")
    }

    pub fn imagekit_public_key(&self) -> Result<&str> {
        required(&self.imagekit_public_key, "IMAGEKIT_PUBLIC_KEY")
    }

    pub fn imagekit_private_key(&self) -> Result<&str> {
        required(&self.imagekit_private_key, "IMAGEKIT_PRIVATE_KEY")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url() {
        assert!(matches!(Config::default().database_url(), Err(Error::Config(_))));

        let config = Config {
            database_url: Some("postgres://localhost/chats".to_string()),
            ..Default::default()
        };
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/chats");
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let config = Config {
            imagekit_private_key: Some(String::new()),
            ..Default::default()
        };
        assert!(config.imagekit_private_key().is_err());
        assert!(config.imagekit_endpoint().is_err());
        assert!(config.imagekit_public_key().is_err());
    }
}
