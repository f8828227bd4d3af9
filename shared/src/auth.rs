//! Session token verification.
//!
//! The identity provider issues signed JWT session tokens; we only check
//! the signature and expiry and trust `sub` as the user id.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::{Config, Error, Result};

/// Name of the cookie the identity provider stores the session token in.
pub const SESSION_COOKIE: &str = "__session";

/// JWT claims of an identity provider session token.
#[derive(Debug, Deserialize)]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration
    pub exp: i64,
}

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Identity provider user id, used for all ownership scoping
    pub user_id: String,
}

impl From<SessionClaims> for AuthenticatedUser {
    fn from(claims: SessionClaims) -> Self {
        Self { user_id: claims.sub }
    }
}

/// Resolves a session token to a user.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser>;
}

/// Verifies session tokens locally against the provider's signing key.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// RS256 verifier from the provider's PEM public key.
    pub fn from_rsa_pem(pem: &str, issuer: Option<&str>) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid JWT public key: {}", e)))?;
        Ok(Self::new(key, Algorithm::RS256, issuer))
    }

    /// HS256 verifier from a shared secret.
    pub fn from_secret(secret: &[u8], issuer: Option<&str>) -> Self {
        Self::new(DecodingKey::from_secret(secret), Algorithm::HS256, issuer)
    }

    /// Build from `AUTH_JWT_PUBLIC_KEY`, falling back to `AUTH_JWT_SECRET`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let issuer = config.auth_issuer.as_deref();
        match (&config.auth_public_key, &config.auth_secret) {
            (Some(pem), _) => Self::from_rsa_pem(pem, issuer),
            (None, Some(secret)) => Ok(Self::from_secret(secret.as_bytes(), issuer)),
            (None, None) => Err(Error::Config(
                "AUTH_JWT_PUBLIC_KEY or AUTH_JWT_SECRET must be set".to_string(),
            )),
        }
    }

    fn new(key: DecodingKey, algorithm: Algorithm, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 5;
        validation.validate_aud = false;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self { key, validation }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(Error::Auth("Missing session token".to_string()));
        }

        let token_data = decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| Error::Auth(format!("Failed to verify token: {}", e)))?;

        Ok(token_data.claims.into())
    }
}

/// Extract user from API Gateway request context.
///
/// When an authorizer sits in front of the function the token is already
/// verified and its claims are in requestContext.authorizer.claims
pub fn extract_user_from_context(claims: &serde_json::Value) -> Result<AuthenticatedUser> {
    let sub = claims
        .get("sub")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Auth("Missing sub claim".to_string()))?;

    Ok(AuthenticatedUser {
        user_id: sub.to_string(),
    })
}

/// Pull the session token out of a `Cookie` header.
pub fn session_cookie(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
