//! Signed parameters for direct browser uploads to ImageKit.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha1::Sha1;
use uuid::Uuid;

use crate::{Config, Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// How long issued upload parameters stay valid, in seconds.
pub const UPLOAD_AUTH_TTL_SECS: i64 = 30 * 60;

/// Parameters the client sends along with an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAuth {
    pub token: String,
    pub expire: i64,
    pub signature: String,
    /// Account public key the browser SDK uploads with
    pub public_key: String,
    /// Endpoint uploaded images are served from
    pub url_endpoint: String,
}

/// Issues upload authorization parameters.
pub trait UploadSigner: Send + Sync {
    fn issue(&self) -> Result<UploadAuth>;
}

/// ImageKit client-side upload signer.
pub struct ImageKitSigner {
    private_key: String,
    public_key: String,
    url_endpoint: String,
}

impl ImageKitSigner {
    pub fn new(
        private_key: impl Into<String>,
        public_key: impl Into<String>,
        url_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            private_key: private_key.into(),
            public_key: public_key.into(),
            url_endpoint: url_endpoint.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.imagekit_private_key()?,
            config.imagekit_public_key()?,
            config.imagekit_endpoint()?,
        ))
    }

    /// hex(HMAC-SHA1(private_key, token + expire))
    pub fn sign(&self, token: &str, expire: i64) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(self.private_key.as_bytes())
            .map_err(|e| Error::Internal(format!("Invalid signing key: {}", e)))?;
        mac.update(token.as_bytes());
        mac.update(expire.to_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl UploadSigner for ImageKitSigner {
    fn issue(&self) -> Result<UploadAuth> {
        let token = Uuid::new_v4().to_string();
        let expire = Utc::now().timestamp() + UPLOAD_AUTH_TTL_SECS;
        let signature = self.sign(&token, expire)?;

        Ok(UploadAuth {
            token,
            expire,
            signature,
            public_key: self.public_key.clone(),
            url_endpoint: self.url_endpoint.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(private_key: &str) -> ImageKitSigner {
        ImageKitSigner::new(private_key, "public_test", "https://ik.example.com/chat")
    }

    #[test]
    fn test_issue_signs_token_and_expiry() {
        let signer = signer("private_key_test");
        let auth = signer.issue().unwrap();

        assert_eq!(auth.signature.len(), 40);
        assert!(auth.signature.chars().all(|c| c.is_ascii_hexdigit()));

        let mut mac = HmacSha1::new_from_slice(b"private_key_test").unwrap();
        mac.update(format!("{}{}", auth.token, auth.expire).as_bytes());
        let expected = hex::decode(&auth.signature).unwrap();
        assert!(mac.verify_slice(&expected).is_ok());
    }

    #[test]
    fn test_issue_includes_client_settings() {
        let auth = signer("k").issue().unwrap();
        assert_eq!(auth.public_key, "public_test");
        assert_eq!(auth.url_endpoint, "https://ik.example.com/chat");

        let json = serde_json::to_value(&auth).unwrap();
        assert_eq!(json["publicKey"], "public_test");
        assert_eq!(json["urlEndpoint"], "https://ik.example.com/chat");
        assert!(json["token"].is_string());
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            imagekit_private_key: Some("private".to_string()),
            imagekit_public_key: Some("public".to_string()),
            ..Default::default()
        };
        assert!(matches!(ImageKitSigner::from_config(&config), Err(Error::Config(_))));

        let config = Config {
            imagekit_endpoint: Some("https://ik.example.com".to_string()),
            ..config
        };
        let auth = ImageKitSigner::from_config(&config).unwrap().issue().unwrap();
        assert_eq!(auth.url_endpoint, "https://ik.example.com");
    }

    #[test]
    fn test_expiry_window() {
        let before = Utc::now().timestamp();
        let auth = signer("k").issue().unwrap();
        assert!(auth.expire >= before + UPLOAD_AUTH_TTL_SECS);
        assert!(auth.expire <= Utc::now().timestamp() + UPLOAD_AUTH_TTL_SECS);
    }

    #[test]
    fn test_tokens_are_unique() {
        let signer = signer("k");
        assert_ne!(signer.issue().unwrap().token, signer.issue().unwrap().token);
    }

    #[test]
    fn test_signature_depends_on_key() {
        let a = signer("a").sign("tok", 100).unwrap();
        let b = signer("b").sign("tok", 100).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, signer("a").sign("tok", 100).unwrap());
    }
}
