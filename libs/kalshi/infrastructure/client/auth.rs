//! Request signing for the Kalshi API
//!
//! Every authenticated request (REST call or WebSocket upgrade) carries three
//! headers derived from an RSA-PSS signature over
//! `{timestamp_ms}{METHOD}{path}`, where the path excludes any query string.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use feedsock::{FeedSockError, HeaderProvider, Headers};
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::{Signature, SigningKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Signing errors; both are fatal and surface before any connection attempt
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Signing failure: {0}")]
    SigningFailure(String),
}

/// The three headers Kalshi expects on an authenticated request
#[derive(Debug, Clone)]
pub struct AuthHeaders {
    pub key_id: String,
    pub timestamp_ms: i64,
    pub signature: String,
}

impl AuthHeaders {
    pub fn into_map(self) -> HashMap<String, String> {
        HashMap::from([
            ("KALSHI-ACCESS-KEY".to_string(), self.key_id),
            (
                "KALSHI-ACCESS-TIMESTAMP".to_string(),
                self.timestamp_ms.to_string(),
            ),
            ("KALSHI-ACCESS-SIGNATURE".to_string(), self.signature),
        ])
    }
}

/// RSA-PSS request signer
///
/// Key material is parsed once at construction; a parse failure aborts
/// startup before anything touches the network.
pub struct KalshiSigner {
    key_id: String,
    private_key: Arc<RsaPrivateKey>,
}

impl KalshiSigner {
    /// Parse a PKCS#8 PEM private key (escaped `\n` sequences allowed)
    pub fn new(key_id: impl Into<String>, private_key_pem: &str) -> Result<Self, AuthError> {
        let pem = private_key_pem.replace("\\n", "\n");
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| AuthError::InvalidKeyMaterial(e.to_string()))?;

        Ok(Self {
            key_id: key_id.into(),
            private_key: Arc::new(private_key),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign a request with a caller-supplied timestamp
    ///
    /// The canonical message is `{timestamp_ms}{METHOD}{path}` with any query
    /// string stripped from the path. PSS uses SHA-256 with a digest-length
    /// salt, so signatures differ between calls; the message they cover does
    /// not.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        timestamp_ms: i64,
    ) -> Result<AuthHeaders, AuthError> {
        let path = path.split('?').next().unwrap_or(path);
        let message = format!("{}{}{}", timestamp_ms, method, path);
        debug!("Signing message: {}", message);

        let signing_key = SigningKey::<Sha256>::new((*self.private_key).clone());
        let signature: Signature = signing_key
            .try_sign_with_rng(&mut rand::thread_rng(), message.as_bytes())
            .map_err(|e| AuthError::SigningFailure(e.to_string()))?;

        Ok(AuthHeaders {
            key_id: self.key_id.clone(),
            timestamp_ms,
            signature: BASE64.encode(signature.to_bytes()),
        })
    }

    /// Sign a request stamped with the current time
    pub fn auth_headers(&self, method: &str, path: &str) -> Result<AuthHeaders, AuthError> {
        self.sign(method, path, Utc::now().timestamp_millis())
    }
}

/// Adapts the signer to the feed session's header provider
///
/// Produces fresh signed headers for the WebSocket upgrade on every
/// (re)connection attempt.
pub struct FeedAuthHeaders {
    signer: Arc<KalshiSigner>,
    path: String,
}

impl FeedAuthHeaders {
    pub fn new(signer: Arc<KalshiSigner>, ws_path: impl Into<String>) -> Self {
        Self {
            signer,
            path: ws_path.into(),
        }
    }
}

#[async_trait]
impl HeaderProvider for FeedAuthHeaders {
    async fn connect_headers(&self) -> feedsock::Result<Headers> {
        let headers = self
            .signer
            .auth_headers("GET", &self.path)
            .map_err(|e| FeedSockError::Headers(e.to_string()))?;
        Ok(headers.into_map())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::pss::VerifyingKey;
    use rsa::signature::Verifier;
    use rsa::RsaPublicKey;

    fn test_key() -> (String, RsaPublicKey) {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .unwrap()
            .to_string();
        (pem, public_key)
    }

    fn verify(public_key: &RsaPublicKey, message: &str, signature_b64: &str) -> bool {
        let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
        let bytes = BASE64.decode(signature_b64).unwrap();
        let signature = Signature::try_from(bytes.as_slice()).unwrap();
        verifying_key.verify(message.as_bytes(), &signature).is_ok()
    }

    #[test]
    fn signature_verifies_over_canonical_message() {
        let (pem, public_key) = test_key();
        let signer = KalshiSigner::new("key-1", &pem).unwrap();

        let headers = signer.sign("GET", "/trade-api/ws/v2", 1_700_000_000_000).unwrap();
        assert_eq!(headers.key_id, "key-1");
        assert_eq!(headers.timestamp_ms, 1_700_000_000_000);
        assert!(verify(
            &public_key,
            "1700000000000GET/trade-api/ws/v2",
            &headers.signature
        ));
    }

    #[test]
    fn query_string_is_excluded_from_signature() {
        let (pem, public_key) = test_key();
        let signer = KalshiSigner::new("key-1", &pem).unwrap();

        let headers = signer
            .sign(
                "GET",
                "/trade-api/v2/communications/rfqs?cursor=abc",
                1_700_000_000_000,
            )
            .unwrap();
        assert!(verify(
            &public_key,
            "1700000000000GET/trade-api/v2/communications/rfqs",
            &headers.signature
        ));
    }

    #[test]
    fn bad_pem_is_rejected_up_front() {
        let err = KalshiSigner::new("key-1", "not a pem").err();
        assert!(matches!(err, Some(AuthError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn escaped_newlines_are_unescaped() {
        let (pem, _) = test_key();
        let escaped = pem.replace('\n', "\\n");
        assert!(KalshiSigner::new("key-1", &escaped).is_ok());
    }

    #[test]
    fn header_map_uses_kalshi_names() {
        let (pem, _) = test_key();
        let signer = KalshiSigner::new("key-1", &pem).unwrap();
        let map = signer
            .sign("POST", "/trade-api/v2/communications/quotes", 1)
            .unwrap()
            .into_map();

        assert_eq!(map["KALSHI-ACCESS-KEY"], "key-1");
        assert_eq!(map["KALSHI-ACCESS-TIMESTAMP"], "1");
        assert!(map.contains_key("KALSHI-ACCESS-SIGNATURE"));
    }
}
