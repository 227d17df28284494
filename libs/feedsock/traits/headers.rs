use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// HTTP headers to send with the WebSocket upgrade request
pub type Headers = HashMap<String, String>;

/// Trait for providing HTTP headers dynamically
///
/// Implement this trait to define headers that should be sent with the
/// WebSocket connection request. This is called on every connection and
/// reconnection, so timestamped signatures are regenerated each attempt.
///
/// # Errors
/// Header generation is fallible: a provider that signs the request can fail
/// on bad key material. A failed attempt aborts the connection attempt and
/// the session falls through to its reconnect policy.
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// Generate headers for the upgrade request
    ///
    /// Called fresh for every connection attempt, including reconnections.
    async fn connect_headers(&self) -> Result<Headers>;
}

/// A no-op header provider that doesn't add any headers
pub struct NoHeaders;

#[async_trait]
impl HeaderProvider for NoHeaders {
    async fn connect_headers(&self) -> Result<Headers> {
        Ok(HashMap::new())
    }
}
