use thiserror::Error;

/// Main error type for feedsock
#[derive(Error, Debug)]
pub enum FeedSockError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Server rejected the handshake credentials; retrying cannot help
    #[error("Authentication rejected: HTTP {0}")]
    AuthRejected(u16),

    /// Handshake headers could not be produced
    #[error("Header generation failed: {0}")]
    Headers(String),

    /// Frame could not be decoded into an event
    #[error("Decode error: {0}")]
    Decode(String),

    /// Send attempted while the session is not connected
    #[error("Not connected")]
    NotConnected,

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Liveness timeout expired without server traffic
    #[error("Liveness timeout: {0}")]
    Timeout(String),
}

/// Result type for feedsock operations
pub type Result<T> = std::result::Result<T, FeedSockError>;
