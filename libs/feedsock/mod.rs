//! # FeedSock
//!
//! A WebSocket feed-session library for venue data feeds that must be
//! consumed in delivery order.
//!
//! ## Features
//!
//! - **Ordered delivery**: Frames are decoded inline on the socket task and
//!   forwarded per-route over unbounded crossbeam channels, so a handler sees
//!   events in exactly the order the server sent them
//! - **Signed handshakes**: Pluggable [`HeaderProvider`] generates fresh HTTP
//!   headers on every connection attempt (timestamps, signatures, tokens)
//! - **Session supervision**: Heartbeats, a liveness timeout that tears down
//!   stalled connections, and jittered exponential reconnect backoff
//! - **Subscription replay**: Configured subscriptions are re-sent after every
//!   successful (re)connection

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use core::{
    builder::FeedClientBuilder,
    client::{ClientEvent, FeedClient, Metrics},
    config::ClientConfig,
    state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
};

/// Type alias for Result with FeedSockError
pub type Result<T> = std::result::Result<T, traits::FeedSockError>;
