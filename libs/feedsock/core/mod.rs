pub mod builder;
pub mod client;
pub mod config;
pub mod state;

// Re-export main types
pub use builder::FeedClientBuilder;
pub use client::{ClientEvent, FeedClient, Metrics};
pub use config::ClientConfig;
pub use state::{AtomicConnectionState, AtomicMetrics, ConnectionState};

// Re-export traits for convenience
pub use crate::traits::*;
