//! Kalshi Parlay RFQ Auto-Quoter
//!
//! Top-level crate tying the workspace together:
//!
//! - **bin_common**: shared utilities for the binaries (config paths, args)
//! - **kalshi**: quoting logic, feed wiring, and the REST client
//! - **feedsock**: the WebSocket session library

pub use feedsock;
pub use kalshi;

pub mod bin_common {
    //! Shared utilities for binary executables

    pub mod cli;

    pub use cli::{config_path, parse_args};
}
