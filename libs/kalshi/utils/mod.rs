//! Shared utilities for quoter binaries

mod shutdown;

pub use shutdown::ShutdownManager;
