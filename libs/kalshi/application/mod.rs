//! Application layer: quote engine, feed store, and the quoter run loop

pub mod engine;
pub mod quoter;
pub mod store;

pub use engine::{EngineState, QuoteEngine};
pub use quoter::{Quoter, QuoterHandle, StartError};
pub use store::{ConnectionStatus, FeedStore, StateSnapshot};
