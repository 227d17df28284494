//! Communications feed wiring: message types, router, and session setup

pub mod client;
pub mod router;
pub mod types;

pub use client::{connect_feed, subscribe_command};
pub use router::{FeedRoute, FeedRouter};
pub use types::{ErrorPayload, FeedMessage, QuotePayload, RfqIdPayload, RfqLeg, RfqPayload};
