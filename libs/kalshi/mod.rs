//! Kalshi Parlay RFQ Auto-Quoter
//!
//! Listens to Kalshi's communications (RFQ) feed, catalogs the parlay legs it
//! sees, and automatically answers RFQs that contain a user-selected target
//! set of legs with a fixed-price quote.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod utils;

// Re-export commonly used items
pub use application::{
    engine::QuoteEngine,
    quoter::{Quoter, QuoterHandle, StartError},
    store::{ConnectionStatus, FeedStore, StateSnapshot},
};
pub use config::{ConfigError, QuoterConfig};
pub use domain::{
    CommandError, Leg, LegCatalog, MatchMode, PriceConfig, Quote, QuoteStatus, Rfq, RfqStatus,
    Side, TargetMatcher,
};
pub use infrastructure::{
    client::{
        auth::{AuthError, AuthHeaders, FeedAuthHeaders, KalshiSigner},
        feed::{FeedMessage, FeedRoute, FeedRouter},
        rest::{RestError, TradingClient},
    },
    logging::init_tracing,
};
pub use utils::ShutdownManager;
