//! Domain models: legs, RFQs, quotes, and the target matcher

pub mod catalog;
pub mod matcher;
pub mod models;

pub use catalog::LegCatalog;
pub use matcher::{MatchMode, TargetMatcher};
pub use models::{
    leg_id, CommandError, Leg, PriceConfig, Quote, QuoteStatus, Rfq, RfqStatus, Side,
};
