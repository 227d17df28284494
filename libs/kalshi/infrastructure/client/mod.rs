pub mod auth;
pub mod feed;
pub mod rest;

pub use auth::{AuthError, AuthHeaders, FeedAuthHeaders, KalshiSigner};
pub use feed::{FeedMessage, FeedRoute, FeedRouter};
pub use rest::{RestError, TradingClient};
