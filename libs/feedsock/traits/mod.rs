//! Trait definitions for feedsock
//!
//! These traits are the extension points of the library: message decoding and
//! routing, connection headers, and reconnect policies.

pub mod error;
pub mod headers;
pub mod message;
pub mod reconnect;
pub mod router;

pub use error::{FeedSockError, Result};
pub use headers::{HeaderProvider, Headers, NoHeaders};
pub use message::WsMessage;
pub use reconnect::{FullJitterBackoff, NeverReconnect, ReconnectPolicy};
pub use router::{EventHandler, MessageRouter};
