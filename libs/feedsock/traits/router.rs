//! Message routing system
//!
//! The session task decodes every frame inline, in receive order, and pushes
//! the resulting event onto the channel for its route key. Each route is
//! drained by a dedicated OS thread running an [`EventHandler`].
//!
//! ```text
//! WebSocket → decode (socket task) → route key → channel → handler thread
//! ```
//!
//! # Ordering
//!
//! Decoding happens on the socket task itself, never in a spawned task, so a
//! route's channel receives events in exactly the order the server delivered
//! the frames. Handlers on different routes run in parallel, but any single
//! route is strictly sequential.

use crate::{Result, WsMessage};
use std::fmt::Debug;
use std::hash::Hash;

/// Decodes raw frames into typed events and assigns them to routes
///
/// The router has two responsibilities:
/// 1. Decode the raw WebSocket frame into a typed event
/// 2. Extract a route key that determines which handler processes it
///
/// Decoding runs on the session's socket task, so it must be synchronous and
/// cheap. Anything expensive belongs in the handler.
pub trait MessageRouter: Send + Sync + 'static {
    /// The decoded event type
    type Event: Send + Debug + 'static;

    /// The route key type (determines which handler processes the event)
    type RouteKey: Hash + Eq + Clone + Send + Sync + Debug + 'static;

    /// Decode a raw WebSocket frame into a typed event
    ///
    /// Called for every text/binary frame received. Decode errors are logged
    /// and the frame is dropped; they do not tear down the connection.
    fn decode(&self, message: WsMessage) -> Result<Self::Event>;

    /// Extract the route key from a decoded event
    ///
    /// Events with the same route key are processed sequentially in order.
    /// Events with different route keys are processed in parallel.
    fn route_key(&self, event: &Self::Event) -> Self::RouteKey;
}

/// Processes events for one route, sequentially, on a dedicated OS thread
///
/// # Errors
/// If `handle` returns an error it is logged and the handler thread continues
/// with the next event.
pub trait EventHandler<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    /// Handle a decoded event
    ///
    /// Runs on a dedicated OS thread, not in an async context, so blocking
    /// work is fine here.
    fn handle(&mut self, event: M) -> Result<()>;
}
