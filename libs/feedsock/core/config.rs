use crate::traits::*;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a [`FeedClient`](crate::FeedClient) session
///
/// Built by [`FeedClientBuilder`](crate::FeedClientBuilder); not constructed
/// directly.
pub struct ClientConfig<R>
where
    R: MessageRouter,
{
    /// WebSocket URL (wss:// or ws://)
    pub(crate) url: String,

    /// Router for decoding and routing frames
    pub(crate) router: Arc<R>,

    /// Channel senders mapped by route key
    pub(crate) route_senders: HashMap<R::RouteKey, crossbeam_channel::Sender<R::Event>>,

    /// Optional header provider for the upgrade request
    pub(crate) headers: Option<Arc<dyn HeaderProvider>>,

    /// Optional heartbeat configuration (interval, payload)
    pub(crate) heartbeat: Option<(Duration, WsMessage)>,

    /// Tear down the connection if no server traffic arrives for this long
    pub(crate) liveness_timeout: Option<Duration>,

    /// Reconnection policy
    pub(crate) reconnect_policy: Box<dyn ReconnectPolicy>,

    /// Subscription messages replayed after every (re)connection
    pub(crate) subscriptions: Vec<WsMessage>,

    /// Shutdown flag - when false, prevents reconnection attempts
    pub(crate) shutdown_flag: Arc<AtomicBool>,
}

impl<R> ClientConfig<R>
where
    R: MessageRouter,
{
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_heartbeat(&self) -> bool {
        self.heartbeat.is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn handler_count(&self) -> usize {
        self.route_senders.len()
    }
}
