use crate::core::client::FeedClient;
use crate::core::config::ClientConfig;
use crate::traits::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Builder for [`FeedClient`]
///
/// URL and router are required up front; everything else has a default:
/// no headers, no heartbeat, no liveness timeout, never reconnect.
///
/// # Example
/// ```ignore
/// let client = FeedClientBuilder::new(url, FeedRouter)
///     .handler(FeedRoute::All, handler)
///     .headers(signer)
///     .subscription(subscribe_cmd)
///     .liveness_timeout(Duration::from_secs(30))
///     .reconnect_policy(FullJitterBackoff::new(
///         Duration::from_secs(1),
///         Duration::from_secs(30),
///         None,
///     ))
///     .build()
///     .await?;
/// ```
pub struct FeedClientBuilder<R>
where
    R: MessageRouter,
{
    url: String,
    router: Arc<R>,
    handlers: Vec<(R::RouteKey, Box<dyn EventHandler<R::Event>>)>,
    headers: Option<Arc<dyn HeaderProvider>>,
    heartbeat: Option<(Duration, WsMessage)>,
    liveness_timeout: Option<Duration>,
    reconnect_policy: Box<dyn ReconnectPolicy>,
    subscriptions: Vec<WsMessage>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl<R> FeedClientBuilder<R>
where
    R: MessageRouter,
{
    /// Start a builder for the given URL and router
    pub fn new(url: impl Into<String>, router: R) -> Self {
        Self {
            url: url.into(),
            router: Arc::new(router),
            handlers: Vec::new(),
            headers: None,
            heartbeat: None,
            liveness_timeout: None,
            reconnect_policy: Box::new(NeverReconnect),
            subscriptions: Vec::new(),
            shutdown_flag: None,
        }
    }

    /// Register a handler for a route key
    ///
    /// Each handler gets a dedicated OS thread that drains its route channel
    /// sequentially.
    pub fn handler<H>(mut self, route: R::RouteKey, handler: H) -> Self
    where
        H: EventHandler<R::Event>,
    {
        self.handlers.push((route, Box::new(handler)));
        self
    }

    /// Set the header provider for the upgrade request
    pub fn headers(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    /// Send `payload` every `interval` while connected
    pub fn heartbeat(mut self, interval: Duration, payload: WsMessage) -> Self {
        self.heartbeat = Some((interval, payload));
        self
    }

    /// Tear down the connection if no server traffic arrives for `timeout`
    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = Some(timeout);
        self
    }

    /// Set the reconnection policy
    pub fn reconnect_policy(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.reconnect_policy = Box::new(policy);
        self
    }

    /// Add a subscription message, replayed after every (re)connection
    pub fn subscription(mut self, message: WsMessage) -> Self {
        self.subscriptions.push(message);
        self
    }

    /// Share an external shutdown flag (true = running, false = shut down)
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Spawn handler threads and the session task, and connect
    pub async fn build(self) -> Result<FeedClient<R>> {
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(FeedSockError::Configuration(format!(
                "URL must start with ws:// or wss://, got: {}",
                self.url
            )));
        }
        if self.handlers.is_empty() {
            return Err(FeedSockError::Configuration(
                "at least one handler is required".into(),
            ));
        }

        let shutdown_flag = self
            .shutdown_flag
            .unwrap_or_else(|| Arc::new(AtomicBool::new(true)));

        let mut route_senders: HashMap<R::RouteKey, crossbeam_channel::Sender<R::Event>> =
            HashMap::new();
        let mut handler_handles = Vec::with_capacity(self.handlers.len());

        for (route, handler) in self.handlers {
            if route_senders.contains_key(&route) {
                return Err(FeedSockError::Configuration(format!(
                    "duplicate handler for route key: {:?}",
                    route
                )));
            }

            let (tx, rx) = crossbeam_channel::unbounded();
            route_senders.insert(route.clone(), tx);

            let handle = spawn_handler_thread(route, handler, rx, Arc::clone(&shutdown_flag))?;
            handler_handles.push(handle);
        }

        let config = ClientConfig {
            url: self.url,
            router: self.router,
            route_senders,
            headers: self.headers,
            heartbeat: self.heartbeat,
            liveness_timeout: self.liveness_timeout,
            reconnect_policy: self.reconnect_policy,
            subscriptions: self.subscriptions,
            shutdown_flag,
        };

        let mut client = FeedClient::new(config)?;
        client.handler_handles = handler_handles;
        Ok(client)
    }
}

/// Spawn a dedicated OS thread that drains one route channel sequentially
fn spawn_handler_thread<K, M>(
    route: K,
    mut handler: Box<dyn EventHandler<M>>,
    rx: crossbeam_channel::Receiver<M>,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<std::thread::JoinHandle<()>>
where
    K: std::fmt::Debug + Send + 'static,
    M: Send + std::fmt::Debug + 'static,
{
    std::thread::Builder::new()
        .name(format!("feedsock-{:?}", route))
        .spawn(move || {
            debug!("Handler thread started for route: {:?}", route);
            loop {
                match rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(event) => {
                        if let Err(e) = handler.handle(event) {
                            error!("Handler error on route {:?}: {}", route, e);
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        // Drain everything in flight before honoring shutdown
                        if !shutdown_flag.load(Ordering::Acquire) {
                            break;
                        }
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("Handler thread exiting for route: {:?}", route);
        })
        .map_err(|e| FeedSockError::Configuration(format!("failed to spawn handler thread: {}", e)))
}
