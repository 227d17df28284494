use crate::core::config::ClientConfig;
use crate::core::state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Internal command messages for session control
#[derive(Debug)]
enum ClientCommand {
    /// Send a message to the WebSocket
    Send(WsMessage),
    /// Shutdown the session
    Shutdown,
}

/// Session lifecycle events observable by the application
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connected and subscriptions sent
    Connected,
    /// Disconnected from the server
    Disconnected,
    /// Reconnecting (attempt number)
    Reconnecting(usize),
    /// Error occurred
    Error(String),
}

/// Session metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// WebSocket feed session with ordered message routing
///
/// The session owns one tokio task for socket I/O and one OS thread per
/// registered route. Frames are decoded inline on the socket task, so every
/// route channel observes events in server delivery order.
///
/// Disconnections trigger the configured reconnect policy; after each
/// successful reconnection the configured subscriptions are replayed before
/// any frame is processed.
pub struct FeedClient<R>
where
    R: MessageRouter,
{
    /// Session configuration
    config: Option<Arc<ClientConfig<R>>>,
    /// Atomic connection state
    state: Arc<AtomicConnectionState>,
    /// Atomic metrics
    metrics: Arc<AtomicMetrics>,
    /// Command channel sender
    command_tx: Sender<ClientCommand>,
    /// Event channel receiver
    event_rx: Receiver<ClientEvent>,
    /// Main task handle (tokio task for async I/O)
    task_handle: Option<tokio::task::JoinHandle<()>>,
    /// Handler thread handles (dedicated OS threads for event processing)
    pub(crate) handler_handles: Vec<std::thread::JoinHandle<()>>,
    /// Shutdown flag (true = running, false = shut down)
    shutdown_flag: Arc<AtomicBool>,
}

impl<R> FeedClient<R>
where
    R: MessageRouter,
{
    /// Create a new session from configuration
    ///
    /// Called by [`FeedClientBuilder::build`](crate::FeedClientBuilder::build).
    pub(crate) fn new(config: ClientConfig<R>) -> Result<Self> {
        let config = Arc::new(config);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());
        let shutdown_flag = Arc::clone(&config.shutdown_flag);

        let (command_tx, command_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();

        let task_handle = {
            let config = Arc::clone(&config);
            let state = Arc::clone(&state);
            let metrics = Arc::clone(&metrics);

            tokio::spawn(async move {
                run_session(config, state, metrics, command_rx, event_tx).await;
            })
        };

        Ok(Self {
            config: Some(config),
            state,
            metrics,
            command_tx,
            event_rx,
            task_handle: Some(task_handle),
            handler_handles: Vec::new(), // Builder populates this
            shutdown_flag,
        })
    }

    /// Send a message through the WebSocket
    ///
    /// Fails with [`FeedSockError::NotConnected`] while the session is
    /// disconnected or reconnecting.
    pub fn send(&self, message: WsMessage) -> Result<()> {
        if !self.state.is_connected() {
            return Err(FeedSockError::NotConnected);
        }
        self.command_tx
            .send(ClientCommand::Send(message))
            .map_err(|e| FeedSockError::ChannelSend(e.to_string()))
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Check if connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            connection_state: self.state.get(),
        }
    }

    /// Try to receive a lifecycle event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive a lifecycle event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// Get a reference to the shutdown flag
    ///
    /// External code can trigger graceful shutdown by storing `false`.
    /// The flag is checked before each reconnection attempt.
    pub fn shutdown_flag(&self) -> &Arc<AtomicBool> {
        &self.shutdown_flag
    }

    /// Shutdown the session
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down feed session");

        // Prevent reconnection, then stop the active connection
        self.shutdown_flag
            .store(false, std::sync::atomic::Ordering::Release);
        self.state.set(ConnectionState::ShuttingDown);
        let _ = self.command_tx.send(ClientCommand::Shutdown);

        // Wait for the socket task, which stops producing new events
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }

        // Drop config to close the route channels. Handler threads exit once
        // their channel disconnects and they have drained what was in flight.
        drop(self.config.take());

        debug!(
            "Waiting for {} handler threads to complete",
            self.handler_handles.len()
        );
        for handle in self.handler_handles.drain(..) {
            let _ = handle.join();
        }

        info!("Feed session shut down");
        Ok(())
    }
}

/// Main session task loop: connect, drive, back off, repeat
async fn run_session<R>(
    config: Arc<ClientConfig<R>>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_rx: Receiver<ClientCommand>,
    event_tx: Sender<ClientEvent>,
) where
    R: MessageRouter,
{
    let mut reconnect_attempt = 0;
    let shutdown_flag = &config.shutdown_flag;

    loop {
        if !shutdown_flag.load(std::sync::atomic::Ordering::Acquire) {
            debug!("Shutdown flag is false, exiting session loop");
            break;
        }
        if state.is_shutting_down() {
            debug!("Session is shutting down, exiting session loop");
            break;
        }

        state.set(if reconnect_attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        });

        if reconnect_attempt > 0 {
            let _ = event_tx.send(ClientEvent::Reconnecting(reconnect_attempt));
        }

        match establish(&config).await {
            Ok((ws_stream, _)) => {
                info!("Connected to {}", config.url);
                state.set(ConnectionState::Connected);
                let _ = event_tx.send(ClientEvent::Connected);

                reconnect_attempt = 0;

                if let Err(e) = handle_connection(
                    ws_stream,
                    Arc::clone(&config),
                    Arc::clone(&state),
                    Arc::clone(&metrics),
                    &command_rx,
                )
                .await
                {
                    error!("Connection error: {}", e);
                    let _ = event_tx.send(ClientEvent::Error(e.to_string()));
                }

                state.set(ConnectionState::Disconnected);
                let _ = event_tx.send(ClientEvent::Disconnected);
            }
            Err(e) => {
                error!("Failed to connect: {}", e);
                let fatal = matches!(e, FeedSockError::AuthRejected(_));
                let _ = event_tx.send(ClientEvent::Error(e.to_string()));
                state.set(ConnectionState::Disconnected);
                if fatal {
                    error!("Credentials rejected by server, not reconnecting");
                    break;
                }
            }
        }

        if !shutdown_flag.load(std::sync::atomic::Ordering::Acquire) {
            debug!("Shutdown flag set during connection, stopping reconnection");
            break;
        }
        if state.is_shutting_down() {
            break;
        }

        match config.reconnect_policy.next_delay(reconnect_attempt) {
            Some(delay) => {
                info!(
                    "Reconnecting in {:?} (attempt {})",
                    delay,
                    reconnect_attempt + 1
                );

                // Check the shutdown flag periodically during the backoff wait
                let check_interval = std::time::Duration::from_millis(100);
                let mut elapsed = std::time::Duration::ZERO;

                while elapsed < delay {
                    if !shutdown_flag.load(std::sync::atomic::Ordering::Acquire) {
                        debug!("Shutdown flag set during reconnection delay");
                        return;
                    }

                    let sleep_time = std::cmp::min(check_interval, delay - elapsed);
                    tokio::time::sleep(sleep_time).await;
                    elapsed += sleep_time;
                }

                reconnect_attempt += 1;
                metrics.increment_reconnects();
            }
            None => {
                warn!("Reconnect policy exhausted, stopping");
                break;
            }
        }
    }

    info!("Session task exiting");
}

/// Build the upgrade request (with fresh headers if configured) and connect
async fn establish<R>(
    config: &ClientConfig<R>,
) -> Result<(
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    http::Response<Option<Vec<u8>>>,
)>
where
    R: MessageRouter,
{
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| FeedSockError::Configuration(format!("invalid URL: {}", e)))?;

    if let Some(ref provider) = config.headers {
        // Fresh headers every attempt: signatures embed a timestamp
        let headers = provider.connect_headers().await?;

        for (key, value) in headers {
            match key.parse::<http::header::HeaderName>() {
                Ok(header_name) => match value.parse::<http::header::HeaderValue>() {
                    Ok(header_value) => {
                        request.headers_mut().insert(header_name, header_value);
                    }
                    Err(_) => {
                        warn!("Invalid header value for key '{}'", key);
                    }
                },
                Err(_) => {
                    warn!("Invalid header name: {}", key);
                }
            }
        }

        debug!("Connecting with signed headers");
    }

    connect_async(request).await.map_err(|e| match e {
        // A 401/403 on the upgrade means bad credentials, not a flaky link
        tokio_tungstenite::tungstenite::Error::Http(ref response)
            if response.status() == http::StatusCode::UNAUTHORIZED
                || response.status() == http::StatusCode::FORBIDDEN =>
        {
            FeedSockError::AuthRejected(response.status().as_u16())
        }
        other => FeedSockError::WebSocket(other.to_string()),
    })
}

/// Drive an active WebSocket connection until it fails or shuts down
async fn handle_connection<R>(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    config: Arc<ClientConfig<R>>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_rx: &Receiver<ClientCommand>,
) -> Result<()>
where
    R: MessageRouter,
{
    let (mut write, mut read) = ws_stream.split();

    // Replay subscriptions before processing anything
    for sub in &config.subscriptions {
        let msg = ws_message_to_tungstenite(sub);
        write
            .send(msg)
            .await
            .map_err(|e| FeedSockError::WebSocket(format!("Failed to send subscription: {}", e)))?;
        metrics.increment_sent();
        debug!("Sent subscription message");
    }

    message_loop(&mut write, &mut read, config, state, metrics, command_rx).await
}

/// Main message processing loop
async fn message_loop<R>(
    write: &mut futures::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        Message,
    >,
    read: &mut futures::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    >,
    config: Arc<ClientConfig<R>>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_rx: &Receiver<ClientCommand>,
) -> Result<()>
where
    R: MessageRouter,
{
    let shutdown_flag = &config.shutdown_flag;
    let mut last_rx = tokio::time::Instant::now();

    // Heartbeat ticker; the first tick fires one full interval in
    let mut heartbeat = config.heartbeat.as_ref().map(|(interval, payload)| {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + *interval, *interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        (ticker, payload)
    });

    loop {
        if !shutdown_flag.load(std::sync::atomic::Ordering::Acquire) {
            debug!("Shutdown flag detected in message loop, closing connection");
            let _ = write.close().await;
            return Ok(());
        }
        if state.is_shutting_down() {
            debug!("Shutting down state detected in message loop, closing connection");
            let _ = write.close().await;
            return Ok(());
        }

        tokio::select! {
            // Incoming frames: decode inline so route order matches wire order
            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        last_rx = tokio::time::Instant::now();
                        metrics.increment_received();

                        if let Some(ws_msg) = tungstenite_to_ws_message(msg) {
                            match config.router.decode(ws_msg) {
                                Ok(event) => {
                                    let route_key = config.router.route_key(&event);
                                    if let Some(sender) = config.route_senders.get(&route_key) {
                                        // Send failure means the channel closed,
                                        // which only happens during shutdown
                                        let _ = sender.send(event);
                                    } else {
                                        warn!("No handler configured for route key: {:?}", route_key);
                                    }
                                }
                                Err(e) => {
                                    // Malformed frames are dropped, not fatal
                                    error!("Decode error: {}", e);
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        return Err(FeedSockError::WebSocket(e.to_string()));
                    }
                    None => {
                        warn!("WebSocket stream closed");
                        return Err(FeedSockError::ConnectionClosed("Stream ended".into()));
                    }
                }
            }

            // Handle commands (use spawn_blocking with timeout to avoid blocking select)
            cmd = async {
                let rx = command_rx.clone();
                tokio::task::spawn_blocking(move || {
                    rx.recv_timeout(std::time::Duration::from_millis(100))
                }).await.ok()
            } => {
                match cmd {
                    Some(Ok(ClientCommand::Send(msg))) => {
                        let tung_msg = ws_message_to_tungstenite(&msg);
                        write.send(tung_msg).await.map_err(|e| {
                            FeedSockError::WebSocket(e.to_string())
                        })?;
                        metrics.increment_sent();
                    }
                    Some(Ok(ClientCommand::Shutdown)) => {
                        info!("Received shutdown command");
                        state.set(ConnectionState::ShuttingDown);
                        return Ok(());
                    }
                    Some(Err(_)) => {
                        // Timeout is normal, just continue the loop
                    }
                    None => {
                        debug!("Command channel closed");
                        return Ok(());
                    }
                }
            }

            // Heartbeat tick; pends forever when no heartbeat is configured
            payload = async {
                match heartbeat.as_mut() {
                    Some((ticker, payload)) => {
                        ticker.tick().await;
                        ws_message_to_tungstenite(*payload)
                    }
                    None => std::future::pending().await,
                }
            } => {
                write.send(payload).await.map_err(|e| {
                    FeedSockError::WebSocket(format!("Failed to send heartbeat: {}", e))
                })?;
                metrics.increment_sent();
                debug!("Heartbeat sent");
            }

            // Liveness: a silent server means a dead connection
            _ = liveness_expired(&config, last_rx) => {
                return Err(FeedSockError::Timeout(format!(
                    "no server traffic for {:?}",
                    config.liveness_timeout.unwrap_or_default()
                )));
            }
        }
    }
}

/// Resolves when the liveness timeout elapses with no traffic; pends forever
/// if no timeout is configured
async fn liveness_expired<R>(config: &ClientConfig<R>, last_rx: tokio::time::Instant)
where
    R: MessageRouter,
{
    match config.liveness_timeout {
        Some(timeout) => tokio::time::sleep_until(last_rx + timeout).await,
        None => std::future::pending().await,
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: &WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text.clone()),
        WsMessage::Binary(data) => Message::Binary(data.clone()),
        WsMessage::Ping(data) => Message::Ping(data.clone()),
    }
}

/// Convert tungstenite Message to WsMessage
///
/// Ping/pong/close frames still refresh the liveness clock upstream but are
/// not surfaced as messages.
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
