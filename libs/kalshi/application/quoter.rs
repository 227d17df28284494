//! Quoter assembly and run loop
//!
//! [`Quoter::start`] wires the signer, REST client, feed session, and quote
//! engine together. Feed events flow through one crossbeam channel into a
//! single worker thread, so every event is applied to the engine in wire
//! order. Session lifecycle events (connect, disconnect, errors) are drained
//! on the same thread between feed events.

use crate::application::engine::QuoteEngine;
use crate::application::store::StateSnapshot;
use crate::config::QuoterConfig;
use crate::domain::CommandError;
use crate::infrastructure::client::auth::{AuthError, KalshiSigner};
use crate::infrastructure::client::feed::{connect_feed, FeedMessage, FeedRouter};
use crate::infrastructure::client::rest::{RestError, TradingClient};
use crate::utils::ShutdownManager;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use feedsock::{ClientEvent, EventHandler, FeedClient, FeedSockError};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// How often the worker wakes to sweep expirations when the feed is quiet
const WORKER_TICK: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum StartError {
    #[error("Authentication setup failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Trading client setup failed: {0}")]
    Rest(#[from] RestError),

    #[error("Feed session setup failed: {0}")]
    Feed(#[from] FeedSockError),

    #[error("Worker thread failed to start: {0}")]
    Worker(#[from] std::io::Error),
}

/// Bridges the feed session's handler thread into the worker channel
struct ChannelHandler {
    tx: Sender<FeedMessage>,
}

impl EventHandler<FeedMessage> for ChannelHandler {
    fn handle(&mut self, event: FeedMessage) -> feedsock::Result<()> {
        self.tx
            .send(event)
            .map_err(|e| FeedSockError::ChannelSend(e.to_string()))
    }
}

/// Cloneable command surface over a running quoter
#[derive(Clone)]
pub struct QuoterHandle {
    engine: Arc<QuoteEngine>,
}

impl QuoterHandle {
    /// Replace the target parlay; every leg must already be in the catalog
    pub fn set_target(&self, leg_ids: Vec<String>) -> Result<(), CommandError> {
        self.engine.set_target(leg_ids)
    }

    /// Update quote prices for future RFQs; in-flight quotes are untouched
    pub fn set_prices(&self, yes_bid: Decimal, no_bid: Decimal) -> Result<(), CommandError> {
        self.engine.set_prices(yes_bid, no_bid)
    }

    pub fn set_auto_confirm(&self, enabled: bool) {
        self.engine.set_auto_confirm(enabled);
    }

    /// Manually confirm an accepted quote
    pub fn confirm(&self, quote_id: &str) -> Result<(), CommandError> {
        self.engine.confirm(quote_id)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.engine.snapshot()
    }
}

/// A running quoter: feed session, engine, and worker thread
pub struct Quoter {
    client: Option<Arc<FeedClient<FeedRouter>>>,
    worker: Option<std::thread::JoinHandle<()>>,
    engine: Arc<QuoteEngine>,
    shutdown: ShutdownManager,
}

impl Quoter {
    /// Start quoting with the given configuration
    ///
    /// Connects the signed feed session, kicks off the startup RFQ backfill,
    /// and spawns the worker thread. Returns once the session task is
    /// running; the session itself reconnects in the background.
    pub async fn start(config: QuoterConfig) -> Result<Self, StartError> {
        let signer = Arc::new(KalshiSigner::new(
            &config.api_key_id,
            &config.private_key_pem,
        )?);
        let trading = Arc::new(TradingClient::new(&config.venue.rest_url, Arc::clone(&signer))?);

        let engine = Arc::new(QuoteEngine::new(
            &config,
            trading,
            tokio::runtime::Handle::current(),
        ));

        let shutdown = ShutdownManager::new();
        let (tx, rx) = unbounded();

        let client = Arc::new(
            connect_feed(&config, signer, ChannelHandler { tx }, shutdown.flag()).await?,
        );

        // Catalog legs from RFQs that predate this session. The feed remains
        // the source of truth for quoting.
        engine.spawn_backfill();

        let worker = {
            let client = Arc::clone(&client);
            let engine = Arc::clone(&engine);
            let flag = shutdown.flag();
            std::thread::Builder::new()
                .name("quoter-worker".to_string())
                .spawn(move || worker_loop(client, rx, engine, flag))?
        };

        info!("Quoter started on {}", config.venue.ws_url);
        Ok(Self {
            client: Some(client),
            worker: Some(worker),
            engine,
            shutdown,
        })
    }

    pub fn handle(&self) -> QuoterHandle {
        QuoterHandle {
            engine: Arc::clone(&self.engine),
        }
    }

    pub fn shutdown_manager(&self) -> &ShutdownManager {
        &self.shutdown
    }

    /// Block (async) until shutdown is triggered
    pub async fn run_until_shutdown(&self) {
        while self.shutdown.is_running() {
            self.shutdown
                .interruptible_sleep(Duration::from_secs(1))
                .await;
        }
    }

    /// Stop the worker and tear down the feed session
    pub async fn shutdown(mut self) {
        info!("Shutting down quoter");
        self.shutdown.trigger();

        if let Some(worker) = self.worker.take() {
            let _ = tokio::task::spawn_blocking(move || worker.join()).await;
        }

        if let Some(client) = self.client.take() {
            match Arc::try_unwrap(client) {
                Ok(client) => {
                    if let Err(e) = client.shutdown().await {
                        warn!("Feed session shutdown error: {}", e);
                    }
                }
                Err(_) => warn!("Feed session still shared, leaving it to the shutdown flag"),
            }
        }

        info!("Quoter shut down");
    }
}

/// Single-threaded event application loop
///
/// All engine mutations happen here, in channel order. The receive timeout
/// doubles as the expiry sweep tick.
fn worker_loop(
    client: Arc<FeedClient<FeedRouter>>,
    rx: Receiver<FeedMessage>,
    engine: Arc<QuoteEngine>,
    flag: Arc<AtomicBool>,
) {
    debug!("Worker thread started");

    loop {
        while let Some(event) = client.try_recv_event() {
            match event {
                ClientEvent::Connected => engine.mark_connected(),
                ClientEvent::Disconnected => engine.mark_disconnected(),
                ClientEvent::Reconnecting(attempt) => {
                    debug!("Session reconnecting (attempt {})", attempt);
                }
                ClientEvent::Error(e) => {
                    error!("Session error: {}", e);
                    engine.note_session_error(e);
                }
            }
        }

        match rx.recv_timeout(WORKER_TICK) {
            Ok(message) => engine.on_event(message),
            Err(RecvTimeoutError::Timeout) => {
                if !flag.load(Ordering::Acquire) {
                    break;
                }
                engine.expire_sweep();
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Feed channel closed");
                break;
            }
        }
    }

    debug!("Worker thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::client::feed::types::RfqIdPayload;

    #[test]
    fn channel_handler_preserves_event_order() {
        let (tx, rx) = unbounded();
        let mut handler = ChannelHandler { tx };

        for i in 0..5 {
            handler
                .handle(FeedMessage::RfqDeleted(RfqIdPayload {
                    rfq_id: format!("rfq-{i}"),
                }))
                .unwrap();
        }

        for i in 0..5 {
            match rx.try_recv().unwrap() {
                FeedMessage::RfqDeleted(p) => assert_eq!(p.rfq_id, format!("rfq-{i}")),
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[test]
    fn channel_handler_reports_closed_channel() {
        let (tx, rx) = unbounded();
        drop(rx);
        let mut handler = ChannelHandler { tx };

        let err = handler
            .handle(FeedMessage::RfqDeleted(RfqIdPayload {
                rfq_id: "rfq-1".to_string(),
            }))
            .unwrap_err();
        assert!(matches!(err, FeedSockError::ChannelSend(_)));
    }
}
