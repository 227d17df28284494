use crate::config::QuoterConfig;
use crate::infrastructure::client::auth::{FeedAuthHeaders, KalshiSigner};
use crate::infrastructure::client::feed::router::{FeedRoute, FeedRouter};
use crate::infrastructure::client::feed::types::FeedMessage;
use feedsock::{EventHandler, FeedClient, FeedClientBuilder, FullJitterBackoff, WsMessage};
use serde_json::json;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// The subscribe command for the communications channel
pub fn subscribe_command() -> WsMessage {
    WsMessage::Text(
        json!({
            "id": 1,
            "cmd": "subscribe",
            "params": {"channels": ["communications"]}
        })
        .to_string(),
    )
}

/// Extract the request path from a WebSocket URL for signing
fn ws_path(url: &str) -> String {
    url.split_once("://")
        .map(|(_, rest)| rest)
        .and_then(|rest| rest.find('/').map(|i| rest[i..].to_string()))
        .unwrap_or_else(|| "/".to_string())
}

/// Build and start the communications feed session
///
/// Signed headers are regenerated on every (re)connection, the subscribe
/// command is replayed after each connect, and a stalled connection is torn
/// down by the liveness timeout and re-established with jittered backoff.
pub async fn connect_feed(
    config: &QuoterConfig,
    signer: Arc<KalshiSigner>,
    handler: impl EventHandler<FeedMessage>,
    shutdown_flag: Arc<AtomicBool>,
) -> feedsock::Result<FeedClient<FeedRouter>> {
    FeedClientBuilder::new(&config.venue.ws_url, FeedRouter)
        .handler(FeedRoute::Communications, handler)
        .headers(FeedAuthHeaders::new(signer, ws_path(&config.venue.ws_url)))
        .subscription(subscribe_command())
        .heartbeat(
            Duration::from_secs(config.session.heartbeat_secs),
            WsMessage::Ping(Vec::new()),
        )
        .liveness_timeout(Duration::from_secs(config.session.liveness_timeout_secs))
        .reconnect_policy(FullJitterBackoff::new(
            Duration::from_millis(config.session.backoff_base_ms),
            Duration::from_millis(config.session.backoff_cap_ms),
            None,
        ))
        .shutdown_flag(shutdown_flag)
        .build()
        .await
}
