//! Loopback session tests against a local WebSocket server

use crossbeam_channel::Sender;
use feedsock::{
    ClientEvent, EventHandler, FeedClientBuilder, FeedSockError, FullJitterBackoff, MessageRouter,
    WsMessage,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

struct TextRouter;

impl MessageRouter for TextRouter {
    type Event = String;
    type RouteKey = ();

    fn decode(&self, message: WsMessage) -> feedsock::Result<String> {
        match message {
            WsMessage::Text(text) => Ok(text),
            other => Err(FeedSockError::Decode(format!(
                "unexpected frame: {:?}",
                other
            ))),
        }
    }

    fn route_key(&self, _event: &String) -> Self::RouteKey {}
}

struct Capture {
    tx: Sender<String>,
}

impl EventHandler<String> for Capture {
    fn handle(&mut self, event: String) -> feedsock::Result<()> {
        self.tx
            .send(event)
            .map_err(|e| FeedSockError::ChannelSend(e.to_string()))
    }
}

const SUBSCRIBE: &str = r#"{"id":1,"cmd":"subscribe"}"#;

#[tokio::test(flavor = "multi_thread")]
async fn delivers_events_in_wire_order_after_subscribing() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        // The subscription must arrive before anything else
        let first = ws.next().await.unwrap().unwrap();
        assert_eq!(first.into_text().unwrap(), SUBSCRIBE);

        for i in 0..20 {
            ws.send(Message::Text(format!("event-{i}"))).await.unwrap();
        }

        // Hold the connection open until the client hangs up
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, rx) = crossbeam_channel::unbounded();
    let client = FeedClientBuilder::new(format!("ws://{addr}"), TextRouter)
        .handler((), Capture { tx })
        .subscription(WsMessage::Text(SUBSCRIBE.into()))
        .build()
        .await
        .unwrap();

    let mut seen = Vec::with_capacity(20);
    for _ in 0..20 {
        seen.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }
    let expected: Vec<String> = (0..20).map(|i| format!("event-{i}")).collect();
    assert_eq!(seen, expected);

    client.shutdown().await.unwrap();
    server.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn replays_subscription_after_reconnect() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        // First connection: take the subscription, then drop the client
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let first = ws.next().await.unwrap().unwrap();
        assert_eq!(first.into_text().unwrap(), SUBSCRIBE);
        drop(ws);

        // Second connection: the subscription must be replayed
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let first = ws.next().await.unwrap().unwrap();
        assert_eq!(first.into_text().unwrap(), SUBSCRIBE);

        ws.send(Message::Text("after-reconnect".into()))
            .await
            .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (tx, rx) = crossbeam_channel::unbounded();
    let client = FeedClientBuilder::new(format!("ws://{addr}"), TextRouter)
        .handler((), Capture { tx })
        .subscription(WsMessage::Text(SUBSCRIBE.into()))
        .reconnect_policy(FullJitterBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(50),
            Some(5),
        ))
        .build()
        .await
        .unwrap();

    let seen = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(seen, "after-reconnect");

    client.shutdown().await.unwrap();
    server.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_credentials_stop_the_session() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Answers every upgrade attempt with 403
    let server = tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 403 Forbidden\r\ncontent-length: 0\r\n\r\n")
                .await;
        }
    });

    let (tx, _rx) = crossbeam_channel::unbounded();
    let client = FeedClientBuilder::new(format!("ws://{addr}"), TextRouter)
        .handler((), Capture { tx })
        .reconnect_policy(FullJitterBackoff::new(
            Duration::from_millis(10),
            Duration::from_millis(20),
            None,
        ))
        .build()
        .await
        .unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let mut rejection = None;
    while std::time::Instant::now() < deadline {
        if let Some(ClientEvent::Error(e)) = client.try_recv_event() {
            rejection = Some(e);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let rejection = rejection.expect("no error event");
    assert!(
        rejection.contains("Authentication rejected"),
        "unexpected error: {rejection}"
    );

    // Unlimited retries are configured, but bad credentials end the session
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.metrics().reconnect_count, 0);

    client.shutdown().await.unwrap();
    server.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn send_fails_while_disconnected() {
    let (tx, _rx) = crossbeam_channel::unbounded();
    // Nothing listens on this port; the session never reaches Connected
    let client = FeedClientBuilder::new("ws://127.0.0.1:9", TextRouter)
        .handler((), Capture { tx })
        .build()
        .await
        .unwrap();

    let err = client.send(WsMessage::Text("quote".into())).unwrap_err();
    assert!(matches!(err, FeedSockError::NotConnected));

    client.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn rejects_non_websocket_url() {
    let (tx, _rx) = crossbeam_channel::unbounded();
    let result = FeedClientBuilder::new("https://example.com", TextRouter)
        .handler((), Capture { tx })
        .build()
        .await;

    assert!(matches!(result, Err(FeedSockError::Configuration(_))));
}
