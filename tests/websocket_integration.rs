//! Integration tests for the WebSocket client.
//!
//! Each test drives the client against an in-process mock OKX server bound to
//! `127.0.0.1:0`. Live tests against OKX are marked as ignored.
//! Run them with: `cargo test --test websocket_integration -- --ignored`

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use okx_stream::shared::{Credentials, Endpoint};
use okx_stream::websocket::*;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Mock server
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Behavior {
    /// Reject logins on this connection number and every later one
    reject_login_from: Option<usize>,
    answer_ping: bool,
    ack_subscribe: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            reject_login_from: None,
            answer_ping: true,
            ack_subscribe: true,
        }
    }
}

#[derive(Debug)]
enum ServerEvent {
    /// Connection number, whether the demo-trading header was present
    Connected(usize, bool),
    Frame(usize, String),
    Disconnected(usize),
}

#[derive(Debug)]
enum Control {
    /// Push a text frame to the current connection
    Send(String),
    /// Drop the current connection without a close frame
    Drop,
    /// Drop the connection and stop listening
    Shutdown,
}

struct MockServer {
    addr: String,
    url: String,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    control: mpsc::UnboundedSender<Control>,
}

fn respond(behavior: Behavior, conn_id: usize, text: &str) -> Option<String> {
    if text == "ping" {
        return behavior.answer_ping.then(|| "pong".to_string());
    }
    let request: Value = serde_json::from_str(text).ok()?;
    match request["op"].as_str()? {
        "login" if behavior.reject_login_from.is_some_and(|from| conn_id >= from) => {
            Some(json!({"event": "error", "code": "60009", "msg": "Login failed."}).to_string())
        }
        "login" => Some(json!({"event": "login", "code": "0", "msg": "", "connId": "a4d3ae55"}).to_string()),
        "subscribe" => behavior
            .ack_subscribe
            .then(|| json!({"event": "subscribe", "arg": request["args"][0], "connId": "a4d3ae55"}).to_string()),
        "unsubscribe" => Some(json!({"event": "unsubscribe", "arg": request["args"][0]}).to_string()),
        _ => None,
    }
}

impl MockServer {
    async fn start(behavior: Behavior) -> Self {
        Self::start_on("127.0.0.1:0", behavior).await
    }

    /// Listen on a fixed address, retrying while a previous listener on the
    /// same port is still being torn down.
    async fn start_on(addr: &str, behavior: Behavior) -> Self {
        let mut bound = None;
        for _ in 0..50 {
            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    bound = Some(listener);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        let listener = bound.unwrap_or_else(|| panic!("could not bind {}", addr));
        let addr = listener.local_addr().unwrap().to_string();
        let url = format!("ws://{}", addr);
        let (event_tx, events) = mpsc::unbounded_channel();
        let (control, mut control_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut conn_id = 0;
            loop {
                let stream = tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => stream,
                        Err(_) => return,
                    },
                    control = control_rx.recv() => match control {
                        Some(Control::Shutdown) | None => return,
                        Some(_) => continue,
                    },
                };

                let mut simulated = false;
                let callback = |request: &Request, response: Response| {
                    simulated = request.headers().contains_key("x-simulated-trading");
                    Ok::<_, ErrorResponse>(response)
                };
                let Ok(ws) = accept_hdr_async(stream, callback).await else {
                    continue;
                };

                conn_id += 1;
                let _ = event_tx.send(ServerEvent::Connected(conn_id, simulated));
                let (mut sink, mut source) = ws.split();

                loop {
                    tokio::select! {
                        frame = source.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                let text = text.as_str().to_string();
                                let _ = event_tx.send(ServerEvent::Frame(conn_id, text.clone()));
                                if let Some(reply) = respond(behavior, conn_id, &text) {
                                    if sink.send(Message::Text(reply.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                        control = control_rx.recv() => match control {
                            Some(Control::Send(text)) => {
                                let _ = sink.send(Message::Text(text.into())).await;
                            }
                            Some(Control::Drop) => break,
                            Some(Control::Shutdown) | None => return,
                        },
                    }
                }
                let _ = event_tx.send(ServerEvent::Disconnected(conn_id));
            }
        });

        Self {
            addr,
            url,
            events,
            control,
        }
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::live()
            .with_ws_public_url(self.url.clone())
            .with_ws_private_url(self.url.clone())
    }

    fn send(&self, frame: Value) {
        self.control.send(Control::Send(frame.to_string())).unwrap();
    }

    fn drop_connection(&self) {
        self.control.send(Control::Drop).unwrap();
    }

    fn shutdown(&self) {
        self.control.send(Control::Shutdown).unwrap();
    }

    async fn next_event(&mut self) -> ServerEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("timed out waiting for server event")
            .expect("mock server stopped")
    }

    /// Wait for connection `id`; returns whether it carried the demo header.
    async fn connected(&mut self, id: usize) -> bool {
        loop {
            if let ServerEvent::Connected(n, simulated) = self.next_event().await {
                if n == id {
                    return simulated;
                }
            }
        }
    }

    async fn disconnected(&mut self, id: usize) {
        loop {
            if let ServerEvent::Disconnected(n) = self.next_event().await {
                if n == id {
                    return;
                }
            }
        }
    }

    /// Next JSON request on connection `id`, skipping keepalive pings.
    async fn request(&mut self, id: usize) -> Value {
        loop {
            match self.next_event().await {
                ServerEvent::Frame(n, text) if n == id && text != "ping" => {
                    return serde_json::from_str(&text).unwrap();
                }
                _ => {}
            }
        }
    }

    async fn ping(&mut self, id: usize) {
        loop {
            match self.next_event().await {
                ServerEvent::Frame(n, text) if n == id && text == "ping" => return,
                _ => {}
            }
        }
    }

    /// Assert that no JSON request arrives within `window`.
    async fn assert_no_request(&mut self, window: Duration) {
        let result = timeout(window, async {
            loop {
                match self.events.recv().await {
                    Some(ServerEvent::Frame(_, text)) if text != "ping" => return Some(text),
                    Some(_) => {}
                    None => return None,
                }
            }
        })
        .await;
        if let Ok(Some(frame)) = result {
            panic!("unexpected request: {}", frame);
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn fast_config() -> WebSocketConfig {
    WebSocketConfig::default().with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(50), None))
}

async fn connect(server: &MockServer, config: WebSocketConfig) -> OkxWebSocketClient {
    OkxWebSocketClient::builder(server.endpoint())
        .config(config)
        .connect_public()
        .await
        .expect("Failed to connect")
}

fn credentials() -> Credentials {
    Credentials::new("test-key", "test-secret", "test-pass")
}

fn subscribe_request(arg: Value) -> Value {
    json!({"op": "subscribe", "args": [arg]})
}

fn ticker(inst_id: &str, seq: usize) -> Value {
    json!({
        "arg": {"channel": "tickers", "instId": inst_id},
        "data": [{"instId": inst_id, "last": "43000.1", "seq": seq}]
    })
}

async fn next_message(client: &OkxWebSocketClient) -> InboundMessage {
    timeout(WAIT, client.receive())
        .await
        .expect("timed out waiting for message")
        .expect("stream ended")
}

/// Poll the connection state until `done` holds.
async fn wait_for_state(client: &OkxWebSocketClient, done: impl Fn(ConnectionState) -> bool) {
    timeout(WAIT, async {
        while !done(client.state()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("state stuck at {:?}", client.state()));
}

/// Drain whatever is queued and wait for end-of-stream.
async fn drain_to_end(client: &OkxWebSocketClient) {
    timeout(WAIT, async { while client.receive().await.is_some() {} })
        .await
        .expect("stream did not end");
}

async fn next_data(client: &OkxWebSocketClient) -> DataMessage {
    loop {
        if let InboundMessage::Data(data) = next_message(client).await {
            return data;
        }
    }
}

// =============================================================================
// Streaming
// =============================================================================

#[tokio::test]
async fn test_subscribe_and_receive_ticker() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    assert!(!server.connected(1).await);
    assert!(client.is_connected());

    client.subscribe_tickers("BTC-USDT").await.unwrap();
    assert_eq!(
        server.request(1).await,
        subscribe_request(json!({"channel": "tickers", "instId": "BTC-USDT"}))
    );

    // Ack is forwarded and confirms the subscription
    match next_message(&client).await {
        InboundMessage::Event(event) => {
            assert_eq!(event.kind, EventKind::Subscribe);
            assert!(event.is_success());
        }
        other => panic!("Expected subscribe ack, got {:?}", other),
    }
    assert!(client.is_confirmed(&Subscription::tickers("BTC-USDT")));

    server.send(ticker("BTC-USDT", 1));
    let data = next_data(&client).await;
    assert_eq!(data.arg.channel, "tickers");
    assert_eq!(data.arg.inst_id(), Some("BTC-USDT"));
    assert_eq!(data.data[0]["last"], "43000.1");

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_duplicate_subscribe_sends_one_frame() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;

    client.subscribe_trades("ETH-USDT").await.unwrap();
    client.subscribe_trades("ETH-USDT").await.unwrap();

    server.request(1).await;
    server.assert_no_request(Duration::from_millis(200)).await;
    assert_eq!(client.subscription_count(), 1);
}

#[tokio::test]
async fn test_messages_preserve_order() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;
    client.subscribe_tickers("BTC-USDT").await.unwrap();
    server.request(1).await;

    for seq in 0..50 {
        server.send(ticker("BTC-USDT", seq));
    }
    for seq in 0..50 {
        let data = next_data(&client).await;
        assert_eq!(data.data[0]["seq"], seq);
    }
}

#[tokio::test]
async fn test_messages_stream() {
    let mut server = MockServer::start(Behavior {
        ack_subscribe: false,
        ..Behavior::default()
    })
    .await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;
    client.subscribe_tickers("SOL-USDT").await.unwrap();
    server.request(1).await;

    server.send(ticker("SOL-USDT", 1));
    server.send(ticker("SOL-USDT", 2));

    let received: Vec<InboundMessage> = timeout(WAIT, client.messages().take(2).collect())
        .await
        .unwrap();
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|m| m.inst_id() == Some("SOL-USDT")));
}

#[tokio::test]
async fn test_server_error_event_is_delivered() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;

    server.send(json!({"event": "error", "code": "60012", "msg": "Invalid request"}));
    match next_message(&client).await {
        InboundMessage::Event(event) => {
            assert_eq!(event.kind, EventKind::Error);
            assert_eq!(event.code.as_deref(), Some("60012"));
        }
        other => panic!("Expected error event, got {:?}", other),
    }
    // The connection survives server-reported errors
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_drop_oldest_policy() {
    let mut server = MockServer::start(Behavior {
        ack_subscribe: false,
        ..Behavior::default()
    })
    .await;
    let config = fast_config()
        .with_queue_capacity(2)
        .with_overflow_policy(OverflowPolicy::DropOldest);
    let client = connect(&server, config).await;
    server.connected(1).await;
    client.subscribe_tickers("BTC-USDT").await.unwrap();
    server.request(1).await;

    for seq in 0..5 {
        server.send(ticker("BTC-USDT", seq));
    }
    timeout(WAIT, async {
        while client.dropped_messages() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("messages were not dropped");

    assert_eq!(next_data(&client).await.data[0]["seq"], 3);
    assert_eq!(next_data(&client).await.data[0]["seq"], 4);
}

#[tokio::test]
async fn test_block_policy_defers_commands_until_drained() {
    let mut server = MockServer::start(Behavior {
        ack_subscribe: false,
        ..Behavior::default()
    })
    .await;
    let client = connect(&server, fast_config().with_queue_capacity(1)).await;
    server.connected(1).await;
    client.subscribe_tickers("BTC-USDT").await.unwrap();
    server.request(1).await;

    // One message fills the queue, the next one stalls the read loop
    for seq in 0..3 {
        server.send(ticker("BTC-USDT", seq));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The command is buffered, so the call returns, but no frame goes out
    timeout(WAIT, client.subscribe_trades("ETH-USDT"))
        .await
        .expect("subscribe should not wait for the read loop")
        .unwrap();
    server.assert_no_request(Duration::from_millis(200)).await;

    for seq in 0..3 {
        assert_eq!(next_data(&client).await.data[0]["seq"], seq);
    }
    assert_eq!(
        server.request(1).await,
        subscribe_request(json!({"channel": "trades", "instId": "ETH-USDT"}))
    );
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_interval_sends_nothing() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;

    let err = client.subscribe_candles("BTC-USDT", "7m").await.unwrap_err();
    match err {
        WebSocketError::InvalidParameter(msg) => {
            assert_eq!(msg, "Invalid interval: 7m. Valid values: 1m, 5m, 15m, 1H, 4H, 1D")
        }
        other => panic!("Expected InvalidParameter, got {:?}", other),
    }
    assert!(matches!(
        client.subscribe_books("BTC-USDT", "books7").await,
        Err(WebSocketError::InvalidParameter(_))
    ));
    assert!(matches!(
        client.subscribe_tickers("").await,
        Err(WebSocketError::InvalidParameter(_))
    ));

    server.assert_no_request(Duration::from_millis(200)).await;
    assert_eq!(client.subscription_count(), 0);

    client.subscribe_candles("BTC-USDT", "1H").await.unwrap();
    assert_eq!(
        server.request(1).await,
        subscribe_request(json!({"channel": "candle1H", "instId": "BTC-USDT"}))
    );
}

#[tokio::test]
async fn test_private_channel_on_public_connection() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;

    let err = client.subscribe_orders("SPOT", None).await.unwrap_err();
    assert!(matches!(err, WebSocketError::AuthRequired(ref channel) if channel == "orders"));
    server.assert_no_request(Duration::from_millis(200)).await;
    assert_eq!(client.subscription_count(), 0);
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_private_login_then_subscribe() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = OkxWebSocketClient::connect_private(&server.endpoint(), credentials(), Some(3))
        .await
        .expect("login should succeed");
    server.connected(1).await;
    assert!(client.is_private());
    assert_eq!(client.state(), ConnectionState::Ready);

    let login = server.request(1).await;
    assert_eq!(login["op"], "login");
    let args = &login["args"][0];
    assert_eq!(args["apiKey"], "test-key");
    assert_eq!(args["passphrase"], "test-pass");
    assert!(args["timestamp"].as_str().unwrap().parse::<i64>().is_ok());
    assert!(!args["sign"].as_str().unwrap().is_empty());

    client.subscribe_orders("SPOT", None).await.unwrap();
    assert_eq!(
        server.request(1).await,
        subscribe_request(json!({"channel": "orders", "instType": "SPOT"}))
    );
}

#[tokio::test]
async fn test_login_rejected_fails_connect() {
    let mut server = MockServer::start(Behavior {
        reject_login_from: Some(1),
        ..Behavior::default()
    })
    .await;

    let result = OkxWebSocketClient::connect_private(&server.endpoint(), credentials(), None).await;
    match result {
        Err(WebSocketError::AuthenticationFailed { code, message }) => {
            assert_eq!(code, "60009");
            assert_eq!(message, "Login failed.");
        }
        other => panic!("Expected AuthenticationFailed, got {:?}", other),
    }

    server.connected(1).await;
    assert_eq!(server.request(1).await["op"], "login");
    server.disconnected(1).await;
    // No retry after an auth failure
    server.assert_no_request(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_login_timeout() {
    // Completes the handshake but never answers the login
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let endpoint = Endpoint::live().with_ws_private_url(url);
    let result = OkxWebSocketClient::builder(endpoint)
        .config(fast_config().with_login_timeout(Duration::from_millis(200)))
        .connect_private(credentials())
        .await;
    match result {
        Err(err @ WebSocketError::AuthenticationFailed { .. }) => assert!(err.is_auth_error()),
        other => panic!("Expected AuthenticationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_simulated_endpoint_sends_header() {
    let mut server = MockServer::start(Behavior::default()).await;
    let endpoint = Endpoint::simulated().with_ws_public_url(server.url.clone());
    let _client = OkxWebSocketClient::connect_public(&endpoint, None).await.unwrap();
    assert!(server.connected(1).await);
}

// =============================================================================
// Reconnect
// =============================================================================

#[tokio::test]
async fn test_resubscribe_after_drop() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;

    client.subscribe_tickers("BTC-USDT").await.unwrap();
    client.subscribe_trades("ETH-USDT").await.unwrap();
    server.request(1).await;
    server.request(1).await;

    server.drop_connection();
    server.connected(2).await;

    assert_eq!(
        server.request(2).await,
        subscribe_request(json!({"channel": "tickers", "instId": "BTC-USDT"}))
    );
    assert_eq!(
        server.request(2).await,
        subscribe_request(json!({"channel": "trades", "instId": "ETH-USDT"}))
    );
    server.assert_no_request(Duration::from_millis(200)).await;
    assert_eq!(client.subscription_count(), 2);

    // Data flows on the new connection
    server.send(ticker("BTC-USDT", 7));
    assert_eq!(next_data(&client).await.data[0]["seq"], 7);
}

#[tokio::test]
async fn test_reconnect_exhausted_ends_stream() {
    let mut server = MockServer::start(Behavior::default()).await;
    let config = WebSocketConfig::default()
        .with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(50), Some(1)));
    let client = connect(&server, config).await;
    server.connected(1).await;

    server.shutdown();

    timeout(WAIT, async { while client.receive().await.is_some() {} })
        .await
        .expect("stream should end after reconnect gives up");
    assert!(client.receive().await.is_none());
    assert!(client.receive().await.is_none());

    match client.last_error() {
        Some(WebSocketError::ReconnectExhausted { attempts, .. }) => assert_eq!(attempts, 1),
        other => panic!("Expected ReconnectExhausted, got {:?}", other),
    }
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_missed_pong_triggers_reconnect() {
    let mut server = MockServer::start(Behavior {
        answer_ping: false,
        ..Behavior::default()
    })
    .await;
    let config = fast_config().with_keepalive(Duration::from_millis(100), Duration::from_millis(100));
    let client = connect(&server, config).await;
    server.connected(1).await;

    client.subscribe_tickers("BTC-USDT").await.unwrap();
    server.request(1).await;

    server.ping(1).await;
    server.connected(2).await;
    assert_eq!(
        server.request(2).await,
        subscribe_request(json!({"channel": "tickers", "instId": "BTC-USDT"}))
    );
}

#[tokio::test]
async fn test_keepalive_answered_keeps_connection() {
    let mut server = MockServer::start(Behavior::default()).await;
    let config = fast_config().with_keepalive(Duration::from_millis(100), Duration::from_millis(200));
    let client = connect(&server, config).await;
    server.connected(1).await;

    server.ping(1).await;
    server.ping(1).await;

    let reconnected = timeout(Duration::from_millis(300), server.connected(2)).await;
    assert!(reconnected.is_err(), "connection should not be replaced");
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_manual_reconnect_replays() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;

    client.subscribe_tickers("BTC-USDT").await.unwrap();
    client.subscribe_mark_price("BTC-USDT-SWAP").await.unwrap();
    server.request(1).await;
    server.request(1).await;

    client.reconnect().await.unwrap();
    server.connected(2).await;
    assert_eq!(server.request(2).await["args"][0]["channel"], "tickers");
    assert_eq!(server.request(2).await["args"][0]["channel"], "mark-price");
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_unsubscribe_is_not_replayed() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;

    client.subscribe_tickers("BTC-USDT").await.unwrap();
    server.request(1).await;
    client.unsubscribe(Subscription::tickers("BTC-USDT")).await.unwrap();

    let request = server.request(1).await;
    assert_eq!(request["op"], "unsubscribe");
    assert_eq!(request["args"][0]["instId"], "BTC-USDT");
    assert_eq!(client.subscription_count(), 0);

    server.drop_connection();
    server.connected(2).await;
    server.assert_no_request(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_subscribe_during_outage_is_replayed_once() {
    let mut server = MockServer::start(Behavior::default()).await;
    let config = WebSocketConfig::default()
        .with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(400), None));
    let client = connect(&server, config).await;
    server.connected(1).await;

    client.subscribe_tickers("BTC-USDT").await.unwrap();
    server.request(1).await;

    server.drop_connection();
    server.disconnected(1).await;
    wait_for_state(&client, |state| state == ConnectionState::Disconnected).await;

    client.subscribe_trades("ETH-USDT").await.unwrap();
    client.unsubscribe(Subscription::tickers("BTC-USDT")).await.unwrap();
    assert_eq!(client.subscription_count(), 1);

    server.connected(2).await;
    assert_eq!(
        server.request(2).await,
        subscribe_request(json!({"channel": "trades", "instId": "ETH-USDT"}))
    );
    server.assert_no_request(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_private_reconnect_relogs_before_replay() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = OkxWebSocketClient::builder(server.endpoint())
        .config(fast_config())
        .connect_private(credentials())
        .await
        .expect("login should succeed");
    server.connected(1).await;
    assert_eq!(server.request(1).await["op"], "login");

    client.subscribe_orders("SPOT", None).await.unwrap();
    server.request(1).await;

    server.drop_connection();
    server.connected(2).await;
    assert_eq!(server.request(2).await["op"], "login");
    assert_eq!(
        server.request(2).await,
        subscribe_request(json!({"channel": "orders", "instType": "SPOT"}))
    );
    wait_for_state(&client, |state| state == ConnectionState::Ready).await;
}

#[tokio::test]
async fn test_login_rejected_during_reconnect_gives_up() {
    let mut server = MockServer::start(Behavior {
        reject_login_from: Some(2),
        ..Behavior::default()
    })
    .await;
    let client = OkxWebSocketClient::builder(server.endpoint())
        .config(fast_config())
        .connect_private(credentials())
        .await
        .expect("first login should succeed");
    server.connected(1).await;
    server.request(1).await;
    client.subscribe_orders("SPOT", None).await.unwrap();
    server.request(1).await;

    server.drop_connection();
    server.connected(2).await;
    assert_eq!(server.request(2).await["op"], "login");

    drain_to_end(&client).await;
    match client.last_error() {
        Some(WebSocketError::AuthenticationFailed { code, .. }) => assert_eq!(code, "60009"),
        other => panic!("Expected AuthenticationFailed, got {:?}", other),
    }
    assert_eq!(client.state(), ConnectionState::Closed);

    // Unlimited budget, yet the rejected login is not retried
    let retried = timeout(Duration::from_millis(300), server.connected(3)).await;
    assert!(retried.is_err(), "login rejection must not be retried");
}

#[tokio::test]
async fn test_manual_reconnect_failure_is_reported() {
    let mut server = MockServer::start(Behavior::default()).await;
    let config = WebSocketConfig::default()
        .with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(200), None));
    let client = connect(&server, config).await;
    server.connected(1).await;
    client.subscribe_tickers("BTC-USDT").await.unwrap();
    server.request(1).await;

    server.shutdown();
    wait_for_state(&client, |state| state != ConnectionState::Ready).await;

    let err = client.reconnect().await.unwrap_err();
    assert!(err.is_transport_error(), "{:?}", err);
    assert!(client.last_error().is_some());

    drain_to_end(&client).await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(client.subscription_count(), 1);

    // With no connection task the subscription is only recorded
    client.subscribe_trades("ETH-USDT").await.unwrap();
    assert_eq!(client.subscription_count(), 2);
}

#[tokio::test]
async fn test_manual_reconnect_after_exhaustion_revives_stream() {
    let mut server = MockServer::start(Behavior::default()).await;
    let addr = server.addr.clone();
    let config = WebSocketConfig::default()
        .with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(50), Some(1)));
    let client = connect(&server, config).await;
    server.connected(1).await;
    client.subscribe_tickers("BTC-USDT").await.unwrap();
    server.request(1).await;

    server.shutdown();
    drain_to_end(&client).await;
    assert!(matches!(
        client.last_error(),
        Some(WebSocketError::ReconnectExhausted { attempts: 1, .. })
    ));

    let mut server = MockServer::start_on(&addr, Behavior::default()).await;
    client.reconnect().await.unwrap();
    assert!(client.is_connected());

    server.connected(1).await;
    assert_eq!(
        server.request(1).await,
        subscribe_request(json!({"channel": "tickers", "instId": "BTC-USDT"}))
    );
    server.send(ticker("BTC-USDT", 9));
    assert_eq!(next_data(&client).await.data[0]["seq"], 9);

    // The revived connection has its own attempt budget
    server.drop_connection();
    server.connected(2).await;
    assert_eq!(server.request(2).await["args"][0]["channel"], "tickers");
}

// =============================================================================
// Close
// =============================================================================

#[tokio::test]
async fn test_receive_after_close() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;
    client.subscribe_tickers("BTC-USDT").await.unwrap();

    client.close().await.unwrap();
    for _ in 0..3 {
        let next = timeout(WAIT, client.receive()).await.expect("receive hung after close");
        assert!(next.is_none());
    }

    // Idempotent, and nothing resurrects the stream
    client.close().await.unwrap();
    assert!(matches!(
        client.subscribe_trades("BTC-USDT").await,
        Err(WebSocketError::NotConnected)
    ));
    assert!(matches!(client.reconnect().await, Err(WebSocketError::NotConnected)));
    assert_eq!(client.state(), ConnectionState::Closed);
    server.disconnected(1).await;
}

#[tokio::test]
async fn test_close_releases_blocked_receiver() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = std::sync::Arc::new(connect(&server, fast_config()).await);
    server.connected(1).await;

    let consumer = {
        let client = std::sync::Arc::clone(&client);
        tokio::spawn(async move { client.receive().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.close().await.unwrap();

    let result = timeout(WAIT, consumer).await.unwrap().unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_debug_output() {
    let mut server = MockServer::start(Behavior::default()).await;
    let client = connect(&server, fast_config()).await;
    server.connected(1).await;
    client.subscribe_tickers("BTC-USDT").await.unwrap();

    let debug = format!("{:?}", client);
    assert!(debug.contains("kind: \"public\""), "{}", debug);
    assert!(debug.contains("Ready"), "{}", debug);
    assert!(debug.contains("subscriptions: 1"), "{}", debug);
}

// =============================================================================
// Blocking adapter
// =============================================================================

#[cfg(feature = "blocking")]
#[test]
fn test_blocking_subscribe_receive_close() {
    use okx_stream::blocking::BlockingClient;

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut server = runtime.block_on(MockServer::start(Behavior {
        ack_subscribe: false,
        ..Behavior::default()
    }));

    let client = BlockingClient::connect_public(&server.endpoint(), None).unwrap();
    assert!(client.is_connected());
    runtime.block_on(server.connected(1));

    client.subscribe_tickers("BTC-USDT").unwrap();
    assert_eq!(
        runtime.block_on(server.request(1)),
        subscribe_request(json!({"channel": "tickers", "instId": "BTC-USDT"}))
    );

    server.send(ticker("BTC-USDT", 1));
    match client.receive_timeout(WAIT).unwrap() {
        Some(InboundMessage::Data(data)) => {
            assert_eq!(data.arg.channel, "tickers");
            assert_eq!(data.arg.inst_id(), Some("BTC-USDT"));
        }
        other => panic!("Expected ticker data, got {:?}", other),
    }
    assert!(matches!(
        client.receive_timeout(Duration::from_millis(50)),
        Err(WebSocketError::Timeout)
    ));

    client.close().unwrap();
    assert!(client.receive().is_none());
    assert_eq!(client.state(), ConnectionState::Closed);
}

// =============================================================================
// Live OKX
// =============================================================================

#[tokio::test]
#[ignore = "requires network access to OKX"]
async fn test_live_public_tickers() {
    let client = OkxWebSocketClient::connect_public(&Endpoint::live(), Some(3))
        .await
        .expect("Failed to connect");
    client.subscribe_tickers("BTC-USDT").await.unwrap();

    let data = timeout(Duration::from_secs(30), next_data(&client)).await.unwrap();
    assert_eq!(data.arg.inst_id(), Some("BTC-USDT"));
    client.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires OKX_API_KEY, OKX_SECRET_KEY and OKX_PASSPHRASE"]
async fn test_live_private_login() {
    let credentials = Credentials::new(
        std::env::var("OKX_API_KEY").unwrap(),
        std::env::var("OKX_SECRET_KEY").unwrap(),
        std::env::var("OKX_PASSPHRASE").unwrap(),
    );
    let client = OkxWebSocketClient::connect_private(&Endpoint::simulated(), credentials, Some(3))
        .await
        .expect("login failed");
    client.subscribe_account(None).await.unwrap();
    client.close().await.unwrap();
}
