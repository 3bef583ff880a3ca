//! Connection lifecycle: one physical transport and its state machine.
//!
//! ```text
//! Disconnected -> Connecting -> (Authenticating) -> Ready -> Closing -> Closed
//!                     |               |               |
//!                     +---------------+---------------+--> Closed (transport error / EOF)
//! ```
//!
//! [`ConnectionManager::connect`] drives a fresh transport up to `Ready` and
//! hands back a [`Connection`]. The connection's read loop routes frames,
//! executes caller commands and runs the keepalive until the transport fails
//! or the caller closes it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::auth;
use crate::shared::{Credentials, TimestampProvider};
use crate::websocket::config::WebSocketConfig;
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::handlers::{decode, MessageRouter, Routed};
use crate::websocket::queue::PendingQueue;
use crate::websocket::types::{EventKind, InboundMessage, Subscription, WsRequest, PING};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Authenticating = 2,
    Ready = 3,
    Closing = 4,
    Closed = 5,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Authenticating,
            3 => Self::Ready,
            4 => Self::Closing,
            5 => Self::Closed,
            _ => Self::Disconnected,
        }
    }
}

/// Shared, lock-free view of a [`ConnectionState`].
#[derive(Debug, Clone)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new(state: ConnectionState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: ConnectionState) {
        let previous = ConnectionState::from(self.0.swap(state as u8, Ordering::SeqCst));
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "Connection state changed");
        }
    }
}

/// Public (market data) or private (authenticated) connection.
#[derive(Debug, Clone)]
pub enum ConnectionMode {
    Public,
    Private(Credentials),
}

impl ConnectionMode {
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }
}

/// Instructions from the client handle to the read loop.
#[derive(Debug)]
pub(crate) enum Command {
    Subscribe(Subscription),
    Unsubscribe(Subscription),
    /// Graceful shutdown; the stream ends
    Close,
    /// Stop this connection but leave the stream open (manual reconnect)
    Detach,
}

/// Why a connection's read loop returned.
#[derive(Debug)]
pub(crate) enum Disconnect {
    /// Caller closed the client
    Closed,
    /// Caller is replacing the connection
    Detached,
    /// Transport failed; eligible for automatic reconnect
    Transport(WebSocketError),
}

/// Builds connections for one endpoint and mode.
pub(crate) struct ConnectionManager {
    url: String,
    mode: ConnectionMode,
    headers: Vec<(&'static str, &'static str)>,
    config: WebSocketConfig,
    time: Arc<dyn TimestampProvider>,
    router: MessageRouter,
    state: StateCell,
}

impl ConnectionManager {
    pub(crate) fn new(
        url: impl Into<String>,
        mode: ConnectionMode,
        headers: Vec<(&'static str, &'static str)>,
        config: WebSocketConfig,
        time: Arc<dyn TimestampProvider>,
        router: MessageRouter,
    ) -> Self {
        Self {
            url: url.into(),
            mode,
            headers,
            config,
            time,
            router,
            state: StateCell::new(ConnectionState::Disconnected),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub(crate) fn mode(&self) -> &ConnectionMode {
        &self.mode
    }

    pub(crate) fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    pub(crate) fn mark_closed(&self) {
        self.state.set(ConnectionState::Closed);
    }

    /// Waiting between reconnect attempts.
    pub(crate) fn mark_disconnected(&self) {
        self.state.set(ConnectionState::Disconnected);
    }

    /// Establish a transport and bring it to `Ready`.
    ///
    /// Private connections log in first; a rejected or timed-out login
    /// fails with [`WebSocketError::AuthenticationFailed`].
    pub(crate) async fn connect(&self) -> WsResult<Connection> {
        self.state.set(ConnectionState::Connecting);
        match self.establish().await {
            Ok(connection) => {
                self.state.set(ConnectionState::Ready);
                tracing::info!(url = %self.url, private = self.mode.is_private(), "WebSocket ready");
                Ok(connection)
            }
            Err(e) => {
                self.state.set(ConnectionState::Closed);
                Err(e)
            }
        }
    }

    async fn establish(&self) -> WsResult<Connection> {
        let mut request = self.url.as_str().into_client_request()?;
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WebSocketError::InvalidUrl(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| WebSocketError::InvalidUrl(e.to_string()))?;
            request.headers_mut().insert(name, value);
        }

        let (ws_stream, _) = tokio::time::timeout(self.config.connect_timeout, connect_async(request))
            .await
            .map_err(|_| WebSocketError::Timeout)??;
        let (sink, source) = ws_stream.split();

        let mut connection = Connection {
            sink,
            source,
            state: self.state.clone(),
            router: self.router.clone(),
            ping_interval: self.config.ping_interval,
            pong_timeout: self.config.pong_timeout,
            sent: HashSet::new(),
        };

        if let ConnectionMode::Private(credentials) = &self.mode {
            self.state.set(ConnectionState::Authenticating);
            connection
                .login(credentials, self.time.as_ref(), self.config.login_timeout)
                .await?;
        }

        Ok(connection)
    }
}

/// A live transport in the `Ready` state.
pub(crate) struct Connection {
    sink: WsSink,
    source: WsSource,
    state: StateCell,
    router: MessageRouter,
    ping_interval: Duration,
    pong_timeout: Duration,
    /// Subscriptions already sent on this transport
    sent: HashSet<Subscription>,
}

impl Connection {
    /// Send a text frame. Only valid while `Ready`.
    pub(crate) async fn send(&mut self, text: String) -> WsResult<()> {
        if self.state.get() != ConnectionState::Ready {
            return Err(WebSocketError::NotConnected);
        }
        self.write(text).await
    }

    async fn write(&mut self, text: String) -> WsResult<()> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| WebSocketError::SendFailed(e.to_string()))
    }

    /// Send a subscribe frame unless this transport already carries it.
    pub(crate) async fn subscribe(&mut self, subscription: Subscription) -> WsResult<bool> {
        if self.sent.contains(&subscription) {
            return Ok(false);
        }
        let frame = WsRequest::subscribe(vec![subscription.clone()]).to_json()?;
        self.send(frame).await?;
        tracing::debug!(subscription = %subscription, "Subscribe sent");
        self.sent.insert(subscription);
        Ok(true)
    }

    pub(crate) async fn unsubscribe(&mut self, subscription: Subscription) -> WsResult<()> {
        self.sent.remove(&subscription);
        let frame = WsRequest::unsubscribe(vec![subscription.clone()]).to_json()?;
        self.send(frame).await?;
        tracing::debug!(subscription = %subscription, "Unsubscribe sent");
        Ok(())
    }

    /// Reissue every subscription, in order, one frame each.
    pub(crate) async fn replay(&mut self, subscriptions: Vec<Subscription>) -> WsResult<usize> {
        let mut sent = 0;
        for subscription in subscriptions {
            if self.subscribe(subscription).await? {
                sent += 1;
            }
        }
        if sent > 0 {
            tracing::info!(count = sent, "Resubscribed tracked subscriptions");
        }
        Ok(sent)
    }

    async fn login(
        &mut self,
        credentials: &Credentials,
        time: &dyn TimestampProvider,
        login_timeout: Duration,
    ) -> WsResult<()> {
        let args = auth::ws_login_args(credentials, time.timestamp_unix_secs())?;
        self.write(WsRequest::login(args).to_json()?).await?;
        tracing::debug!(api_key = %credentials.redacted_api_key(), "Login sent");

        let deadline = Instant::now() + login_timeout;
        loop {
            let frame = match tokio::time::timeout_at(deadline, self.source.next()).await {
                Err(_) => {
                    return Err(WebSocketError::AuthenticationFailed {
                        code: "timeout".to_string(),
                        message: format!("no login response within {}ms", login_timeout.as_millis()),
                    })
                }
                Ok(None) => {
                    return Err(WebSocketError::ConnectionClosed {
                        code: 1006,
                        reason: "Stream ended during login".to_string(),
                    })
                }
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => match decode(text.as_str()) {
                    Ok(InboundMessage::Event(event))
                        if matches!(event.kind, EventKind::Login | EventKind::Error) =>
                    {
                        if event.kind == EventKind::Login && event.is_success() {
                            tracing::info!("Login succeeded");
                            return Ok(());
                        }
                        let code = event.code.unwrap_or_default();
                        let message = event.msg.unwrap_or_default();
                        tracing::warn!(code = %code, msg = %message, "Login rejected");
                        return Err(WebSocketError::AuthenticationFailed { code, message });
                    }
                    _ => tracing::debug!(raw = %text.as_str(), "Ignoring frame while authenticating"),
                },
                Message::Ping(payload) => {
                    self.sink.send(Message::Pong(payload)).await?;
                }
                Message::Close(frame) => return Err(close_error(frame.as_ref())),
                _ => {}
            }
        }
    }

    /// Read loop. Returns when the transport fails or the caller stops it.
    pub(crate) async fn run(
        &mut self,
        commands: &mut mpsc::Receiver<Command>,
        queue: &PendingQueue,
    ) -> Disconnect {
        let mut last_activity = Instant::now();
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let wake_at = pong_deadline.unwrap_or(last_activity + self.ping_interval);

            tokio::select! {
                frame = self.source.next() => {
                    last_activity = Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => match self.router.route(text.as_str()) {
                            Routed::Pong => {
                                tracing::trace!("Pong received");
                                pong_deadline = None;
                            }
                            Routed::Consumed => {}
                            Routed::Deliver(message) => {
                                if !queue.push(message).await {
                                    self.shutdown().await;
                                    return Disconnect::Closed;
                                }
                            }
                        },
                        Some(Ok(Message::Ping(payload))) => {
                            if let Err(e) = self.sink.send(Message::Pong(payload)).await {
                                return self.fail(e.into());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return self.fail(close_error(frame.as_ref()));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return self.fail(e.into()),
                        None => {
                            return self.fail(WebSocketError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                    }
                }

                command = commands.recv() => {
                    let result = match command {
                        Some(Command::Subscribe(subscription)) => self.subscribe(subscription).await.map(|_| ()),
                        Some(Command::Unsubscribe(subscription)) => self.unsubscribe(subscription).await,
                        Some(Command::Close) | None => {
                            self.shutdown().await;
                            return Disconnect::Closed;
                        }
                        Some(Command::Detach) => {
                            self.shutdown().await;
                            return Disconnect::Detached;
                        }
                    };
                    if let Err(e) = result {
                        return self.fail(e);
                    }
                    last_activity = Instant::now();
                }

                _ = tokio::time::sleep_until(wake_at) => {
                    if pong_deadline.is_some() {
                        let waited = self.pong_timeout.as_millis() as u64;
                        tracing::warn!(pong_timeout_ms = waited, "Pong timeout");
                        return self.fail(WebSocketError::PongTimeout(waited));
                    }
                    if let Err(e) = self.write(PING.to_string()).await {
                        return self.fail(e);
                    }
                    tracing::trace!("Ping sent");
                    last_activity = Instant::now();
                    pong_deadline = Some(last_activity + self.pong_timeout);
                }
            }
        }
    }

    fn fail(&mut self, error: WebSocketError) -> Disconnect {
        self.state.set(ConnectionState::Closed);
        Disconnect::Transport(error)
    }

    /// `Ready -> Closing -> Closed`, sending a normal close frame.
    async fn shutdown(&mut self) {
        self.state.set(ConnectionState::Closing);
        let _ = self
            .sink
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "Client disconnect".into(),
            })))
            .await;
        let _ = self.sink.close().await;
        self.state.set(ConnectionState::Closed);
    }
}

fn close_error(frame: Option<&CloseFrame>) -> WebSocketError {
    match frame {
        Some(frame) => WebSocketError::ConnectionClosed {
            code: frame.code.into(),
            reason: frame.reason.to_string(),
        },
        None => WebSocketError::ConnectionClosed {
            code: 1006,
            reason: "No close frame".to_string(),
        },
    }
}
