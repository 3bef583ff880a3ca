//! Caller-facing streaming client.
//!
//! [`OkxWebSocketClient`] composes the registry, the connection manager, the
//! router and the pending queue. Every operation takes `&self`, so one task
//! can drive [`receive`](OkxWebSocketClient::receive) while others subscribe,
//! reconnect or close.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::shared::{
    BookDepth, CandleInterval, Credentials, Endpoint, LocalTimeProvider, TimestampProvider,
};
use crate::websocket::config::WebSocketConfig;
use crate::websocket::connection::{
    Command, Connection, ConnectionManager, ConnectionMode, ConnectionState,
};
use crate::websocket::error::{WebSocketError, WsResult};
use crate::websocket::handlers::MessageRouter;
use crate::websocket::queue::PendingQueue;
use crate::websocket::reconnect::{record_error, ErrorSlot, Supervisor};
use crate::websocket::subscriptions::SubscriptionRegistry;
use crate::websocket::types::{InboundMessage, Subscription};

/// How long a replaced or closed background task gets to stop before it is aborted
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn require(name: &str, value: &str) -> WsResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WebSocketError::InvalidParameter(format!("{} must not be empty", name)));
    }
    Ok(value.to_string())
}

/// Builder for [`OkxWebSocketClient`].
#[derive(Clone)]
pub struct OkxWebSocketClientBuilder {
    endpoint: Endpoint,
    config: WebSocketConfig,
    time: Arc<dyn TimestampProvider>,
}

impl OkxWebSocketClientBuilder {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            config: WebSocketConfig::default(),
            time: Arc::new(LocalTimeProvider),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }

    /// Limit automatic reconnect attempts per outage (`None` = unlimited).
    pub fn max_reconnect_attempts(mut self, attempts: Option<u32>) -> Self {
        self.config.reconnect.max_attempts = attempts;
        self
    }

    /// Clock used to sign the login request (e.g. [`crate::api::TimeSync`]).
    pub fn with_timestamp_provider(mut self, provider: Arc<dyn TimestampProvider>) -> Self {
        self.time = provider;
        self
    }

    /// Connect to the public endpoint (market data only).
    pub async fn connect_public(self) -> WsResult<OkxWebSocketClient> {
        let url = self.endpoint.ws_public_url().to_string();
        OkxWebSocketClient::start(url, ConnectionMode::Public, self).await
    }

    /// Connect to the private endpoint and log in.
    pub async fn connect_private(self, credentials: Credentials) -> WsResult<OkxWebSocketClient> {
        let url = self.endpoint.ws_private_url().to_string();
        OkxWebSocketClient::start(url, ConnectionMode::Private(credentials), self).await
    }
}

impl fmt::Debug for OkxWebSocketClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OkxWebSocketClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Resilient, multiplexed OKX WebSocket client.
///
/// # Example
///
/// ```ignore
/// use okx_stream::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), WebSocketError> {
///     let client = OkxWebSocketClient::connect_public(&Endpoint::live(), None).await?;
///     client.subscribe_tickers("BTC-USDT").await?;
///
///     while let Some(message) = client.receive().await {
///         if let InboundMessage::Data(data) = message {
///             println!("{}: {:?}", data.arg, data.data);
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct OkxWebSocketClient {
    manager: Arc<ConnectionManager>,
    registry: SubscriptionRegistry,
    queue: Arc<PendingQueue>,
    commands: Mutex<Option<mpsc::Sender<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Serializes subscribe, reconnect and close against each other
    control: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    last_error: ErrorSlot,
}

impl OkxWebSocketClient {
    pub fn builder(endpoint: Endpoint) -> OkxWebSocketClientBuilder {
        OkxWebSocketClientBuilder::new(endpoint)
    }

    /// Connect to the public endpoint with default configuration.
    pub async fn connect_public(
        endpoint: &Endpoint,
        max_reconnect_attempts: Option<u32>,
    ) -> WsResult<Self> {
        Self::builder(endpoint.clone())
            .max_reconnect_attempts(max_reconnect_attempts)
            .connect_public()
            .await
    }

    /// Connect to the private endpoint and log in with default configuration.
    ///
    /// Fails with [`WebSocketError::AuthenticationFailed`] if the login is
    /// rejected or not answered within the login timeout.
    pub async fn connect_private(
        endpoint: &Endpoint,
        credentials: Credentials,
        max_reconnect_attempts: Option<u32>,
    ) -> WsResult<Self> {
        Self::builder(endpoint.clone())
            .max_reconnect_attempts(max_reconnect_attempts)
            .connect_private(credentials)
            .await
    }

    async fn start(
        url: String,
        mode: ConnectionMode,
        builder: OkxWebSocketClientBuilder,
    ) -> WsResult<Self> {
        let OkxWebSocketClientBuilder {
            endpoint,
            config,
            time,
        } = builder;

        let registry = SubscriptionRegistry::new();
        let router = MessageRouter::new(registry.clone(), config.forward_acks);
        let queue = Arc::new(PendingQueue::new(config.queue_capacity, config.overflow_policy));
        let manager = Arc::new(ConnectionManager::new(
            url,
            mode,
            endpoint.extra_headers(),
            config,
            time,
            router,
        ));

        let connection = manager.connect().await?;
        let client = Self {
            manager,
            registry,
            queue,
            commands: Mutex::new(None),
            task: Mutex::new(None),
            control: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            last_error: Arc::new(Mutex::new(None)),
        };
        client.spawn(connection);
        Ok(client)
    }

    fn spawn(&self, connection: Connection) {
        let (tx, rx) = mpsc::channel(self.manager.config().command_channel_capacity);
        let supervisor = Supervisor::new(
            Arc::clone(&self.manager),
            self.registry.clone(),
            Arc::clone(&self.queue),
            rx,
            Arc::clone(&self.last_error),
        );
        let handle = tokio::spawn(supervisor.run(connection));
        *lock(&self.commands) = Some(tx);
        *lock(&self.task) = Some(handle);
    }

    /// Hand a command to the background task. Returns `false` if no task is running.
    async fn dispatch(&self, command: Command) -> WsResult<()> {
        let sender = lock(&self.commands).clone();
        match sender {
            Some(sender) => Ok(sender.send(command).await?),
            None => Err(WebSocketError::ChannelClosed),
        }
    }

    /// Stop the current background task, waiting briefly before aborting it.
    async fn stop_task(&self, command: Command) {
        let sender = lock(&self.commands).take();
        let handle = lock(&self.task).take();

        if let Some(sender) = sender {
            let _ = sender.send(command).await;
        }
        if let Some(mut handle) = handle {
            if tokio::time::timeout(TASK_STOP_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("Connection task did not stop in time, aborting");
                handle.abort();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Subscribe to a channel.
    ///
    /// The subscription is recorded first and replayed after every reconnect.
    /// Subscribing twice to the same channel and parameters sends one frame.
    pub async fn subscribe(&self, subscription: Subscription) -> WsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WebSocketError::NotConnected);
        }
        if subscription.is_private() && !self.is_private() {
            return Err(WebSocketError::AuthRequired(subscription.channel.clone()));
        }

        let _guard = self.control.lock().await;
        if !self.registry.add(subscription.clone()) {
            tracing::debug!(subscription = %subscription, "Already subscribed");
            return Ok(());
        }

        if let Err(e) = self.dispatch(Command::Subscribe(subscription.clone())).await {
            tracing::debug!(subscription = %subscription, error = %e, "No active connection, subscribe deferred");
        }
        Ok(())
    }

    /// Unsubscribe from a channel. The frame is best effort; the channel is
    /// never replayed again either way.
    pub async fn unsubscribe(&self, subscription: Subscription) -> WsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WebSocketError::NotConnected);
        }

        let _guard = self.control.lock().await;
        if !self.registry.remove(&subscription) {
            return Ok(());
        }
        if self.state() == ConnectionState::Ready {
            if let Err(e) = self.dispatch(Command::Unsubscribe(subscription)).await {
                tracing::debug!(error = %e, "Unsubscribe frame not sent");
            }
        }
        Ok(())
    }

    pub async fn subscribe_tickers(&self, inst_id: &str) -> WsResult<()> {
        self.subscribe(Subscription::tickers(require("inst_id", inst_id)?))
            .await
    }

    pub async fn subscribe_trades(&self, inst_id: &str) -> WsResult<()> {
        self.subscribe(Subscription::trades(require("inst_id", inst_id)?))
            .await
    }

    /// Subscribe to candlesticks. `interval` is one of `1m, 5m, 15m, 1H, 4H, 1D`.
    pub async fn subscribe_candles(&self, inst_id: &str, interval: &str) -> WsResult<()> {
        let interval: CandleInterval = interval.parse()?;
        self.subscribe(Subscription::candles(require("inst_id", inst_id)?, interval))
            .await
    }

    /// Subscribe to the order book. `depth` is one of
    /// `books, books5, books50-l2-tbt, books-l2-tbt`.
    pub async fn subscribe_books(&self, inst_id: &str, depth: &str) -> WsResult<()> {
        let depth: BookDepth = depth.parse()?;
        self.subscribe(Subscription::books(require("inst_id", inst_id)?, depth))
            .await
    }

    pub async fn subscribe_mark_price(&self, inst_id: &str) -> WsResult<()> {
        self.subscribe(Subscription::mark_price(require("inst_id", inst_id)?))
            .await
    }

    pub async fn subscribe_index_tickers(&self, inst_id: &str) -> WsResult<()> {
        self.subscribe(Subscription::index_tickers(require("inst_id", inst_id)?))
            .await
    }

    pub async fn subscribe_funding_rate(&self, inst_id: &str) -> WsResult<()> {
        self.subscribe(Subscription::funding_rate(require("inst_id", inst_id)?))
            .await
    }

    /// Account balances, optionally for one currency. Private.
    pub async fn subscribe_account(&self, ccy: Option<&str>) -> WsResult<()> {
        self.subscribe(Subscription::account(ccy)).await
    }

    /// Positions for an instrument type (`ANY`, `SWAP`, ...). Private.
    pub async fn subscribe_positions(&self, inst_type: &str, inst_id: Option<&str>) -> WsResult<()> {
        self.subscribe(Subscription::positions(require("inst_type", inst_type)?, inst_id))
            .await
    }

    /// Order updates. Private.
    pub async fn subscribe_orders(&self, inst_type: &str, inst_id: Option<&str>) -> WsResult<()> {
        self.subscribe(Subscription::orders(require("inst_type", inst_type)?, inst_id))
            .await
    }

    /// Algo order updates. Private.
    pub async fn subscribe_orders_algo(&self, inst_type: &str, inst_id: Option<&str>) -> WsResult<()> {
        self.subscribe(Subscription::orders_algo(require("inst_type", inst_type)?, inst_id))
            .await
    }

    /// Combined balance and position snapshots. Private.
    pub async fn subscribe_balance_and_position(&self) -> WsResult<()> {
        self.subscribe(Subscription::balance_and_position()).await
    }

    // ------------------------------------------------------------------------
    // Consumption
    // ------------------------------------------------------------------------

    /// Next inbound message, or `None` once the stream has ended.
    ///
    /// The stream ends after [`close`](Self::close) or when automatic
    /// reconnection gives up. Drive this from one task at a time.
    pub async fn receive(&self) -> Option<InboundMessage> {
        self.queue.pop().await
    }

    /// Messages as a [`Stream`] borrowing nothing from the client.
    pub fn messages(&self) -> impl Stream<Item = InboundMessage> + Send + 'static {
        stream::unfold(Arc::clone(&self.queue), |queue| async move {
            let message = queue.pop().await?;
            Some((message, queue))
        })
    }

    /// Consume the client into a [`Stream`] that owns the connection.
    pub fn into_stream(self) -> impl Stream<Item = InboundMessage> + Send + 'static {
        stream::unfold(self, |client| async move {
            let message = client.receive().await?;
            Some((message, client))
        })
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Replace the connection with a fresh one and replay every subscription.
    ///
    /// Also revives a stream that ended because automatic reconnection gave
    /// up, with a fresh attempt budget. A closed client stays closed.
    pub async fn reconnect(&self) -> WsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WebSocketError::NotConnected);
        }

        let _guard = self.control.lock().await;
        tracing::info!("Manual reconnect");
        self.stop_task(Command::Detach).await;

        let result = match self.manager.connect().await {
            Ok(mut connection) => {
                self.registry.reset_confirmations();
                let replayed = connection.replay(self.registry.all()).await;
                replayed.map(|_| connection)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(connection) => {
                if !self.queue.reopen() {
                    tracing::debug!("Client closed during reconnect");
                }
                self.spawn(connection);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Manual reconnect failed");
                record_error(&self.last_error, e.clone());
                self.manager.mark_closed();
                self.queue.finish();
                Err(e)
            }
        }
    }

    /// Graceful shutdown. Idempotent; `receive` returns `None` from now on.
    pub async fn close(&self) -> WsResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.queue.close();

        let _guard = self.control.lock().await;
        self.stop_task(Command::Close).await;
        self.manager.mark_closed();
        tracing::info!("WebSocket client closed");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    pub fn is_private(&self) -> bool {
        self.manager.mode().is_private()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of tracked subscriptions (replayed on reconnect).
    pub fn subscription_count(&self) -> usize {
        self.registry.count()
    }

    /// Tracked subscriptions in the order they were added.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.all()
    }

    /// Whether the server acknowledged `subscription` on the current connection.
    pub fn is_confirmed(&self, subscription: &Subscription) -> bool {
        self.registry.is_confirmed(subscription)
    }

    /// Error that ended the stream, if reconnection gave up.
    pub fn last_error(&self) -> Option<WebSocketError> {
        lock(&self.last_error).clone()
    }

    /// Messages discarded under [`OverflowPolicy::DropOldest`](crate::websocket::OverflowPolicy).
    pub fn dropped_messages(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn config(&self) -> &WebSocketConfig {
        self.manager.config()
    }
}

impl fmt::Debug for OkxWebSocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OkxWebSocketClient")
            .field("kind", &if self.is_private() { "private" } else { "public" })
            .field("state", &self.state())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl Drop for OkxWebSocketClient {
    fn drop(&mut self) {
        self.queue.close();
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert_eq!(require("inst_id", " BTC-USDT ").unwrap(), "BTC-USDT");
        assert!(matches!(
            require("inst_id", "  "),
            Err(WebSocketError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_builder_options() {
        let builder = OkxWebSocketClient::builder(Endpoint::simulated())
            .max_reconnect_attempts(Some(3));
        assert_eq!(builder.config.reconnect.max_attempts, Some(3));
        assert!(builder.endpoint.is_simulated());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Endpoint::live().with_ws_public_url(format!("ws://{}", addr));
        let result = OkxWebSocketClient::connect_public(&endpoint, Some(0)).await;
        let err = result.unwrap_err();
        assert!(err.is_transport_error(), "{:?}", err);
    }
}
