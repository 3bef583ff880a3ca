//! Synchronous adapter over [`OkxWebSocketClient`].
//!
//! The async client runs on a runtime owned by the adapter, so the read
//! loop, keepalive and reconnects keep running between calls. Do not use
//! from inside another async runtime.
//!
//! ```rust,ignore
//! use okx_stream::blocking::BlockingClient;
//! use okx_stream::shared::Endpoint;
//!
//! let client = BlockingClient::connect_public(&Endpoint::live(), None)?;
//! client.subscribe_tickers("BTC-USDT")?;
//! for message in client.iter() {
//!     println!("{:?}", message);
//! }
//! ```

use std::fmt;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::shared::{Credentials, Endpoint};
use crate::websocket::{
    ConnectionState, InboundMessage, OkxWebSocketClient, OkxWebSocketClientBuilder, Subscription,
    WebSocketError, WsResult,
};

/// Blocking handle; every method waits for the async operation to finish.
pub struct BlockingClient {
    inner: OkxWebSocketClient,
    runtime: Runtime,
}

fn runtime() -> WsResult<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("okx-stream")
        .enable_all()
        .build()
        .map_err(|e| WebSocketError::Io(e.to_string()))
}

impl BlockingClient {
    pub fn connect_public(endpoint: &Endpoint, max_reconnect_attempts: Option<u32>) -> WsResult<Self> {
        Self::connect_with(
            OkxWebSocketClient::builder(endpoint.clone()).max_reconnect_attempts(max_reconnect_attempts),
            None,
        )
    }

    pub fn connect_private(
        endpoint: &Endpoint,
        credentials: Credentials,
        max_reconnect_attempts: Option<u32>,
    ) -> WsResult<Self> {
        Self::connect_with(
            OkxWebSocketClient::builder(endpoint.clone()).max_reconnect_attempts(max_reconnect_attempts),
            Some(credentials),
        )
    }

    /// Connect with a fully configured builder. `credentials` selects the private endpoint.
    pub fn connect_with(builder: OkxWebSocketClientBuilder, credentials: Option<Credentials>) -> WsResult<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(async move {
            match credentials {
                Some(credentials) => builder.connect_private(credentials).await,
                None => builder.connect_public().await,
            }
        })?;
        Ok(Self { inner, runtime })
    }

    pub fn subscribe(&self, subscription: Subscription) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe(subscription))
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> WsResult<()> {
        self.runtime.block_on(self.inner.unsubscribe(subscription))
    }

    pub fn subscribe_tickers(&self, inst_id: &str) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_tickers(inst_id))
    }

    pub fn subscribe_trades(&self, inst_id: &str) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_trades(inst_id))
    }

    pub fn subscribe_candles(&self, inst_id: &str, interval: &str) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_candles(inst_id, interval))
    }

    pub fn subscribe_books(&self, inst_id: &str, depth: &str) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_books(inst_id, depth))
    }

    pub fn subscribe_mark_price(&self, inst_id: &str) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_mark_price(inst_id))
    }

    pub fn subscribe_index_tickers(&self, inst_id: &str) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_index_tickers(inst_id))
    }

    pub fn subscribe_funding_rate(&self, inst_id: &str) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_funding_rate(inst_id))
    }

    pub fn subscribe_account(&self, ccy: Option<&str>) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_account(ccy))
    }

    pub fn subscribe_positions(&self, inst_type: &str, inst_id: Option<&str>) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_positions(inst_type, inst_id))
    }

    pub fn subscribe_orders(&self, inst_type: &str, inst_id: Option<&str>) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_orders(inst_type, inst_id))
    }

    pub fn subscribe_orders_algo(&self, inst_type: &str, inst_id: Option<&str>) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_orders_algo(inst_type, inst_id))
    }

    pub fn subscribe_balance_and_position(&self) -> WsResult<()> {
        self.runtime.block_on(self.inner.subscribe_balance_and_position())
    }

    /// Block until the next message, or `None` at end-of-stream.
    pub fn receive(&self) -> Option<InboundMessage> {
        self.runtime.block_on(self.inner.receive())
    }

    /// Like [`receive`](Self::receive) but gives up after `timeout`.
    /// `Err(Timeout)` leaves the stream intact.
    pub fn receive_timeout(&self, timeout: Duration) -> WsResult<Option<InboundMessage>> {
        self.runtime
            .block_on(async { tokio::time::timeout(timeout, self.inner.receive()).await })
            .map_err(|_| WebSocketError::Timeout)
    }

    /// Iterate until end-of-stream.
    pub fn iter(&self) -> impl Iterator<Item = InboundMessage> + '_ {
        std::iter::from_fn(move || self.receive())
    }

    pub fn reconnect(&self) -> WsResult<()> {
        self.runtime.block_on(self.inner.reconnect())
    }

    pub fn close(&self) -> WsResult<()> {
        self.runtime.block_on(self.inner.close())
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn is_private(&self) -> bool {
        self.inner.is_private()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscription_count()
    }

    pub fn is_confirmed(&self, subscription: &Subscription) -> bool {
        self.inner.is_confirmed(subscription)
    }

    /// The underlying async client.
    pub fn inner(&self) -> &OkxWebSocketClient {
        &self.inner
    }
}

impl fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlockingClient").field(&self.inner).finish()
    }
}

impl Drop for BlockingClient {
    fn drop(&mut self) {
        let _ = self.runtime.block_on(self.inner.close());
    }
}
