//! Streaming client configuration.

use std::time::Duration;

use crate::websocket::queue::OverflowPolicy;
use crate::websocket::reconnect::ReconnectPolicy;

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Send a ping after this long without inbound or outbound traffic
    pub ping_interval: Duration,
    /// Grace period for the matching pong before the transport is considered dead
    pub pong_timeout: Duration,
    /// Maximum wait for the login result on private connections
    pub login_timeout: Duration,
    /// Maximum wait for the transport handshake
    pub connect_timeout: Duration,
    /// Capacity of the pending message queue
    pub queue_capacity: usize,
    /// Behaviour when the pending queue is full
    pub overflow_policy: OverflowPolicy,
    /// Capacity of the internal command channel. Commands queue here while
    /// the read loop is blocked on a full queue under [`OverflowPolicy::Block`].
    pub command_channel_capacity: usize,
    /// Deliver subscribe/unsubscribe acks to the caller as events
    pub forward_acks: bool,
    /// Automatic reconnect behaviour
    pub reconnect: ReconnectPolicy,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(25),
            pong_timeout: Duration::from_secs(10),
            login_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            queue_capacity: 1000,
            overflow_policy: OverflowPolicy::Block,
            command_channel_capacity: 100,
            forward_acks: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl WebSocketConfig {
    /// Limit automatic reconnect attempts per outage (`None` = unlimited).
    pub fn with_max_reconnect_attempts(mut self, attempts: Option<u32>) -> Self {
        self.reconnect.max_attempts = attempts;
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_keepalive(mut self, ping_interval: Duration, pong_timeout: Duration) -> Self {
        self.ping_interval = ping_interval;
        self.pong_timeout = pong_timeout;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
