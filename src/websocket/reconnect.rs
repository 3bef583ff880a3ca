//! Automatic reconnection after transport failures.
//!
//! A [`Supervisor`] owns the command receiver and the current [`Connection`]
//! for the lifetime of one background task. When the read loop reports a
//! transport failure it backs off, reconnects in the same mode, and replays
//! the registry before resuming. Messages from the old transport can never
//! reach the queue after the swap because the old read loop has already
//! returned.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::websocket::connection::{Command, Connection, ConnectionManager, Disconnect};
use crate::websocket::error::WebSocketError;
use crate::websocket::queue::PendingQueue;
use crate::websocket::subscriptions::SubscriptionRegistry;

/// Backoff schedule for automatic reconnects.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Attempts per outage (`None` = unlimited)
    pub max_attempts: Option<u32>,
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor between attempts
    pub multiplier: f64,
    /// Fraction of the delay randomized away (0.0 - 1.0)
    pub jitter: f64,
}

const MIN_DELAY: Duration = Duration::from_millis(1);

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl ReconnectPolicy {
    /// Fixed delay between attempts.
    pub fn fixed(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether attempt number `attempt` (zero-based) may run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }

    /// Delay before attempt number `attempt` (zero-based). Never zero.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let capped = (base_ms * exp).min(max_ms).max(0.0);

        // Jitter: (1 - jitter) .. 100% of the capped delay
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = 1.0 - jitter * rand::random::<f64>();
        Duration::from_millis((capped * factor) as u64).max(MIN_DELAY)
    }
}

/// Last terminal error observed by a supervisor, readable from the client.
pub(crate) type ErrorSlot = Arc<Mutex<Option<WebSocketError>>>;

pub(crate) fn record_error(slot: &ErrorSlot, error: WebSocketError) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
}

enum Recovery {
    Connected(Connection),
    Closed,
    Detached,
    GaveUp(WebSocketError),
}

/// Background task state: one connection at a time, replaced on failure.
pub(crate) struct Supervisor {
    manager: Arc<ConnectionManager>,
    registry: SubscriptionRegistry,
    queue: Arc<PendingQueue>,
    commands: mpsc::Receiver<Command>,
    last_error: ErrorSlot,
}

impl Supervisor {
    pub(crate) fn new(
        manager: Arc<ConnectionManager>,
        registry: SubscriptionRegistry,
        queue: Arc<PendingQueue>,
        commands: mpsc::Receiver<Command>,
        last_error: ErrorSlot,
    ) -> Self {
        Self {
            manager,
            registry,
            queue,
            commands,
            last_error,
        }
    }

    pub(crate) async fn run(mut self, connection: Connection) {
        let mut current = Some(connection);
        while let Some(mut connection) = current.take() {
            let outcome = connection.run(&mut self.commands, &self.queue).await;
            // Release the old transport before dialing a new one.
            drop(connection);

            match outcome {
                Disconnect::Closed => {
                    tracing::debug!("Connection task closed");
                    self.queue.close();
                    self.manager.mark_closed();
                    return;
                }
                Disconnect::Detached => {
                    tracing::debug!("Connection task detached");
                    return;
                }
                Disconnect::Transport(error) => {
                    tracing::warn!(error = %error, "Transport failed");
                    match self.recover(error).await {
                        Recovery::Connected(next) => current = Some(next),
                        Recovery::Closed => {
                            self.queue.close();
                            self.manager.mark_closed();
                            return;
                        }
                        Recovery::Detached => return,
                        Recovery::GaveUp(error) => {
                            tracing::error!(error = %error, "Giving up on reconnect");
                            record_error(&self.last_error, error);
                            self.manager.mark_closed();
                            self.queue.finish();
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn recover(&mut self, mut last_error: WebSocketError) -> Recovery {
        let policy = self.manager.config().reconnect.clone();
        let mut attempt = 0u32;

        loop {
            if !policy.allows(attempt) {
                return Recovery::GaveUp(WebSocketError::ReconnectExhausted {
                    attempts: attempt,
                    last_error: last_error.to_string(),
                });
            }

            let delay = policy.delay_for_attempt(attempt);
            attempt += 1;
            self.manager.mark_disconnected();
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            if let Some(stop) = self.wait(delay).await {
                return stop;
            }

            match self.manager.connect().await {
                Ok(mut connection) => {
                    self.registry.reset_confirmations();
                    match connection.replay(self.registry.all()).await {
                        Ok(_) => {
                            tracing::info!(attempt, "Reconnected");
                            return Recovery::Connected(connection);
                        }
                        Err(e) => {
                            tracing::warn!(attempt, error = %e, "Resubscribe failed");
                            last_error = e;
                        }
                    }
                }
                Err(e) if e.is_auth_error() => {
                    tracing::error!(error = %e, "Login rejected during reconnect");
                    return Recovery::GaveUp(e);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                    last_error = e;
                }
            }
        }
    }

    /// Sleep for the backoff delay while still honouring close/detach.
    /// Subscription changes need no action here; the registry carries them.
    async fn wait(&mut self, delay: Duration) -> Option<Recovery> {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return None,
                command = self.commands.recv() => match command {
                    Some(Command::Close) | None => return Some(Recovery::Closed),
                    Some(Command::Detach) => return Some(Recovery::Detached),
                    Some(_) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert!(policy.max_attempts.is_none());
        assert!(policy.allows(10_000));
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = ReconnectPolicy::default().with_max_attempts(Some(2));
        assert!(policy.allows(0));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));

        let none = ReconnectPolicy::default().with_max_attempts(Some(0));
        assert!(!none.allows(0));
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = ReconnectPolicy::default()
            .with_delays(Duration::from_millis(100), Duration::from_millis(1000))
            .with_jitter(0.0);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = ReconnectPolicy::default()
            .with_delays(Duration::from_millis(1000), Duration::from_secs(60))
            .with_jitter(0.25);
        for _ in 0..100 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(750), "{:?}", delay);
            assert!(delay <= Duration::from_millis(1000), "{:?}", delay);
        }
    }

    #[test]
    fn test_delay_never_zero() {
        let policy = ReconnectPolicy::fixed(Duration::ZERO, None);
        assert_eq!(policy.delay_for_attempt(0), MIN_DELAY);

        let full_jitter = ReconnectPolicy::default()
            .with_delays(Duration::from_millis(1), Duration::from_millis(1))
            .with_jitter(1.0);
        for _ in 0..20 {
            assert!(full_jitter.delay_for_attempt(0) >= MIN_DELAY);
        }
    }
}
