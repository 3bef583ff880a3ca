//! Bounded, single-consumer delivery queue between the router and the caller.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::websocket::types::InboundMessage;

/// What happens when the queue is full and another message arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Suspend the read loop until the caller makes room (backpressure).
    ///
    /// While suspended the connection also stops reading commands and sending
    /// keepalive pings. Subscribe and unsubscribe calls still return once their
    /// command is buffered, but the frames go out only after the caller drains
    /// the queue. A caller that stops receiving and issues more than
    /// [`command_channel_capacity`](crate::websocket::WebSocketConfig::command_channel_capacity)
    /// such calls from the same task will wait forever; keep receiving from
    /// another task or use [`DropOldest`](Self::DropOldest).
    #[default]
    Block,
    /// Discard the oldest queued message to make room.
    DropOldest,
}

#[derive(Debug, Default)]
struct State {
    items: VecDeque<InboundMessage>,
    /// No further pushes accepted; pops drain what is left
    finished: bool,
    /// Terminal: caller closed the stream
    closed: bool,
    dropped: u64,
}

/// FIFO of inbound messages awaiting delivery.
///
/// `pop` is cancellation-safe: a message is only removed from the queue in
/// the same synchronous step that returns it.
#[derive(Debug)]
pub struct PendingQueue {
    state: Mutex<State>,
    capacity: usize,
    policy: OverflowPolicy,
    readable: Notify,
    writable: Notify,
}

impl PendingQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(State::default()),
            capacity: capacity.max(1),
            policy,
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a message. Returns `false` once the queue no longer accepts input.
    pub async fn push(&self, message: InboundMessage) -> bool {
        let mut message = Some(message);
        loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed || state.finished {
                    return false;
                }
                if state.items.len() >= self.capacity && self.policy == OverflowPolicy::DropOldest {
                    state.items.pop_front();
                    state.dropped += 1;
                    tracing::warn!(
                        capacity = self.capacity,
                        dropped_total = state.dropped,
                        "Pending queue full, dropped oldest message"
                    );
                }
                if state.items.len() < self.capacity {
                    if let Some(message) = message.take() {
                        state.items.push_back(message);
                    }
                    drop(state);
                    self.readable.notify_one();
                    return true;
                }
            }

            notified.await;
        }
    }

    /// Dequeue the next message, waiting if necessary. `None` is end-of-stream.
    pub async fn pop(&self) -> Option<InboundMessage> {
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(message) = state.items.pop_front() {
                    drop(state);
                    self.writable.notify_one();
                    return Some(message);
                }
                if state.finished {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Dequeue without waiting.
    pub fn try_pop(&self) -> Option<InboundMessage> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        let message = state.items.pop_front();
        if message.is_some() {
            self.writable.notify_one();
        }
        message
    }

    /// Stop accepting input; queued messages are still delivered, then end-of-stream.
    pub fn finish(&self) {
        self.lock().finished = true;
        self.wake_all();
    }

    /// Undo [`finish`](Self::finish) after a successful manual reconnect.
    /// Has no effect once the queue is closed.
    pub fn reopen(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.finished = false;
        true
    }

    /// Terminal close: discard queued messages and end the stream for good.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.items.clear();
        }
        self.wake_all();
    }

    fn wake_all(&self) {
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages discarded under [`OverflowPolicy::DropOldest`].
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
