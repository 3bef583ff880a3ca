//! Subscription registry for WebSocket channels.
//!
//! Tracks every subscription the caller has requested so the set can be
//! replayed after a reconnect. The registry is not owned by any single
//! connection: it outlives each transport and is re-attached to the next.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::websocket::types::Subscription;

#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Insertion sequence number, used for deterministic replay order
    seq: u64,
    /// Set when the server acknowledged the subscribe on the current connection
    confirmed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Subscription, Entry>,
    next_seq: u64,
}

/// Thread-safe set of subscriptions keyed by structural identity.
///
/// Cloning yields another handle to the same registry. Membership tests are
/// O(1); [`all`](Self::all) returns entries in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscription. Returns `true` if it was not already present.
    pub fn add(&self, subscription: Subscription) -> bool {
        let mut inner = self.lock();
        if inner.entries.contains_key(&subscription) {
            return false;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            subscription,
            Entry {
                seq,
                confirmed: false,
            },
        );
        true
    }

    /// Remove a subscription. Returns `true` if it was present.
    pub fn remove(&self, subscription: &Subscription) -> bool {
        self.lock().entries.remove(subscription).is_some()
    }

    pub fn contains(&self, subscription: &Subscription) -> bool {
        self.lock().entries.contains_key(subscription)
    }

    /// All subscriptions in insertion order.
    pub fn all(&self) -> Vec<Subscription> {
        let inner = self.lock();
        let mut ordered: Vec<(&Subscription, u64)> = inner
            .entries
            .iter()
            .map(|(subscription, entry)| (subscription, entry.seq))
            .collect();
        ordered.sort_by_key(|(_, seq)| *seq);
        ordered.into_iter().map(|(subscription, _)| subscription.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Mark a subscription as acknowledged. Returns `false` if unknown.
    pub fn confirm(&self, subscription: &Subscription) -> bool {
        match self.lock().entries.get_mut(subscription) {
            Some(entry) => {
                entry.confirmed = true;
                true
            }
            None => false,
        }
    }

    pub fn is_confirmed(&self, subscription: &Subscription) -> bool {
        self.lock()
            .entries
            .get(subscription)
            .map_or(false, |entry| entry.confirmed)
    }

    /// Clear every ack bit; called when a new connection replaces the old one.
    pub fn reset_confirmations(&self) {
        for entry in self.lock().entries.values_mut() {
            entry.confirmed = false;
        }
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let registry = SubscriptionRegistry::new();

        assert!(registry.add(Subscription::tickers("BTC-USDT")));
        assert!(registry.add(Subscription::tickers("ETH-USDT")));
        assert!(!registry.add(Subscription::tickers("BTC-USDT")));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_remove() {
        let registry = SubscriptionRegistry::new();
        let sub = Subscription::trades("BTC-USDT");

        registry.add(sub.clone());
        assert!(registry.contains(&sub));
        assert!(registry.remove(&sub));
        assert!(!registry.remove(&sub));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_all_preserves_insertion_order() {
        let registry = SubscriptionRegistry::new();
        let subs: Vec<Subscription> = ["C-USDT", "A-USDT", "B-USDT", "D-USDT"]
            .iter()
            .map(|inst| Subscription::tickers(*inst))
            .collect();
        for sub in &subs {
            registry.add(sub.clone());
        }

        // Removing and re-adding moves an entry to the end.
        registry.remove(&subs[1]);
        registry.add(subs[1].clone());

        let expected = vec![
            subs[0].clone(),
            subs[2].clone(),
            subs[3].clone(),
            subs[1].clone(),
        ];
        assert_eq!(registry.all(), expected);
    }

    #[test]
    fn test_confirmation_bit() {
        let registry = SubscriptionRegistry::new();
        let sub = Subscription::tickers("BTC-USDT");

        assert!(!registry.confirm(&sub));
        registry.add(sub.clone());
        assert!(!registry.is_confirmed(&sub));
        assert!(registry.confirm(&sub));
        assert!(registry.is_confirmed(&sub));

        registry.reset_confirmations();
        assert!(!registry.is_confirmed(&sub));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = SubscriptionRegistry::new();
        let handle = registry.clone();
        handle.add(Subscription::balance_and_position());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_concurrent_adds() {
        let registry = SubscriptionRegistry::new();
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        // Half the ids collide across threads.
                        registry.add(Subscription::tickers(format!("INST-{}", (t % 2) * 1000 + i)));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(registry.count(), 100);
    }
}
