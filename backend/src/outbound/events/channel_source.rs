//! In-process `UserEventSource` backed by a bounded tokio channel.
//!
//! Producers hold cloneable [`UserEventSender`] handles. Redelivered payloads
//! are queued locally and served before new ones. The stream ends once every
//! sender is dropped and both queues are drained.
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::ports::{UserEventDelivery, UserEventSource, UserEventSourceError};

#[derive(Debug, Default)]
struct Ledger {
    in_flight: HashSet<u64>,
    retries: VecDeque<UserEventDelivery>,
    acknowledged: u64,
}

/// Producer handle for [`ChannelUserEventSource`].
#[derive(Debug, Clone)]
pub struct UserEventSender {
    sender: mpsc::Sender<UserEventDelivery>,
    next_id: Arc<AtomicU64>,
}

impl UserEventSender {
    /// Enqueue a raw payload, waiting for capacity.
    ///
    /// # Errors
    ///
    /// Returns [`UserEventSourceError::Closed`] once the source is dropped.
    pub async fn send(&self, payload: impl Into<Vec<u8>>) -> Result<u64, UserEventSourceError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sender
            .send(UserEventDelivery {
                id,
                payload: payload.into(),
                attempt: 1,
            })
            .await
            .map_err(|_| UserEventSourceError::closed())?;
        Ok(id)
    }
}

/// Channel-backed at-least-once event source.
#[derive(Debug)]
pub struct ChannelUserEventSource {
    receiver: tokio::sync::Mutex<mpsc::Receiver<UserEventDelivery>>,
    ledger: Mutex<Ledger>,
}

impl ChannelUserEventSource {
    /// Create a source with room for `capacity` undelivered payloads.
    pub fn new(capacity: usize) -> (Self, UserEventSender) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let source = Self {
            receiver: tokio::sync::Mutex::new(receiver),
            ledger: Mutex::default(),
        };
        let handle = UserEventSender {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        (source, handle)
    }

    /// Number of deliveries acknowledged so far.
    pub fn acknowledged(&self) -> u64 {
        self.ledger().acknowledged
    }

    /// Number of deliveries handed out but not yet settled.
    pub fn in_flight(&self) -> usize {
        self.ledger().in_flight.len()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn track(&self, delivery: UserEventDelivery) -> UserEventDelivery {
        self.ledger().in_flight.insert(delivery.id);
        delivery
    }
}

#[async_trait]
impl UserEventSource for ChannelUserEventSource {
    async fn next(&self) -> Option<UserEventDelivery> {
        let retry = self.ledger().retries.pop_front();
        if let Some(delivery) = retry {
            return Some(self.track(delivery));
        }
        let received = self.receiver.lock().await.recv().await;
        received.map(|delivery| self.track(delivery))
    }

    async fn acknowledge(&self, delivery: &UserEventDelivery) -> Result<(), UserEventSourceError> {
        let mut ledger = self.ledger();
        if ledger.in_flight.remove(&delivery.id) {
            ledger.acknowledged += 1;
        } else {
            debug!(delivery_id = delivery.id, "acknowledging unknown delivery");
        }
        Ok(())
    }

    async fn redeliver(&self, delivery: UserEventDelivery) -> Result<(), UserEventSourceError> {
        let mut ledger = self.ledger();
        ledger.in_flight.remove(&delivery.id);
        ledger.retries.push_back(UserEventDelivery {
            attempt: delivery.attempt.saturating_add(1),
            ..delivery
        });
        Ok(())
    }
}
