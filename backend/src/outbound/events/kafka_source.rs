//! Kafka-backed `UserEventSource`.
//!
//! Auto-commit is disabled. An acknowledged delivery commits the offset after
//! its own, so an unacknowledged payload is read again by whichever member of
//! the consumer group owns the partition after a restart or rebalance. A
//! commit is held back while an earlier offset of the same partition is still
//! in flight. Redelivered payloads are queued locally and served before new
//! messages.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::UserEventStreamConfig;
use crate::domain::ports::{UserEventDelivery, UserEventSource, UserEventSourceError};

const RECEIVE_ERROR_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
struct MessagePosition {
    topic: String,
    partition: i32,
    offset: i64,
}

#[derive(Debug, Default)]
struct Ledger {
    in_flight: HashMap<u64, MessagePosition>,
    retries: VecDeque<UserEventDelivery>,
}

impl Ledger {
    /// Settle `id` and return the commit it unlocks, if any.
    fn settle(&mut self, id: u64) -> Option<TopicPartitionList> {
        let position = self.in_flight.remove(&id)?;
        let blocked = self.in_flight.values().any(|other| {
            other.topic == position.topic
                && other.partition == position.partition
                && other.offset < position.offset
        });
        if blocked {
            return None;
        }
        commit_list(&position).ok()
    }
}

fn commit_list(position: &MessagePosition) -> Result<TopicPartitionList, UserEventSourceError> {
    let mut list = TopicPartitionList::new();
    list.add_partition_offset(
        &position.topic,
        position.partition,
        Offset::Offset(position.offset + 1),
    )
    .map_err(|err| UserEventSourceError::transport(err.to_string()))?;
    Ok(list)
}

/// Consumer-group member reading raw user events from one topic.
pub struct KafkaUserEventSource {
    consumer: StreamConsumer,
    ledger: Mutex<Ledger>,
    next_id: AtomicU64,
    closed: AtomicBool,
    closing: Notify,
}

impl KafkaUserEventSource {
    /// Join the configured consumer group and subscribe to its topic.
    ///
    /// # Errors
    ///
    /// Returns [`UserEventSourceError::Transport`] when the client cannot be
    /// created or the subscription is rejected.
    pub fn connect(config: &UserEventStreamConfig) -> Result<Self, UserEventSourceError> {
        let brokers = config.brokers.join(",");
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|err| UserEventSourceError::transport(err.to_string()))?;
        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|err| UserEventSourceError::transport(err.to_string()))?;
        info!(
            brokers = %brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "subscribed to user event stream"
        );
        Ok(Self {
            consumer,
            ledger: Mutex::default(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            closing: Notify::new(),
        })
    }

    /// End the stream; pending and future `next` calls return `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closing.notify_waiters();
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn track(&self, position: MessagePosition, payload: Vec<u8>) -> UserEventDelivery {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.ledger().in_flight.insert(id, position);
        UserEventDelivery {
            id,
            payload,
            attempt: 1,
        }
    }
}

impl std::fmt::Debug for KafkaUserEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaUserEventSource")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UserEventSource for KafkaUserEventSource {
    async fn next(&self) -> Option<UserEventDelivery> {
        loop {
            let closing = self.closing.notified();
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            let retry = self.ledger().retries.pop_front();
            if retry.is_some() {
                return retry;
            }
            let received = tokio::select! {
                () = closing => return None,
                received = self.consumer.recv() => received.map(|message| {
                    let position = MessagePosition {
                        topic: message.topic().to_owned(),
                        partition: message.partition(),
                        offset: message.offset(),
                    };
                    let payload = message.payload().map(<[u8]>::to_vec).unwrap_or_default();
                    (position, payload)
                }),
            };
            match received {
                Ok((position, payload)) => return Some(self.track(position, payload)),
                Err(err) => {
                    warn!(error = %err, "user event receive failed");
                    tokio::time::sleep(RECEIVE_ERROR_PAUSE).await;
                }
            }
        }
    }

    async fn acknowledge(&self, delivery: &UserEventDelivery) -> Result<(), UserEventSourceError> {
        let Some(list) = self.ledger().settle(delivery.id) else {
            debug!(delivery_id = delivery.id, "no offset to commit for delivery");
            return Ok(());
        };
        self.consumer
            .commit(&list, CommitMode::Async)
            .map_err(|err| UserEventSourceError::transport(err.to_string()))
    }

    async fn redeliver(&self, delivery: UserEventDelivery) -> Result<(), UserEventSourceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(UserEventSourceError::closed());
        }
        self.ledger().retries.push_back(UserEventDelivery {
            attempt: delivery.attempt.saturating_add(1),
            ..delivery
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Offset bookkeeping and local queueing; no broker is contacted.
    use super::*;
    use rstest::rstest;

    fn position(partition: i32, offset: i64) -> MessagePosition {
        MessagePosition {
            topic: "user_event".into(),
            partition,
            offset,
        }
    }

    fn committed_offset(list: &TopicPartitionList, partition: i32) -> Option<Offset> {
        list.find_partition("user_event", partition)
            .map(|element| element.offset())
    }

    fn source() -> KafkaUserEventSource {
        KafkaUserEventSource::connect(&UserEventStreamConfig {
            brokers: vec!["127.0.0.1:9".into()],
            topic: "user_event".into(),
            group_id: "user_event_group".into(),
        })
        .expect("client creation does not contact the broker")
    }

    #[rstest]
    fn commit_points_past_the_acknowledged_message() {
        let list = commit_list(&position(2, 41)).expect("list");
        assert_eq!(committed_offset(&list, 2), Some(Offset::Offset(42)));
    }

    #[rstest]
    fn commit_waits_for_earlier_offsets_on_the_partition() {
        let mut ledger = Ledger::default();
        ledger.in_flight.insert(1, position(0, 10));
        ledger.in_flight.insert(2, position(0, 11));
        ledger.in_flight.insert(3, position(1, 5));

        assert!(ledger.settle(2).is_none());
        let list = ledger.settle(3).expect("other partition is independent");
        assert_eq!(committed_offset(&list, 1), Some(Offset::Offset(6)));
        let list = ledger.settle(1).expect("oldest offset commits");
        assert_eq!(committed_offset(&list, 0), Some(Offset::Offset(11)));
    }

    #[rstest]
    fn settling_an_unknown_delivery_commits_nothing() {
        assert!(Ledger::default().settle(7).is_none());
    }

    #[tokio::test]
    async fn redelivered_payload_is_served_first() {
        let source = source();
        let delivery = UserEventDelivery {
            id: 9,
            payload: b"{}".to_vec(),
            attempt: 1,
        };
        source.redeliver(delivery).await.expect("redeliver");

        let again = source.next().await.expect("queued delivery");
        assert_eq!((again.id, again.attempt), (9, 2));
    }

    #[tokio::test]
    async fn close_ends_a_waiting_stream() {
        let source = std::sync::Arc::new(source());
        let waiter = tokio::spawn({
            let source = source.clone();
            async move { source.next().await }
        });
        tokio::task::yield_now().await;
        source.close();

        assert!(waiter.await.expect("join").is_none());
        let late = UserEventDelivery {
            id: 1,
            payload: Vec::new(),
            attempt: 1,
        };
        assert_eq!(
            source.redeliver(late).await,
            Err(UserEventSourceError::closed())
        );
    }

    #[tokio::test]
    async fn acknowledging_an_unknown_delivery_is_ok() {
        let delivery = UserEventDelivery {
            id: 404,
            payload: Vec::new(),
            attempt: 1,
        };
        assert!(source().acknowledge(&delivery).await.is_ok());
    }
}
