//! In-process message bus.
//!
//! Collapses the pub/sub-with-queue-groups semantics the coordinator and
//! workers are built against onto `tokio::sync::broadcast` (fan-out to every
//! subscriber) and `tokio::sync::mpsc` (load-balanced delivery to exactly one
//! member of a named group), registered per subject in a `DashMap`. A single
//! process hosts every phase worker and bulk-op worker, so there is no wire
//! protocol to speak — but the trait boundary is exactly what a NATS-backed
//! or Redis-streams-backed implementation would need to satisfy, which is
//! the point: swapping the backing store later touches only this module.

pub mod subjects;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{broadcast, mpsc};

use snapforge_common::{Result, SnapError};

/// Capacity of each broadcast channel. A slow fan-out subscriber that falls
/// this far behind starts missing messages (`broadcast::error::RecvError::Lagged`);
/// progress-stream subscribers are the only fan-out consumers and resync
/// from the job store on reconnect, so this is an acceptable trade.
const BROADCAST_CAPACITY: usize = 1024;

/// Bound of each queue-group member's mailbox. Phase and bulk-op workers
/// pull from this continuously, so backpressure here means the publisher
/// (the coordinator) briefly awaits a slow worker rather than buffering
/// unboundedly.
const QUEUE_MAILBOX_CAPACITY: usize = 256;

/// A subject's pub/sub behavior, chosen by how it is subscribed to rather
/// than declared up front — matching how the fan-out (progress) and
/// queue-group (phase/bulk-op work) subjects are used side by side on the
/// same bus.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a raw payload to `subject`. Delivered to every broadcast
    /// subscriber and to exactly one member of each distinct queue group
    /// subscribed to `subject`.
    async fn publish_raw(&self, subject: &str, payload: Bytes) -> Result<()>;

    /// Fan-out subscription: every message published to `subject` after
    /// this call is delivered to this subscription, independent of any
    /// other subscriber.
    async fn subscribe(&self, subject: &str) -> Result<BusSubscription>;

    /// Queue-group subscription: messages published to `subject` are
    /// load-balanced round-robin across every live member of `group`.
    /// Workers of the same kind call this with the same group name so a
    /// job fans out to exactly one worker, not all of them.
    async fn queue_subscribe(&self, subject: &str, group: &str) -> Result<BusSubscription>;
}

/// Either side of a subscription returned by [`MessageBus`].
pub enum BusSubscription {
    Broadcast(broadcast::Receiver<Bytes>),
    Queue(mpsc::Receiver<Bytes>),
}

impl BusSubscription {
    /// Await the next message, or `None` once the bus side has been torn
    /// down. A `Lagged` broadcast receiver skips forward and keeps going —
    /// callers that need strict delivery order must resync from durable
    /// state instead (the progress stream does this via the job store).
    pub async fn recv(&mut self) -> Option<Bytes> {
        match self {
            BusSubscription::Broadcast(rx) => loop {
                match rx.recv().await {
                    Ok(msg) => return Some(msg),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "broadcast subscriber lagged, resubscribing");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
            BusSubscription::Queue(rx) => rx.recv().await,
        }
    }
}

#[derive(Default)]
struct GroupState {
    members: std::sync::Mutex<Vec<mpsc::Sender<Bytes>>>,
    next: AtomicUsize,
}

impl GroupState {
    fn members_snapshot(&self) -> Vec<mpsc::Sender<Bytes>> {
        self.members
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// In-process [`MessageBus`] backed by broadcast and mpsc channels, keyed
/// per subject in a concurrent map.
#[derive(Clone, Default)]
pub struct InProcessBus {
    broadcasters: Arc<DashMap<String, broadcast::Sender<Bytes>>>,
    groups: Arc<DashMap<(String, String), Arc<GroupState>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn broadcaster_for(&self, subject: &str) -> broadcast::Sender<Bytes> {
        self.broadcasters
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn publish_raw(&self, subject: &str, payload: Bytes) -> Result<()> {
        // Fan-out: ignore the "no receivers" error, a subject with nobody
        // listening yet is not a failure.
        let _ = self.broadcaster_for(subject).send(payload.clone());

        for entry in self.groups.iter() {
            let (subj, _group) = entry.key();
            if subj != subject {
                continue;
            }
            let state = entry.value();
            let members = state.members_snapshot();
            if members.is_empty() {
                continue;
            }
            let idx = state.next.fetch_add(1, Ordering::Relaxed) % members.len();
            if members[idx].send(payload.clone()).await.is_err() {
                return Err(SnapError::Bus(format!(
                    "queue group member for subject '{subject}' is gone"
                )));
            }
        }

        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<BusSubscription> {
        Ok(BusSubscription::Broadcast(
            self.broadcaster_for(subject).subscribe(),
        ))
    }

    async fn queue_subscribe(&self, subject: &str, group: &str) -> Result<BusSubscription> {
        let (tx, rx) = mpsc::channel(QUEUE_MAILBOX_CAPACITY);
        let key = (subject.to_string(), group.to_string());
        let entry = self
            .groups
            .entry(key)
            .or_insert_with(|| Arc::new(GroupState::default()));

        entry
            .members
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);

        Ok(BusSubscription::Queue(rx))
    }
}

/// Serialize `value` as JSON and publish it to `subject`.
pub async fn publish_json<T: Serialize + Sync>(
    bus: &dyn MessageBus,
    subject: &str,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    bus.publish_raw(subject, Bytes::from(bytes)).await
}

/// Deserialize the next message on a subscription as JSON, skipping
/// malformed payloads (logged, never fatal to the subscriber loop).
pub async fn recv_json<T: DeserializeOwned>(sub: &mut BusSubscription) -> Option<T> {
    loop {
        let raw = sub.recv().await?;
        match serde_json::from_slice(&raw) {
            Ok(value) => return Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed bus message");
                continue;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_fans_out_to_every_subscriber() {
        let bus = InProcessBus::new();
        let mut a = bus.subscribe("progress.123").await.unwrap();
        let mut b = bus.subscribe("progress.123").await.unwrap();

        publish_json(&bus, "progress.123", &42u32).await.unwrap();

        assert_eq!(recv_json::<u32>(&mut a).await, Some(42));
        assert_eq!(recv_json::<u32>(&mut b).await, Some(42));
    }

    #[tokio::test]
    async fn queue_group_load_balances_round_robin() {
        let bus = InProcessBus::new();
        let mut w1 = bus.queue_subscribe("phase.mos.jobs", "phase-workers").await.unwrap();
        let mut w2 = bus.queue_subscribe("phase.mos.jobs", "phase-workers").await.unwrap();

        publish_json(&bus, "phase.mos.jobs", &1u32).await.unwrap();
        publish_json(&bus, "phase.mos.jobs", &2u32).await.unwrap();

        let first = recv_json::<u32>(&mut w1).await;
        let second = recv_json::<u32>(&mut w2).await;

        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
    }

    #[tokio::test]
    async fn distinct_queue_groups_each_receive_their_own_copy() {
        let bus = InProcessBus::new();
        let mut a = bus.queue_subscribe("bulkop.abc.batches", "executors").await.unwrap();
        let mut b = bus.queue_subscribe("bulkop.abc.batches", "auditors").await.unwrap();

        publish_json(&bus, "bulkop.abc.batches", &"hello").await.unwrap();

        assert_eq!(recv_json::<String>(&mut a).await, Some("hello".to_string()));
        assert_eq!(recv_json::<String>(&mut b).await, Some("hello".to_string()));
    }
}
