//! Fans the sensor store's anomaly stream out to however many independent
//! subscribers are draining it concurrently — the CLI's `watch` command
//! and any internal check that wants a peek — over
//! `irrigation_concurrent::mpmc`'s lock-free bounded MPMC queue. Spec §9
//! describes a collaborator stream as "a lazy finite sequence of events
//! with cancellation"; `close()` here is that cancellation signal, checked
//! by the poll loop between polls rather than torn down mid-poll.

use irrigation_adapters::{AnomalyEvent, CollaboratorError, SensorStore};
use irrigation_concurrent::mpmc::LockFreeMpmcQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Shared handle: clone it freely, every clone reads the same underlying
/// queue and close flag.
#[derive(Clone)]
pub struct AnomalyFeed {
    queue: LockFreeMpmcQueue<AnomalyEvent>,
    closed: Arc<AtomicBool>,
}

impl AnomalyFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: LockFreeMpmcQueue::with_capacity(capacity),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Non-blocking read for any subscriber; `None` means "nothing pending
    /// right now", not "the feed is closed" — check [`Self::is_closed`]
    /// separately.
    pub fn try_recv(&self) -> Option<AnomalyEvent> {
        self.queue.try_pop().ok()
    }

    /// Drains everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<AnomalyEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// The single poll-loop producer: polls `sensors.anomaly_stream` on
/// `interval` and pushes new events into `feed` until [`AnomalyFeed::close`]
/// is called. Overflow drops the oldest-pending event's worth of backlog by
/// simply failing the push and logging — subscribers that fall behind lose
/// events rather than the producer blocking on a full queue.
pub async fn run_poll_loop(sensors: Arc<dyn SensorStore>, feed: AnomalyFeed, interval: Duration) {
    let mut since = chrono::Utc::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    while !feed.is_closed() {
        ticker.tick().await;
        match sensors.anomaly_stream(since).await {
            Ok(events) => {
                if let Some(last) = events.last() {
                    since = last.timestamp;
                }
                for event in events {
                    if feed.queue.try_push(event).is_err() {
                        warn!("anomaly feed full, dropping event");
                    }
                }
            }
            Err(CollaboratorError::Timeout { .. } | CollaboratorError::Unreachable { .. }) => {
                warn!("anomaly poll failed transiently, will retry next tick");
            }
            Err(e) => {
                warn!(error = %e, "anomaly poll failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn drain_returns_events_in_push_order() {
        let feed = AnomalyFeed::new(4);
        feed.queue
            .try_push(AnomalyEvent {
                gate_id: None,
                section_id: None,
                timestamp: Utc::now(),
                description: "first".into(),
            })
            .unwrap();
        feed.queue
            .try_push(AnomalyEvent {
                gate_id: None,
                section_id: None,
                timestamp: Utc::now(),
                description: "second".into(),
            })
            .unwrap();
        let drained = feed.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].description, "first");
    }

    #[test]
    fn close_flag_round_trips() {
        let feed = AnomalyFeed::new(4);
        assert!(!feed.is_closed());
        feed.close();
        assert!(feed.is_closed());
    }
}
