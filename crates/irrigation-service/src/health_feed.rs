//! Forwards SCADA health-probe outcomes from the one dedicated probe loop
//! to the one task that folds them into a cached per-gate availability
//! snapshot, over `irrigation_concurrent::spsc`'s wait-free single-producer
//! single-consumer queue — a genuine SPSC handoff, unlike the per-gate
//! dispatch queue (which needs priority + multi-producer and is built on
//! `irrigation_adapters::dispatch` instead).

use chrono::{DateTime, Utc};
use irrigation_concurrent::spsc::{Consumer, Producer, SpscError, WaitFreeSpscQueue};
use irrigation_core::GateId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub at: DateTime<Utc>,
    pub success: bool,
}

/// Latest probe result per gate, folded in by [`run_aggregator`]. Read by
/// `get_section_accounting`/the CLI `status` command without touching the
/// `HealthMonitor`'s own rolling history.
#[derive(Default)]
pub struct HealthSnapshot {
    last: RwLock<HashMap<GateId, (DateTime<Utc>, bool)>>,
}

impl HealthSnapshot {
    pub fn last_result(&self, gate_id: &GateId) -> Option<(DateTime<Utc>, bool)> {
        self.last.read().get(gate_id).copied()
    }

    fn record(&self, gate_id: GateId, at: DateTime<Utc>, success: bool) {
        self.last.write().insert(gate_id, (at, success));
    }
}

/// A probe-outcome handoff queue plus the shared snapshot the consumer
/// side folds into. `capacity` must be a power of two >= 2.
pub struct HealthFeed {
    producer: Producer<(GateId, ProbeOutcome)>,
    pub snapshot: Arc<HealthSnapshot>,
}

impl HealthFeed {
    pub fn new(capacity: usize) -> (Self, Consumer<(GateId, ProbeOutcome)>, Arc<HealthSnapshot>) {
        let (producer, consumer) = WaitFreeSpscQueue::with_capacity(capacity);
        let snapshot = Arc::new(HealthSnapshot::default());
        (
            Self {
                producer,
                snapshot: snapshot.clone(),
            },
            consumer,
            snapshot,
        )
    }

    /// Called from the health-probe loop (the single producer). Drops the
    /// outcome with a trace log if the aggregator has fallen behind and
    /// the bounded queue is full, rather than blocking the probe cadence.
    pub fn push(&self, gate_id: GateId, success: bool) {
        let outcome = ProbeOutcome { at: Utc::now(), success };
        if let Err(SpscError::Full) = self.producer.try_push((gate_id, outcome)) {
            tracing::trace!("health feed full, dropping probe outcome");
        }
    }
}

/// Drains `consumer` into `snapshot` until the queue is empty, then
/// returns. Intended to be called on a fixed tick by the single aggregator
/// task that owns `consumer`.
pub fn drain_into_snapshot(consumer: &Consumer<(GateId, ProbeOutcome)>, snapshot: &HealthSnapshot) {
    loop {
        match consumer.try_pop() {
            Ok((gate_id, outcome)) => snapshot.record(gate_id, outcome.at, outcome.success),
            Err(SpscError::Empty) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushed_outcomes_are_visible_after_draining() {
        let (feed, consumer, snapshot) = HealthFeed::new(8);
        feed.push(GateId::from("g1"), true);
        feed.push(GateId::from("g1"), false);
        drain_into_snapshot(&consumer, &snapshot);
        let (_, success) = snapshot.last_result(&GateId::from("g1")).unwrap();
        assert!(!success);
    }
}
