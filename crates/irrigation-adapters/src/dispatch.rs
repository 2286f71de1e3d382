//! Per-gate bounded command queue with backpressure: SCADA dispatch uses
//! a bounded per-gate queue; on overflow, lowest-priority pending
//! commands are rejected with a typed error rather than blocking the
//! caller. One `priority_queue`-backed queue per gate, instead of one
//! global queue shared by every gate.

use chrono::{DateTime, Utc};
use irrigation_core::GateId;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use priority_queue::PriorityQueue;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GateCommand {
    pub id: Uuid,
    pub gate_id: GateId,
    pub target_m: f64,
    pub transition_s: f64,
    pub priority: u8,
    pub reason: String,
    pub submitted_at: DateTime<Utc>,
}

impl GateCommand {
    pub fn new(gate_id: GateId, target_m: f64, transition_s: f64, priority: u8, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            gate_id,
            target_m,
            transition_s,
            priority,
            reason: reason.into(),
            submitted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("gate {gate_id} command queue is full and the pending command outranks this one")]
    Overflow { gate_id: GateId },
}

struct GateQueue {
    pq: PriorityQueue<Uuid, u8>,
    commands: HashMap<Uuid, GateCommand>,
}

impl GateQueue {
    fn new() -> Self {
        Self {
            pq: PriorityQueue::new(),
            commands: HashMap::new(),
        }
    }

    fn lowest(&self) -> Option<(Uuid, u8)> {
        self.pq.iter().min_by_key(|(_, &priority)| priority).map(|(&id, &p)| (id, p))
    }

    fn push(&mut self, command: GateCommand) {
        self.pq.push(command.id, command.priority);
        self.commands.insert(command.id, command);
    }

    fn pop_highest(&mut self) -> Option<GateCommand> {
        let (id, _) = self.pq.pop()?;
        self.commands.remove(&id)
    }

    fn len(&self) -> usize {
        self.pq.len()
    }
}

/// One bounded priority queue per gate. Command priority is `u8` where
/// higher numbers dispatch first, matching `control_gate`'s `priority`
/// parameter in spec §6.
pub struct DispatchQueue {
    capacity_per_gate: usize,
    gates: Mutex<HashMap<GateId, GateQueue>>,
}

impl DispatchQueue {
    pub fn new(capacity_per_gate: usize) -> Self {
        Self {
            capacity_per_gate: capacity_per_gate.max(1),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueues `command`. On overflow, the pending command with the
    /// lowest priority is evicted if `command` outranks it; otherwise
    /// `command` itself is rejected (spec §5 backpressure policy).
    pub fn enqueue(&self, command: GateCommand) -> Result<(), DispatchError> {
        let mut gates = self.gates.lock();
        let queue = gates.entry(command.gate_id.clone()).or_insert_with(GateQueue::new);
        if queue.len() >= self.capacity_per_gate {
            let Some((lowest_id, lowest_priority)) = queue.lowest() else {
                return Err(DispatchError::Overflow { gate_id: command.gate_id });
            };
            if command.priority <= lowest_priority {
                counter!("dispatch_rejected").increment(1);
                warn!(gate_id = %command.gate_id, priority = command.priority, "dispatch queue full, command rejected");
                return Err(DispatchError::Overflow { gate_id: command.gate_id });
            }
            queue.pq.remove(&lowest_id);
            queue.commands.remove(&lowest_id);
            counter!("dispatch_evicted").increment(1);
        }
        let gate_id = command.gate_id.clone();
        queue.push(command);
        gauge!("dispatch_queue_depth").set(queue.len() as f64);
        counter!("dispatch_enqueued").increment(1);
        let _ = gate_id;
        Ok(())
    }

    /// Pops the highest-priority pending command for `gate_id`, if any.
    pub fn pop_next(&self, gate_id: &GateId) -> Option<GateCommand> {
        let mut gates = self.gates.lock();
        let queue = gates.get_mut(gate_id)?;
        let command = queue.pop_highest();
        if queue.len() == 0 {
            gates.remove(gate_id);
        }
        command
    }

    pub fn depth(&self, gate_id: &GateId) -> usize {
        self.gates.lock().get(gate_id).map(|q| q.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_priority_command_rejected_when_full() {
        let queue = DispatchQueue::new(1);
        let gate: GateId = "g1".into();
        queue.enqueue(GateCommand::new(gate.clone(), 1.0, 60.0, 5, "first")).unwrap();
        let result = queue.enqueue(GateCommand::new(gate.clone(), 1.2, 60.0, 2, "second"));
        assert!(matches!(result, Err(DispatchError::Overflow { .. })));
        assert_eq!(queue.depth(&gate), 1);
    }

    #[test]
    fn higher_priority_command_evicts_the_lowest() {
        let queue = DispatchQueue::new(1);
        let gate: GateId = "g1".into();
        queue.enqueue(GateCommand::new(gate.clone(), 1.0, 60.0, 2, "first")).unwrap();
        queue.enqueue(GateCommand::new(gate.clone(), 1.2, 60.0, 9, "urgent")).unwrap();
        let next = queue.pop_next(&gate).unwrap();
        assert_eq!(next.priority, 9);
        assert!(queue.pop_next(&gate).is_none());
    }

    #[test]
    fn pops_highest_priority_first() {
        let queue = DispatchQueue::new(4);
        let gate: GateId = "g1".into();
        queue.enqueue(GateCommand::new(gate.clone(), 1.0, 60.0, 1, "low")).unwrap();
        queue.enqueue(GateCommand::new(gate.clone(), 1.0, 60.0, 7, "high")).unwrap();
        queue.enqueue(GateCommand::new(gate.clone(), 1.0, 60.0, 4, "mid")).unwrap();
        assert_eq!(queue.pop_next(&gate).unwrap().priority, 7);
        assert_eq!(queue.pop_next(&gate).unwrap().priority, 4);
        assert_eq!(queue.pop_next(&gate).unwrap().priority, 1);
    }
}
