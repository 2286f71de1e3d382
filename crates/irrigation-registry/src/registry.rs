use crate::entry::{GateEntry, ListFilter, ModeTransition};
use crate::rules::default_transition_rules;
use chrono::Utc;
use irrigation_core::{ControlMode, EquipmentStatus, Gate, GateControl, TransitionContext, TransitionRule, Trigger};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

use irrigation_core::GateId;

#[derive(Default)]
struct Indices {
    by_mode: HashMap<ControlMode, BTreeSet<GateId>>,
    by_zone: HashMap<String, BTreeSet<GateId>>,
    by_scada_tag: HashMap<String, GateId>,
}

struct State {
    gates: HashMap<GateId, GateEntry>,
    indices: Indices,
}

/// Authoritative, single-writer/many-reader catalog of gates and their
/// control mode (spec §4.1). Writers hold the lock only for the duration of
/// one mutation and rebuild the affected index entries inline; readers take
/// a cloned snapshot of whatever they touch so a solve or an iteration over
/// `list_by` never observes a registry in the middle of being mutated.
pub struct GateRegistry {
    state: RwLock<State>,
    rules: Vec<TransitionRule>,
}

impl Default for GateRegistry {
    fn default() -> Self {
        Self::new(default_transition_rules())
    }
}

impl GateRegistry {
    pub fn new(rules: Vec<TransitionRule>) -> Self {
        Self {
            state: RwLock::new(State {
                gates: HashMap::new(),
                indices: Indices::default(),
            }),
            rules,
        }
    }

    /// Idempotent insert: registering the same id again replaces the entry
    /// in place and relocates it in the indices, it never duplicates or
    /// errors (spec §4.1).
    pub fn register(&self, gate: Gate, control: GateControl) {
        let mut state = self.state.write();
        let id = gate.id.clone();
        if let Some(old) = state.gates.get(&id) {
            Self::unindex(&mut state.indices, &id, old.control.control_mode, old.team_zone());
        }
        let entry = GateEntry {
            gate,
            control,
            mode_history: Vec::new(),
        };
        Self::index(&mut state.indices, &id, &entry);
        state.gates.insert(id.clone(), entry);
        info!(gate_id = %id, "gate registered");
    }

    pub fn get(&self, gate_id: &GateId) -> Option<GateEntry> {
        self.state.read().gates.get(gate_id).cloned()
    }

    /// Constant-time lookup; unknown ids return `None` ("absent", not an
    /// error — spec §4.1 failure semantics).
    pub fn get_mode(&self, gate_id: &GateId) -> Option<ControlMode> {
        self.state.read().gates.get(gate_id).map(|e| e.control.control_mode)
    }

    /// Guarded direct transition used for administrative/operator-driven
    /// mode sets (e.g. an emergency stop, or an external scheduler applying
    /// a maintenance window). Rejects illegal edges: manual gates may only
    /// ever be set to `manual`. Unknown ids and illegal edges are logged
    /// and ignored, never propagated as an error (spec §4.1).
    pub fn update_mode(&self, gate_id: &GateId, new_mode: ControlMode, reason: &str) -> bool {
        let mut state = self.state.write();
        let Some(entry) = state.gates.get_mut(gate_id) else {
            warn!(gate_id = %gate_id, "update_mode on unknown gate ignored");
            return false;
        };
        if entry.control.is_pinned_manual() && new_mode != ControlMode::Manual {
            warn!(gate_id = %gate_id, ?new_mode, "illegal edge on manual-pinned gate ignored");
            return false;
        }
        let old_mode = entry.control.control_mode;
        if old_mode == new_mode {
            return true;
        }
        entry.control.control_mode = new_mode;
        entry.mode_history.push(ModeTransition {
            from: old_mode,
            to: new_mode,
            reason: reason.to_string(),
            at: Utc::now(),
        });
        Self::move_mode_index(&mut state.indices, gate_id, old_mode, new_mode);
        info!(gate_id = %gate_id, ?old_mode, ?new_mode, reason, "gate mode transition");
        true
    }

    /// Forces `failed` on a `failed` equipment status report, per spec
    /// §4.1. Other status reports are recorded without a mode change.
    pub fn update_equipment_status(&self, gate_id: &GateId, status: EquipmentStatus) -> bool {
        let forces_failed = matches!(status, EquipmentStatus::Failed);
        {
            let mut state = self.state.write();
            let Some(entry) = state.gates.get_mut(gate_id) else {
                warn!(gate_id = %gate_id, "update_equipment_status on unknown gate ignored");
                return false;
            };
            if let irrigation_core::ControlKind::Automated(ref mut auto) = entry.control.kind {
                auto.equipment_status = status;
            }
        }
        if forces_failed {
            self.update_mode(gate_id, ControlMode::Failed, "equipment_status_failed");
        }
        true
    }

    /// Maintains `consecutive_failures`; on success resets to zero, on
    /// failure increments and fires `comm_timeout` once the configured
    /// threshold is reached (spec §4.1). Returns `false` for unknown ids.
    pub fn record_communication(&self, gate_id: &GateId, success: bool, comm_failure_threshold: u32) -> bool {
        let (reached_threshold, mode) = {
            let mut state = self.state.write();
            let Some(entry) = state.gates.get_mut(gate_id) else {
                warn!(gate_id = %gate_id, "record_communication on unknown gate ignored");
                return false;
            };
            let failures = match entry.control.kind {
                irrigation_core::ControlKind::Automated(ref mut a) => {
                    a.last_comm = Some(Utc::now());
                    if success {
                        a.consecutive_failures = 0;
                    } else {
                        a.consecutive_failures += 1;
                    }
                    a.consecutive_failures
                }
                irrigation_core::ControlKind::Manual(_) => 0,
            };
            (failures >= comm_failure_threshold.max(1), entry.control.control_mode)
        };
        if reached_threshold && mode == ControlMode::Auto {
            self.fire(gate_id, Trigger::CommTimeout, &TransitionContext::default(), "communication_timeout");
        }
        true
    }

    /// Evaluates rules matching `(trigger, current_mode)` in priority
    /// order; the first whose condition holds applies. A rule with an
    /// unsatisfiable condition is a no-op, not a failure (spec §4.1).
    pub fn fire(&self, gate_id: &GateId, trigger: Trigger, ctx: &TransitionContext, reason: &str) -> bool {
        let current_mode = match self.get_mode(gate_id) {
            Some(m) => m,
            None => return false,
        };
        let mut candidates: Vec<&TransitionRule> = self
            .rules
            .iter()
            .filter(|r| r.trigger == trigger && r.from_mode == current_mode)
            .collect();
        candidates.sort_by_key(|r| r.priority);
        for rule in candidates {
            if (rule.condition)(ctx) {
                return self.update_mode(gate_id, rule.to_mode, reason);
            }
        }
        false
    }

    /// Filtered iteration by mode or manual field-team zone.
    pub fn list_by(&self, filter: ListFilter) -> Vec<GateId> {
        let state = self.state.read();
        match filter {
            ListFilter::Mode(mode) => state
                .indices
                .by_mode
                .get(&mode)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
            ListFilter::TeamZone(zone) => state
                .indices
                .by_zone
                .get(&zone)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    pub fn find_by_scada_tag(&self, tag: &str) -> Option<GateId> {
        self.state.read().indices.by_scada_tag.get(tag).cloned()
    }

    fn index(indices: &mut Indices, id: &GateId, entry: &GateEntry) {
        indices
            .by_mode
            .entry(entry.control.control_mode)
            .or_default()
            .insert(id.clone());
        if let Some(zone) = entry.team_zone() {
            indices.by_zone.entry(zone.to_string()).or_default().insert(id.clone());
        }
        if let Some(tag) = entry.scada_tag() {
            indices.by_scada_tag.insert(tag.to_string(), id.clone());
        }
    }

    fn unindex(indices: &mut Indices, id: &GateId, mode: ControlMode, zone: Option<&str>) {
        if let Some(set) = indices.by_mode.get_mut(&mode) {
            set.remove(id);
        }
        if let Some(zone) = zone {
            if let Some(set) = indices.by_zone.get_mut(zone) {
                set.remove(id);
            }
        }
    }

    fn move_mode_index(indices: &mut Indices, id: &GateId, old_mode: ControlMode, new_mode: ControlMode) {
        if let Some(set) = indices.by_mode.get_mut(&old_mode) {
            set.remove(id);
        }
        indices.by_mode.entry(new_mode).or_default().insert(id.clone());
    }
}
