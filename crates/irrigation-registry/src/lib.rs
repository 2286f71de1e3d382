//! Authoritative gate catalog and control-mode state machine (spec §4.1,
//! component C1). Hydraulics and the optimizer consume [`GateRegistry`]
//! read-only; only this crate ever mutates a gate's `control_mode`.

mod entry;
mod registry;
mod rules;

pub use entry::{GateEntry, ListFilter, ModeTransition};
pub use registry::GateRegistry;
pub use rules::default_transition_rules;

#[cfg(test)]
mod tests {
    use super::*;
    use irrigation_core::*;

    fn automated_gate(id: &str) -> (Gate, GateControl) {
        let gate = Gate {
            id: GateId::from(id),
            width_m: 2.0,
            max_height_m: 1.5,
            sill_elevation_m: 0.0,
            drop: None,
            calibration: Calibration::type_default(),
            upstream_node: NodeId::from("n1"),
            downstream_node: NodeId::from("n2"),
            max_flow_m3s: 10.0,
        };
        let control = GateControl {
            kind: ControlKind::Automated(AutomatedControl {
                scada_tag: format!("{id}-TAG"),
                actuator: Actuator::Electric,
                position_sensor: true,
                comm_protocol: "modbus".into(),
                comm_address: "10.0.0.1".into(),
                response_time_budget_s: 5.0,
                max_slew_rate_per_s: 0.1,
                equipment_status: EquipmentStatus::Operational,
                fallback_mode: ControlMode::Manual,
                last_comm: None,
                consecutive_failures: 0,
            }),
            control_mode: ControlMode::Auto,
            opening_ratio: 0.5,
        };
        (gate, control)
    }

    #[test]
    fn register_and_lookup() {
        let reg = GateRegistry::default();
        let (gate, control) = automated_gate("G1");
        reg.register(gate, control);
        assert_eq!(reg.get_mode(&GateId::from("G1")), Some(ControlMode::Auto));
        assert_eq!(reg.find_by_scada_tag("G1-TAG"), Some(GateId::from("G1")));
    }

    #[test]
    fn unknown_gate_queries_are_absent_not_errors() {
        let reg = GateRegistry::default();
        assert_eq!(reg.get_mode(&GateId::from("ghost")), None);
        assert!(!reg.update_mode(&GateId::from("ghost"), ControlMode::Manual, "x"));
    }

    #[test]
    fn comm_timeout_trips_to_manual_at_threshold() {
        let reg = GateRegistry::default();
        let (gate, control) = automated_gate("G1");
        let id = gate.id.clone();
        reg.register(gate, control);
        reg.record_communication(&id, false, 3);
        reg.record_communication(&id, false, 3);
        assert_eq!(reg.get_mode(&id), Some(ControlMode::Auto));
        reg.record_communication(&id, false, 3);
        assert_eq!(reg.get_mode(&id), Some(ControlMode::Manual));
    }

    #[test]
    fn manual_to_auto_requires_checks_and_operator_approval() {
        let reg = GateRegistry::default();
        let (gate, control) = automated_gate("G1");
        let id = gate.id.clone();
        reg.register(gate, control);
        reg.record_communication(&id, false, 1);
        assert_eq!(reg.get_mode(&id), Some(ControlMode::Manual));

        let ctx = TransitionContext {
            checks_pass: true,
            operator_approved: false,
            fault_cleared: true,
        };
        assert!(!reg.fire(&id, Trigger::OperatorApproval, &ctx, "recover"));
        assert_eq!(reg.get_mode(&id), Some(ControlMode::Manual));

        let ctx = TransitionContext {
            checks_pass: true,
            operator_approved: true,
            fault_cleared: true,
        };
        assert!(reg.fire(&id, Trigger::OperatorApproval, &ctx, "recover"));
        assert_eq!(reg.get_mode(&id), Some(ControlMode::Auto));
    }

    #[test]
    fn manual_pinned_gate_rejects_non_manual_edges() {
        let reg = GateRegistry::default();
        let gate = Gate {
            id: GateId::from("M1"),
            width_m: 1.0,
            max_height_m: 1.0,
            sill_elevation_m: 0.0,
            drop: None,
            calibration: Calibration::type_default(),
            upstream_node: NodeId::from("n1"),
            downstream_node: NodeId::from("n2"),
            max_flow_m3s: 2.0,
        };
        let control = GateControl {
            kind: ControlKind::Manual(ManualControl {
                operation_method: OperationMethod::Wheel,
                turns_to_open: 12,
                force_category: ForceCategory::Moderate,
                field_team_zone: "zone-a".into(),
                last_operation: None,
                typical_operation_duration_s: 300.0,
            }),
            control_mode: ControlMode::Manual,
            opening_ratio: 0.0,
        };
        reg.register(gate, control);
        let id = GateId::from("M1");
        assert!(!reg.update_mode(&id, ControlMode::Auto, "bad edge"));
        assert_eq!(reg.get_mode(&id), Some(ControlMode::Manual));
        assert_eq!(reg.list_by(ListFilter::TeamZone("zone-a".into())), vec![id]);
    }

    #[test]
    fn equipment_failure_forces_failed_mode() {
        let reg = GateRegistry::default();
        let (gate, control) = automated_gate("G1");
        let id = gate.id.clone();
        reg.register(gate, control);
        reg.update_equipment_status(&id, EquipmentStatus::Failed);
        assert_eq!(reg.get_mode(&id), Some(ControlMode::Failed));
    }
}
