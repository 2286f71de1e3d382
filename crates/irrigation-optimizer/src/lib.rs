//! Gravity delivery optimizer (spec §4.4, component C4): elevation
//! feasibility, minimum-depth envelopes, constrained flow-split
//! optimization, delivery sequencing, safety pre-checks, optional energy
//! recovery scanning and contingency planning, composed by [`optimize::optimize`].

pub mod contingency;
pub mod energy;
pub mod envelope;
pub mod feasibility;
pub mod flow_split;
pub mod metrics;
pub mod optimize;
pub mod safety;
pub mod sequencing;
pub mod types;

pub use contingency::generate_contingencies;
pub use energy::scan_energy_recovery_sites;
pub use envelope::{depth_envelope, detect_hydraulic_jumps};
pub use feasibility::elevation_feasibility;
pub use flow_split::optimize_flow_split;
pub use metrics::delivery_efficiency;
pub use optimize::optimize;
pub use safety::safety_precheck;
pub use sequencing::sequence_deliveries;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use irrigation_core::*;
    use irrigation_hydraulics::{Demands, GateOpenings, Network};
    use irrigation_registry::GateRegistry;
    use std::collections::HashMap;

    fn gravity_network() -> (Network, GateRegistry, NodeId) {
        let mut network = Network::default();
        let source = NodeId::from("reservoir");
        network.nodes.insert(
            source.clone(),
            Node {
                id: source.clone(),
                kind: NodeKind::Reservoir,
                ground_elevation_m: 221.0,
                surface_area_m2: 1e9,
                demand_m3s: 0.0,
                min_depth_m: 0.0,
                max_depth_m: 100.0,
            },
        );
        network.nodes.insert(
            "zoneA".into(),
            Node {
                id: "zoneA".into(),
                kind: NodeKind::Delivery,
                ground_elevation_m: 218.0,
                surface_area_m2: 2000.0,
                demand_m3s: 1.5,
                min_depth_m: 0.3,
                max_depth_m: 4.0,
            },
        );
        network.sections.insert(
            "sec1".into(),
            CanalSection {
                id: "sec1".into(),
                channel_id: "ch1".into(),
                upstream_node: source.clone(),
                downstream_node: "zoneA".into(),
                cross_section: TrapezoidalCrossSection {
                    bottom_width_m: 3.0,
                    side_slope: 1.5,
                },
                length_m: 2000.0,
                manning_n: 0.025,
                bed_slope: 0.0008,
                kind: CanalKind::Earthen,
            },
        );
        let gate = Gate {
            id: "gateA".into(),
            width_m: 2.0,
            max_height_m: 1.2,
            sill_elevation_m: 219.5,
            drop: None,
            calibration: Calibration {
                k1: 0.61,
                k2: 0.0,
                confidence: 0.9,
                method: CalibrationMethod::Direct,
            },
            upstream_node: source.clone(),
            downstream_node: "zoneA".into(),
            max_flow_m3s: 5.0,
        };
        network.gates.insert(gate.id.clone(), gate.clone());

        let registry = GateRegistry::default();
        registry.register(
            gate,
            GateControl {
                kind: ControlKind::Automated(AutomatedControl {
                    scada_tag: "GATEA".into(),
                    actuator: Actuator::Electric,
                    position_sensor: true,
                    comm_protocol: "modbus".into(),
                    comm_address: "x".into(),
                    response_time_budget_s: 120.0,
                    max_slew_rate_per_s: 0.1,
                    equipment_status: EquipmentStatus::Operational,
                    fallback_mode: ControlMode::Manual,
                    last_comm: None,
                    consecutive_failures: 0,
                }),
                control_mode: ControlMode::Auto,
                opening_ratio: 0.4,
            },
        );
        (network, registry, source)
    }

    #[test]
    fn optimize_produces_a_feasible_sequenced_result() {
        let (network, registry, source) = gravity_network();
        let config = Config::default();
        let zone_id: ZoneId = "zoneA".into();
        let mut zone_nodes = HashMap::new();
        zone_nodes.insert(zone_id.clone(), NodeId::from("zoneA"));
        let mut zone_gate = HashMap::new();
        zone_gate.insert(zone_id.clone(), GateId::from("gateA"));
        let mut current_levels = HashMap::new();
        current_levels.insert(source.clone(), 221.0);
        current_levels.insert(NodeId::from("zoneA"), 218.4);

        let demands = vec![ZoneDemandRequest {
            zone_id: zone_id.clone(),
            required_volume_m3: 5000.0,
            required_flow_m3s: 1.5,
            priority: 1,
            time_window: None,
            min_pressure_head_m: None,
        }];

        let options = OptimizeOptions {
            include_contingencies: false,
            include_energy_recovery: false,
            ..OptimizeOptions::default()
        };

        let result = optimize(
            &network,
            &registry,
            &source,
            221.0,
            1.5,
            &zone_nodes,
            &zone_gate,
            &current_levels,
            &demands,
            &GateOpenings::new(),
            &Demands::new(),
            &options,
            &config,
        );

        assert_eq!(result.zone_feasibility.len(), 1);
        assert!(!result.flow_split.gate_settings.is_empty());
        assert!(result.sequence.len() <= 1);
        assert!(result.efficiency >= 0.0 && result.efficiency <= 1.0 + 1e-6);
        let _ = Utc::now();
    }
}
