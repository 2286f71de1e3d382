use irrigation_core::{Config, GateId, HydraulicState, Warning};
use irrigation_hydraulics::{simulate_gate_change, Demands, GateOpenings, Network};
use irrigation_registry::GateRegistry;

/// Safety pre-check invoked before any gate dispatch (spec §4.4.5):
/// simulates the candidate setting via [`simulate_gate_change`] and flags
/// warnings on the resulting final state. Warnings never block dispatch
/// here — only a warning explicitly tagged `"blocked"` by a policy overlay
/// does (spec says that tag is "reserved for policy overlays" and never
/// produced automatically by this check).
#[allow(clippy::too_many_arguments)]
pub fn safety_precheck(
    network: &Network,
    registry: &GateRegistry,
    base_openings: &GateOpenings,
    demands: &Demands,
    config: &Config,
    gate_id: &GateId,
    target_opening_m: f64,
    transition_seconds: f64,
) -> (Vec<Warning>, HydraulicState) {
    let trajectory = simulate_gate_change(
        network,
        registry,
        base_openings,
        demands,
        &config.solver,
        gate_id,
        target_opening_m,
        transition_seconds,
    );
    let final_state = trajectory
        .last()
        .map(|step| step.state.clone())
        .unwrap_or_else(|| HydraulicState::empty(chrono::Utc::now()));

    let mut warnings = Vec::new();

    for section in network.sections.values() {
        let Some(&flow) = final_state.section_flows_m3s.get(&section.id) else {
            continue;
        };
        let up_level = final_state.node_levels_m.get(&section.upstream_node).copied().unwrap_or(0.0);
        let down_level = final_state.node_levels_m.get(&section.downstream_node).copied().unwrap_or(0.0);
        let up_ground = network.nodes.get(&section.upstream_node).map(|n| n.ground_elevation_m).unwrap_or(0.0);
        let down_ground = network
            .nodes
            .get(&section.downstream_node)
            .map(|n| n.ground_elevation_m)
            .unwrap_or(0.0);
        let depth = (((up_level - up_ground) + (down_level - down_ground)) / 2.0).max(0.0);
        let area = section.cross_section.area(depth);
        if area > 1e-9 {
            let velocity = flow.abs() / area;
            if velocity > config.max_flow_velocity_ms {
                warnings.push(Warning::new(
                    "predicted_velocity_exceeded",
                    format!("section {} predicted velocity {velocity:.3} m/s exceeds {} m/s", section.id, config.max_flow_velocity_ms),
                ));
            }
        }
    }

    for (node_id, node) in network.nodes.iter() {
        if node.is_reservoir() {
            continue;
        }
        let Some(&level) = final_state.node_levels_m.get(node_id) else {
            continue;
        };
        let depth = level - node.ground_elevation_m;
        if depth > 0.9 * node.max_depth_m {
            warnings.push(Warning::new(
                "node_depth_near_max",
                format!("node {node_id} predicted depth {depth:.3} m exceeds 90% of max depth {:.3} m", node.max_depth_m),
            ));
        }
        if depth < 1.5 * node.min_depth_m {
            warnings.push(Warning::new(
                "node_depth_near_min",
                format!("node {node_id} predicted depth {depth:.3} m below 1.5x min depth {:.3} m", node.min_depth_m),
            ));
        }
    }

    if let Some(gate) = network.gates.get(gate_id) {
        if let Some(node) = network.nodes.get(&gate.downstream_node) {
            let downstream_demand = demands.get(&gate.downstream_node).copied().unwrap_or(node.demand_m3s);
            let opening_ratio = target_opening_m / gate.max_opening_m().max(1e-9);
            if downstream_demand > 0.0 && opening_ratio < 0.1 {
                warnings.push(Warning::new(
                    "demand_unmet_by_near_closed_gate",
                    format!(
                        "gate {gate_id} target opening ratio {opening_ratio:.3} leaves downstream demand {downstream_demand:.3} m3/s unmet"
                    ),
                ));
            }
        }
    }

    (warnings, final_state)
}
