use crate::flow_split::optimize_flow_split;
use crate::metrics::delivery_efficiency;
use crate::sequencing::sequence_deliveries;
use crate::types::{ContingencyPlan, Objective, ZoneFeasibility};
use chrono::{DateTime, Utc};
use irrigation_core::{Config, ControlMode, GateId, NodeId, Warning, ZoneDemandRequest, ZoneId};
use irrigation_hydraulics::Network;
use irrigation_registry::GateRegistry;
use std::collections::HashMap;

const ALL_MODES: [ControlMode; 5] = [
    ControlMode::Auto,
    ControlMode::Manual,
    ControlMode::Transitioning,
    ControlMode::Maintenance,
    ControlMode::Failed,
];

/// Stands up an in-memory copy of `registry` with a single gate forced
/// into `override_mode`, used to evaluate "what if this gate were stuck
/// closed" without mutating the live, authoritative registry (spec
/// §4.4.7's per-critical-gate stuck-closed contingency).
fn registry_with_override(registry: &GateRegistry, override_id: &GateId, override_mode: ControlMode) -> GateRegistry {
    let clone = GateRegistry::default();
    for mode in ALL_MODES {
        for id in registry.list_by(irrigation_registry::ListFilter::Mode(mode)) {
            if let Some(entry) = registry.get(&id) {
                clone.register(entry.gate, entry.control);
            }
        }
    }
    clone.update_mode(override_id, override_mode, "contingency_stuck_closed");
    clone
}

#[allow(clippy::too_many_arguments)]
fn re_optimize(
    network: &Network,
    registry: &GateRegistry,
    source: &NodeId,
    demands: &[ZoneDemandRequest],
    feasibility: &[ZoneFeasibility],
    zone_nodes: &HashMap<ZoneId, NodeId>,
    zone_gate: &HashMap<ZoneId, GateId>,
    current_levels: &HashMap<NodeId, f64>,
    total_inflow_m3s: f64,
    objective: Objective,
    now: DateTime<Utc>,
    config: &Config,
) -> (crate::types::FlowSplitResult, Vec<crate::types::DeliveryWindow>, f64, Vec<Warning>) {
    let (flow_split, warnings) = optimize_flow_split(
        network,
        registry,
        source,
        demands,
        zone_nodes,
        current_levels,
        total_inflow_m3s,
        objective,
        config,
    );
    let sequence = sequence_deliveries(network, source, demands, feasibility, zone_nodes, &flow_split.gate_settings, zone_gate, now);
    let efficiency = delivery_efficiency(&flow_split.gate_settings, zone_gate, demands);
    (flow_split, sequence, efficiency, warnings)
}

/// Generates the spec §4.4.7 minimum contingency set: a 50% main-channel
/// blockage, a stuck-closed variant for each gate on a zone's critical
/// path, and a low-source (70% inflow, priority ≤ 2 only) variant.
#[allow(clippy::too_many_arguments)]
pub fn generate_contingencies(
    network: &Network,
    registry: &GateRegistry,
    source: &NodeId,
    demands: &[ZoneDemandRequest],
    feasibility: &[ZoneFeasibility],
    zone_nodes: &HashMap<ZoneId, NodeId>,
    zone_gate: &HashMap<ZoneId, GateId>,
    current_levels: &HashMap<NodeId, f64>,
    total_inflow_m3s: f64,
    now: DateTime<Utc>,
    config: &Config,
) -> Vec<ContingencyPlan> {
    let mut plans = Vec::new();

    {
        let (flow_split, sequence, efficiency, warnings) = re_optimize(
            network,
            registry,
            source,
            demands,
            feasibility,
            zone_nodes,
            zone_gate,
            current_levels,
            total_inflow_m3s * 0.5,
            Objective::MaximizeEfficiency,
            now,
            config,
        );
        plans.push(ContingencyPlan {
            name: "main_channel_50pct_blockage".to_string(),
            flow_split,
            sequence,
            efficiency,
            warnings,
        });
    }

    let critical_gates: std::collections::BTreeSet<GateId> = feasibility
        .iter()
        .flat_map(|f| f.critical_sections.iter())
        .filter_map(|section_id| network.sections.get(section_id))
        .filter_map(|section| {
            network
                .gates
                .values()
                .find(|g| g.upstream_node == section.upstream_node || g.downstream_node == section.downstream_node)
                .map(|g| g.id.clone())
        })
        .collect();

    for gate_id in &critical_gates {
        let temp_registry = registry_with_override(registry, gate_id, ControlMode::Failed);
        let (flow_split, sequence, efficiency, warnings) = re_optimize(
            network,
            &temp_registry,
            source,
            demands,
            feasibility,
            zone_nodes,
            zone_gate,
            current_levels,
            total_inflow_m3s,
            Objective::Balanced,
            now,
            config,
        );
        plans.push(ContingencyPlan {
            name: format!("gate_{gate_id}_stuck_closed"),
            flow_split,
            sequence,
            efficiency,
            warnings,
        });
    }

    {
        let low_priority_demands: Vec<ZoneDemandRequest> =
            demands.iter().filter(|d| d.priority <= 2).cloned().collect();
        let (flow_split, sequence, efficiency, warnings) = re_optimize(
            network,
            registry,
            source,
            &low_priority_demands,
            feasibility,
            zone_nodes,
            zone_gate,
            current_levels,
            total_inflow_m3s * 0.7,
            Objective::Balanced,
            now,
            config,
        );
        plans.push(ContingencyPlan {
            name: "low_source_70pct".to_string(),
            flow_split,
            sequence,
            efficiency,
            warnings,
        });
    }

    plans
}
