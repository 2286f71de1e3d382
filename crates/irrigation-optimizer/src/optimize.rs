use crate::contingency::generate_contingencies;
use crate::energy::scan_energy_recovery_sites;
use crate::envelope::{depth_envelope, detect_hydraulic_jumps};
use crate::feasibility::elevation_feasibility;
use crate::flow_split::optimize_flow_split;
use crate::metrics::delivery_efficiency;
use crate::safety::safety_precheck;
use crate::sequencing::sequence_deliveries;
use crate::types::{DepthEnvelope, OptimizationResult, OptimizeOptions};
use chrono::Utc;
use irrigation_core::{Config, ControlKind, GateId, NodeId, Warning, ZoneDemandRequest, ZoneId};
use irrigation_hydraulics::{Demands, Edge, GateOpenings, Network};
use irrigation_registry::GateRegistry;
use std::collections::HashMap;

const DEFAULT_TRANSITION_S: f64 = 300.0;

fn transition_seconds_for(registry: &GateRegistry, gate_id: &GateId) -> f64 {
    registry
        .get(gate_id)
        .and_then(|entry| match entry.control.kind {
            ControlKind::Automated(a) => Some(a.response_time_budget_s),
            ControlKind::Manual(_) => None,
        })
        .unwrap_or(DEFAULT_TRANSITION_S)
}

fn target_opening_m(network: &Network, gate_id: &GateId, opening_ratio: f64) -> f64 {
    network
        .gates
        .get(gate_id)
        .map(|g| opening_ratio.clamp(0.0, 1.0) * g.max_opening_m())
        .unwrap_or(0.0)
}

/// Top-level gravity delivery optimization entry point (spec §4.4): runs
/// the per-zone feasibility check, builds a minimum-depth envelope and
/// hydraulic-jump check along each feasible zone's path, solves the
/// constrained flow split, sequences the resulting deliveries, then
/// safety pre-checks every affected gate both individually and again in
/// dispatch order before handing back a result a caller can act on
/// without re-deriving any of it.
#[allow(clippy::too_many_arguments)]
pub fn optimize(
    network: &Network,
    registry: &GateRegistry,
    source: &NodeId,
    source_level_m: f64,
    total_inflow_m3s: f64,
    zone_nodes: &HashMap<ZoneId, NodeId>,
    zone_gate: &HashMap<ZoneId, GateId>,
    current_levels: &HashMap<NodeId, f64>,
    demands: &[ZoneDemandRequest],
    base_openings: &GateOpenings,
    node_demands: &Demands,
    options: &OptimizeOptions,
    config: &Config,
) -> OptimizationResult {
    let start = Utc::now();
    let mut warnings = Vec::new();

    let mut zone_feasibility = Vec::with_capacity(demands.len());
    for demand in demands {
        let Some(zone_node) = zone_nodes.get(&demand.zone_id) else {
            warnings.push(Warning::new(
                "zone_node_unmapped",
                format!("zone {} has no delivery node mapping; skipped", demand.zone_id),
            ));
            continue;
        };
        let (feasibility, mut w) = elevation_feasibility(
            network,
            source,
            &demand.zone_id,
            zone_node,
            demand.required_flow_m3s,
            source_level_m,
            config,
        );
        warnings.append(&mut w);
        zone_feasibility.push(feasibility);
    }

    for feasibility in &zone_feasibility {
        if !feasibility.feasible {
            continue;
        }
        let Some(zone_node) = zone_nodes.get(&feasibility.zone_id) else {
            continue;
        };
        let Some(path) = network.shortest_path(source, zone_node) else {
            continue;
        };
        let envelopes: Vec<DepthEnvelope> = path
            .iter()
            .filter_map(|edge| match edge {
                Edge::Section(id) => network
                    .sections
                    .get(id)
                    .map(|section| depth_envelope(section, feasibility.recommended_flow_m3s, config)),
                Edge::Gate(_) => None,
            })
            .collect();
        warnings.extend(detect_hydraulic_jumps(&envelopes));
    }

    let (flow_split, mut w) = optimize_flow_split(
        network,
        registry,
        source,
        demands,
        zone_nodes,
        current_levels,
        total_inflow_m3s,
        options.objective,
        config,
    );
    warnings.append(&mut w);

    let sequence = sequence_deliveries(
        network,
        source,
        demands,
        &zone_feasibility,
        zone_nodes,
        &flow_split.gate_settings,
        zone_gate,
        start,
    );

    for setting in &flow_split.gate_settings {
        let target_m = target_opening_m(network, &setting.gate_id, setting.setting.opening_ratio);
        let transition_s = transition_seconds_for(registry, &setting.gate_id);
        let (mut w, _state) = safety_precheck(
            network,
            registry,
            base_openings,
            node_demands,
            config,
            &setting.gate_id,
            target_m,
            transition_s,
        );
        warnings.append(&mut w);
    }

    let energy_recovery_sites = if options.include_energy_recovery {
        scan_energy_recovery_sites(network, config)
    } else {
        Vec::new()
    };

    let contingencies = if options.include_contingencies {
        generate_contingencies(
            network,
            registry,
            source,
            demands,
            &zone_feasibility,
            zone_nodes,
            zone_gate,
            current_levels,
            total_inflow_m3s,
            start,
            config,
        )
    } else {
        Vec::new()
    };

    // Final dispatch-order safety re-check: replays the sequenced windows
    // against a progressively-updated opening map, so a later gate's
    // pre-check sees the earlier ones already applied instead of each
    // gate being checked in isolation against the pre-optimization state.
    let mut cumulative_openings = base_openings.clone();
    for window in &sequence {
        let Some(gate_id) = zone_gate.get(&window.zone_id) else {
            continue;
        };
        let Some(setting) = flow_split.gate_settings.iter().find(|g| &g.gate_id == gate_id) else {
            continue;
        };
        let target_m = target_opening_m(network, gate_id, setting.setting.opening_ratio);
        let transition_s = transition_seconds_for(registry, gate_id);
        let (mut w, _state) = safety_precheck(
            network,
            registry,
            &cumulative_openings,
            node_demands,
            config,
            gate_id,
            target_m,
            transition_s,
        );
        warnings.append(&mut w);
        cumulative_openings.insert(gate_id.clone(), target_m);
    }

    let efficiency = delivery_efficiency(&flow_split.gate_settings, zone_gate, demands);
    let total_delivery_time_s = sequence
        .last()
        .map(|w| (w.end - start).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0);

    OptimizationResult {
        zone_feasibility,
        flow_split,
        sequence,
        contingencies,
        energy_recovery_sites,
        efficiency,
        total_delivery_time_s,
        warnings,
    }
}
