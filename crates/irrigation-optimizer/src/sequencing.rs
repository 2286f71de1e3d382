use crate::types::{DeliveryWindow, ZoneFeasibility};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use irrigation_core::{GateId, NamedGateSetting, NodeId, ZoneDemandRequest, ZoneId};
use irrigation_hydraulics::Network;
use std::collections::HashMap;

/// Sorts feasible zones by `(priority ASC, zone elevation DESC)` — high
/// priority first, highest zones first within a priority band — and
/// assigns each a non-overlapping delivery window starting right after
/// the previous zone's (spec §4.4.4).
#[allow(clippy::too_many_arguments)]
pub fn sequence_deliveries(
    network: &Network,
    source: &NodeId,
    demands: &[ZoneDemandRequest],
    feasibility: &[ZoneFeasibility],
    zone_nodes: &HashMap<ZoneId, NodeId>,
    gate_settings: &[NamedGateSetting],
    zone_gate: &HashMap<ZoneId, GateId>,
    start: DateTime<Utc>,
) -> Vec<DeliveryWindow> {
    let feasible_zones: std::collections::HashSet<&ZoneId> = feasibility
        .iter()
        .filter(|f| f.feasible)
        .map(|f| &f.zone_id)
        .collect();

    let flow_by_gate: HashMap<&GateId, f64> = gate_settings
        .iter()
        .map(|g| (&g.gate_id, g.setting.expected_flow_m3s))
        .collect();

    let mut ordered: Vec<&ZoneDemandRequest> = demands
        .iter()
        .filter(|d| feasible_zones.contains(&d.zone_id))
        .collect();

    ordered.sort_by(|a, b| {
        let elevation = |zone: &ZoneId| -> f64 {
            zone_nodes
                .get(zone)
                .and_then(|n| network.nodes.get(n))
                .map(|n| n.ground_elevation_m)
                .unwrap_or(f64::NEG_INFINITY)
        };
        a.priority
            .cmp(&b.priority)
            .then(elevation(&b.zone_id).partial_cmp(&elevation(&a.zone_id)).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut windows = Vec::with_capacity(ordered.len());
    let mut cursor = start;
    for demand in ordered {
        let distance_m = zone_nodes
            .get(&demand.zone_id)
            .and_then(|node| network.shortest_path(source, node))
            .map(|path| {
                path.iter()
                    .filter_map(|edge| match edge {
                        irrigation_hydraulics::Edge::Section(id) => network.sections.get(id).map(|s| s.length_m),
                        irrigation_hydraulics::Edge::Gate(_) => Some(0.0),
                    })
                    .sum::<f64>()
            })
            .unwrap_or(0.0);

        let gate_id = zone_gate.get(&demand.zone_id);
        let flow = gate_id.and_then(|g| flow_by_gate.get(g)).copied().unwrap_or(demand.required_flow_m3s);
        let area_ref = gate_id
            .and_then(|g| network.gates.get(g))
            .map(|g| g.width_m.max(0.1) * g.max_height_m.max(0.1))
            .unwrap_or(1.0);
        let velocity = (flow / area_ref).clamp(0.3, 2.0);
        let travel_time_s = if velocity > 0.0 { distance_m / velocity } else { 0.0 };

        let end = cursor + ChronoDuration::milliseconds((travel_time_s * 1000.0) as i64);
        windows.push(DeliveryWindow {
            zone_id: demand.zone_id.clone(),
            start: cursor,
            end,
            travel_time_s,
        });
        cursor = end;
    }
    windows
}
