use crate::types::ZoneFeasibility;
use irrigation_core::{Config, NodeId, Warning, ZoneId};
use irrigation_hydraulics::{friction_loss_m, normal_depth, velocity_at_depth, Edge, Network};

/// Per-zone elevation feasibility walk (spec §4.4.1): BFS the
/// downstream-reachability graph from `source` to the zone's delivery
/// node, deducting friction loss plus a 10% minor-loss allowance from
/// `source_level_m` at the requested flow along every canal section on the
/// path. A zone is feasible iff the remaining head at its node clears
/// `min_depth * depth_safety_factor`.
pub fn elevation_feasibility(
    network: &Network,
    source: &NodeId,
    zone_id: &ZoneId,
    zone_node: &NodeId,
    requested_flow_m3s: f64,
    source_level_m: f64,
    config: &Config,
) -> (ZoneFeasibility, Vec<Warning>) {
    let mut warnings = Vec::new();

    let Some(path) = network.shortest_path(source, zone_node) else {
        warnings.push(Warning::new(
            "no_path_to_zone",
            format!("zone {zone_id} is not downstream-reachable from {source}"),
        ));
        return (
            ZoneFeasibility {
                zone_id: zone_id.clone(),
                feasible: false,
                min_source_level_required_m: f64::INFINITY,
                total_head_loss_m: f64::INFINITY,
                critical_sections: Vec::new(),
                recommended_flow_m3s: 0.0,
            },
            warnings,
        );
    };

    let mut level = source_level_m;
    let mut total_loss = 0.0_f64;
    let mut critical_sections = Vec::new();
    let mut recommended_flow = requested_flow_m3s;

    for edge in &path {
        if let Edge::Section(section_id) = edge {
            let Some(section) = network.sections.get(section_id) else {
                continue;
            };
            let loss = friction_loss_m(section, requested_flow_m3s) * 1.10;
            level -= loss;
            total_loss += loss;

            let max_flow = max_flow_for_velocity(section, config.max_flow_velocity_ms);
            recommended_flow = recommended_flow.min(max_flow);

            if let Some((_, down_id)) = network.edge_nodes(edge) {
                if let Some(down_node) = network.nodes.get(&down_id) {
                    let threshold = down_node.min_depth_m * config.depth_safety_factor;
                    let remaining_depth = level - down_node.ground_elevation_m;
                    if remaining_depth < threshold {
                        critical_sections.push(section_id.clone());
                    }
                }
            }
        }
    }

    let zone_ground = network
        .nodes
        .get(zone_node)
        .map(|n| n.ground_elevation_m)
        .unwrap_or(0.0);
    let zone_min_depth = network.nodes.get(zone_node).map(|n| n.min_depth_m).unwrap_or(0.0);
    let threshold = zone_min_depth * config.depth_safety_factor;
    let remaining_head = level - zone_ground;
    let feasible = remaining_head >= threshold;
    let min_source_level_required_m = zone_ground + threshold + total_loss;

    if !feasible {
        warnings.push(Warning::new(
            "zone_infeasible",
            format!("zone {zone_id} remaining head {remaining_head:.3} m below threshold {threshold:.3} m"),
        ));
    }

    (
        ZoneFeasibility {
            zone_id: zone_id.clone(),
            feasible,
            min_source_level_required_m,
            total_head_loss_m: total_loss,
            critical_sections,
            recommended_flow_m3s: recommended_flow.max(0.0),
        },
        warnings,
    )
}

/// Largest flow for which the section's Manning-normal-depth velocity
/// stays at or below `v_max`, found by bisection (velocity is monotone
/// increasing in flow for a trapezoidal section).
fn max_flow_for_velocity(section: &irrigation_core::CanalSection, v_max: f64) -> f64 {
    let velocity_at = |q: f64| -> f64 {
        let depth = normal_depth(section, q);
        velocity_at_depth(section, depth, q)
    };
    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    while velocity_at(hi) < v_max && hi < 1e5 {
        hi *= 2.0;
    }
    for _ in 0..40 {
        let mid = (lo + hi) / 2.0;
        if velocity_at(mid) < v_max {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}
