use crate::types::{FlowSplitResult, Objective};
use irrigation_core::{
    Config, ControlMode, Gate, GateId, GateSetting, NamedGateSetting, NodeId, Warning, ZoneDemandRequest, ZoneId,
};
use irrigation_hydraulics::{compute_gate_flow, Edge, GateHydraulicInputs, Network};
use irrigation_registry::GateRegistry;
use std::collections::HashMap;

struct GateCandidate {
    id: GateId,
    gate: Gate,
    upstream_head_m: f64,
    downstream_head_m: f64,
    zone: Option<ZoneId>,
    distance_m: f64,
}

/// Constrained flow-split optimization over automated-gate opening ratios
/// (spec §4.4.3). Manual gates are held at their registry opening and
/// contribute a fixed flow. Evaluated against the supplied (frozen) head
/// snapshot rather than re-solving the network every iterate — the
/// quasi-steady assumption spec.md §1 already makes for the whole core, one
/// level further: gate heads move slowly relative to an opening-ratio
/// search, so the optimizer amortizes one network solve across the search
/// instead of paying for one per iterate.
///
/// The search itself is a bounded penalty-augmented gradient descent: the
/// general inequality/equality constraints are folded into the objective
/// as quadratic penalties and the bounded decision vector is optimized by
/// finite-difference gradient steps with projection back onto `[0,1]` each
/// iteration — the same shape an SQP method takes (linearize, step,
/// project, repeat) without pulling in a full QP solver for a
/// low-dimensional per-gate search.
#[allow(clippy::too_many_arguments)]
pub fn optimize_flow_split(
    network: &Network,
    registry: &GateRegistry,
    source: &NodeId,
    demands: &[ZoneDemandRequest],
    zone_nodes: &HashMap<ZoneId, NodeId>,
    current_levels: &HashMap<NodeId, f64>,
    total_inflow_m3s: f64,
    objective: Objective,
    config: &Config,
) -> (FlowSplitResult, Vec<Warning>) {
    let mut warnings = Vec::new();
    let demand_by_zone: HashMap<ZoneId, &ZoneDemandRequest> =
        demands.iter().map(|d| (d.zone_id.clone(), d)).collect();
    let node_zone: HashMap<NodeId, ZoneId> = zone_nodes.iter().map(|(z, n)| (n.clone(), z.clone())).collect();

    let mut automated = Vec::new();
    let mut fixed_manual_flow = 0.0_f64;

    for gate in network.gates.values() {
        let Some(entry) = registry.get(&gate.id) else {
            continue;
        };
        let h_up = current_levels.get(&gate.upstream_node).copied().unwrap_or(gate.sill_elevation_m);
        let h_down = current_levels
            .get(&gate.downstream_node)
            .copied()
            .unwrap_or(gate.sill_elevation_m);

        // Only a gate that is both hardware-automated and currently in
        // `auto` control mode is a free decision variable; everything
        // else (manual gates, and automated gates fallen back to manual
        // or pulled into maintenance/failed) is a fixed boundary at its
        // last-known opening, per spec §4.4.3.
        let is_optimizable = entry.control.is_automated() && entry.control.control_mode == ControlMode::Auto;
        if matches!(entry.control.control_mode, ControlMode::Failed) {
            continue;
        }
        if is_optimizable {
            let zone = node_zone.get(&gate.downstream_node).cloned();
            let distance_m = network
                .shortest_path(source, &gate.downstream_node)
                .map(|path| path_length_m(network, &path))
                .unwrap_or(0.0);
            automated.push(GateCandidate {
                id: gate.id.clone(),
                gate: gate.clone(),
                upstream_head_m: h_up,
                downstream_head_m: h_down,
                zone,
                distance_m,
            });
        } else {
            let opening_m = entry.control.opening_ratio.clamp(0.0, 1.0) * gate.max_opening_m();
            let (result, _) = compute_gate_flow(
                &gate,
                GateHydraulicInputs {
                    upstream_head_m: h_up,
                    downstream_head_m: h_down,
                    opening_m,
                    timestamp: chrono::Utc::now(),
                },
            );
            fixed_manual_flow += result.flow_m3s;
        }
    }

    if automated.is_empty() {
        warnings.push(Warning::new(
            "no_automated_gates",
            "flow-split has no automated gates to optimize; returning the fixed manual-gate split",
        ));
        return (
            FlowSplitResult {
                gate_settings: Vec::new(),
                objective_value: 0.0,
                converged: true,
                iterations: 0,
            },
            warnings,
        );
    }

    let n = automated.len();
    let mut x = vec![0.5_f64; n];
    for (i, candidate) in automated.iter().enumerate() {
        if let Some(entry) = registry.get(&candidate.id) {
            x[i] = entry.control.opening_ratio.clamp(0.0, 1.0);
        }
    }

    let eval = |x: &[f64]| -> (f64, Vec<f64>) {
        let flows: Vec<f64> = automated
            .iter()
            .zip(x.iter())
            .map(|(c, &xi)| gate_flow(&c.gate, c.upstream_head_m, c.downstream_head_m, xi))
            .collect();
        (objective_value(objective, &automated, &flows, &demand_by_zone, x), flows)
    };

    let penalty = |x: &[f64], flows: &[f64]| -> f64 {
        let mut p = 0.0_f64;

        let total: f64 = flows.iter().sum::<f64>() + fixed_manual_flow;
        p += (total - total_inflow_m3s).powi(2);

        let mut zone_delivered: HashMap<ZoneId, f64> = HashMap::new();
        for (c, &q) in automated.iter().zip(flows.iter()) {
            if let Some(zone) = &c.zone {
                *zone_delivered.entry(zone.clone()).or_insert(0.0) += q;
            }
        }
        for (zone, demand) in &demand_by_zone {
            let delivered = zone_delivered.get(zone).copied().unwrap_or(0.0);
            let excess = (delivered - demand.required_flow_m3s).abs() - 0.2 * demand.required_flow_m3s;
            if excess > 0.0 {
                p += excess.powi(2);
            }
        }

        for (c, &q) in automated.iter().zip(flows.iter()) {
            let capacity = c.gate.max_flow_m3s;
            if q > capacity {
                p += (q - capacity).powi(2);
            }
        }

        for pair in x.windows(2) {
            let diff = (pair[0] - pair[1]).abs() - 0.5;
            if diff > 0.0 {
                p += diff.powi(2);
            }
        }
        p
    };

    let objective_weight = 1.0;
    let penalty_weight = 50.0;
    let augmented = |x: &[f64]| -> f64 {
        let (obj, flows) = eval(x);
        objective_weight * obj + penalty_weight * penalty(x, &flows)
    };

    let max_iter = 80u32;
    let learning_rate = 0.05;
    let eps = 1e-4;
    let mut best_x = x.clone();
    let mut best_cost = augmented(&x);
    let mut converged = false;
    let mut iterations_used = 0u32;

    for iter in 1..=max_iter {
        iterations_used = iter;
        let base_cost = augmented(&x);
        let mut grad = vec![0.0_f64; n];
        for i in 0..n {
            let mut x_plus = x.clone();
            x_plus[i] = (x_plus[i] + eps).min(1.0);
            let cost_plus = augmented(&x_plus);
            grad[i] = (cost_plus - base_cost) / eps;
        }
        let grad_norm: f64 = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
        if grad_norm < 1e-6 {
            converged = true;
            break;
        }
        for i in 0..n {
            x[i] = (x[i] - learning_rate * grad[i]).clamp(0.0, 1.0);
        }
        let cost = augmented(&x);
        if cost < best_cost {
            best_cost = cost;
            best_x = x.clone();
        }
    }

    if iterations_used >= max_iter && !converged {
        warnings.push(Warning::new(
            "flow_split_non_convergence",
            format!("flow split did not converge after {max_iter} iterations; returning the best iterate"),
        ));
    }

    let (final_objective, final_flows) = eval(&best_x);
    let now = chrono::Utc::now();
    let gate_settings = automated
        .iter()
        .zip(best_x.iter())
        .zip(final_flows.iter())
        .map(|((c, &xi), &q)| NamedGateSetting {
            gate_id: c.id.clone(),
            setting: GateSetting {
                opening_ratio: xi,
                expected_flow_m3s: q,
                upstream_head_m: c.upstream_head_m,
                downstream_head_m: c.downstream_head_m,
                timestamp: now,
            },
        })
        .collect();

    (
        FlowSplitResult {
            gate_settings,
            objective_value: final_objective,
            converged,
            iterations: iterations_used,
        },
        warnings,
    )
}

fn gate_flow(gate: &Gate, h_up: f64, h_down: f64, opening_ratio: f64) -> f64 {
    let opening_m = opening_ratio.clamp(0.0, 1.0) * gate.max_opening_m();
    let (result, _) = compute_gate_flow(
        gate,
        GateHydraulicInputs {
            upstream_head_m: h_up,
            downstream_head_m: h_down,
            opening_m,
            timestamp: chrono::Utc::now(),
        },
    );
    result.flow_m3s
}

fn path_length_m(network: &Network, path: &[Edge]) -> f64 {
    path.iter()
        .filter_map(|edge| match edge {
            Edge::Section(id) => network.sections.get(id).map(|s| s.length_m),
            Edge::Gate(_) => Some(0.0),
        })
        .sum()
}

fn objective_value(
    objective: Objective,
    candidates: &[GateCandidate],
    flows: &[f64],
    demand_by_zone: &HashMap<ZoneId, &ZoneDemandRequest>,
    x: &[f64],
) -> f64 {
    match objective {
        Objective::MinimizeTravelTime => candidates
            .iter()
            .zip(flows.iter())
            .filter_map(|(c, &q)| {
                let zone = c.zone.as_ref()?;
                let demand = demand_by_zone.get(zone)?;
                let area_ref = c.gate.width_m.max(0.1) * c.gate.max_height_m.max(0.1);
                let velocity = (q / area_ref).clamp(0.3, 2.0);
                Some((c.distance_m / velocity) * demand.priority as f64)
            })
            .sum(),
        Objective::MaximizeEfficiency => {
            let mut zone_delivered: HashMap<ZoneId, f64> = HashMap::new();
            for (c, &q) in candidates.iter().zip(flows.iter()) {
                if let Some(zone) = &c.zone {
                    *zone_delivered.entry(zone.clone()).or_insert(0.0) += q;
                }
            }
            let numerator: f64 = demand_by_zone
                .iter()
                .map(|(zone, demand)| {
                    let delivered = zone_delivered.get(zone).copied().unwrap_or(0.0);
                    delivered.min(demand.required_flow_m3s) * demand.priority as f64
                })
                .sum();
            let denominator: f64 = demand_by_zone
                .values()
                .map(|d| d.required_flow_m3s * d.priority as f64)
                .sum::<f64>()
                .max(1e-9);
            -(numerator / denominator)
        }
        Objective::MinimizeEnergyLoss => candidates
            .iter()
            .zip(flows.iter())
            .zip(x.iter())
            .map(|((_, &q), &xi)| {
                if xi >= 0.95 {
                    0.0
                } else {
                    (1.0 - xi).powi(2) * q * irrigation_core::GRAVITY_MS2 * 0.5
                }
            })
            .sum(),
        Objective::Balanced => {
            let time = objective_value(Objective::MinimizeTravelTime, candidates, flows, demand_by_zone, x);
            let efficiency = objective_value(Objective::MaximizeEfficiency, candidates, flows, demand_by_zone, x);
            let energy = objective_value(Objective::MinimizeEnergyLoss, candidates, flows, demand_by_zone, x);
            let normalized_time = time / (candidates.len().max(1) as f64 * 3600.0);
            let normalized_energy = energy / (candidates.len().max(1) as f64 * 1000.0);
            0.3 * normalized_time + 0.5 * efficiency + 0.2 * normalized_energy
        }
    }
}
