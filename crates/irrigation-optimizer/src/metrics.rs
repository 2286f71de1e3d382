use irrigation_core::{GateId, NamedGateSetting, ZoneDemandRequest, ZoneId};
use std::collections::HashMap;

/// Delivered-vs-demanded efficiency across a flow split's gate settings:
/// `sum(min(delivered, demand) * priority) / sum(demand * priority)`, the
/// same aggregate the `maximize_efficiency` objective drives towards
/// (spec §4.4.3), reused here as the top-level result metric and for
/// scoring contingency plans (spec §4.4.7).
pub fn delivery_efficiency(
    gate_settings: &[NamedGateSetting],
    zone_gate: &HashMap<ZoneId, GateId>,
    demands: &[ZoneDemandRequest],
) -> f64 {
    let flow_by_gate: HashMap<&GateId, f64> = gate_settings
        .iter()
        .map(|g| (&g.gate_id, g.setting.expected_flow_m3s))
        .collect();

    let numerator: f64 = demands
        .iter()
        .map(|d| {
            let delivered = zone_gate
                .get(&d.zone_id)
                .and_then(|g| flow_by_gate.get(g))
                .copied()
                .unwrap_or(0.0);
            delivered.min(d.required_flow_m3s) * d.priority as f64
        })
        .sum();
    let denominator: f64 = demands.iter().map(|d| d.required_flow_m3s * d.priority as f64).sum::<f64>().max(1e-9);
    numerator / denominator
}
