use chrono::{DateTime, Utc};
use irrigation_core::{FlowRegime, Gate, GateFlowResult, Warning, GRAVITY_MS2};

/// Inputs to the calibrated gate discharge equation (spec §4.2).
#[derive(Debug, Clone, Copy)]
pub struct GateHydraulicInputs {
    pub upstream_head_m: f64,
    pub downstream_head_m: f64,
    pub opening_m: f64,
    pub timestamp: DateTime<Utc>,
}

/// `Q = Cs·L·Hs·√(2g·ΔH)`, `Cs = clip(K1·(Hs/Go)^K2, 0.3, 0.85)`, with regime
/// selection and drop-structure handling per spec §4.2. Returns the flow
/// result together with any accumulated warnings (near-critical Froude,
/// zero-flow boundary conditions).
pub fn compute_gate_flow(gate: &Gate, inputs: GateHydraulicInputs) -> (GateFlowResult, Vec<Warning>) {
    let mut warnings = Vec::new();
    let h_up = inputs.upstream_head_m;
    let h_down = inputs.downstream_head_m;
    let hs = inputs.opening_m.max(0.0).min(gate.max_opening_m());
    let sill = gate.sill_elevation_m;
    let go = gate.max_height_m.max(1e-9);

    if h_up <= sill || hs <= 0.0 {
        return (
            GateFlowResult {
                flow_m3s: 0.0,
                regime: FlowRegime::NoFlow,
                discharge_coefficient: 0.0,
                velocity_ms: 0.0,
                froude: 0.0,
                energy_loss_m: 0.0,
                confidence: gate.calibration.confidence,
            },
            warnings,
        );
    }

    let cs = (gate.calibration.k1 * (hs / go).powf(gate.calibration.k2)).clamp(0.3, 0.85);
    let area = gate.width_m * hs;

    let (regime, q_raw) = if let Some(drop) = &gate.drop {
        let critical_threshold = sill - drop.drop_height_m + (2.0 / 3.0) * hs;
        if h_down < critical_threshold {
            let q = (2.0 / 3.0) * cs * gate.width_m * (2.0 * GRAVITY_MS2).sqrt()
                * (h_up - sill).max(0.0).powf(1.5);
            (FlowRegime::CriticalFlow, q)
        } else if h_down > hs && safe_div(h_down, h_up) > 0.8 {
            let delta_h = (h_up - h_down).max(0.0);
            let reduction = (1.0 - ((h_down - hs) / (h_up - hs)).powi(2)).max(0.3);
            let q = cs * gate.width_m * hs * (2.0 * GRAVITY_MS2 * delta_h).sqrt() * reduction;
            (FlowRegime::SubmergedFlow, q)
        } else {
            let delta_h = (h_up - hs / 2.0).max(0.0);
            let q = cs * gate.width_m * hs * (2.0 * GRAVITY_MS2 * delta_h).sqrt();
            (FlowRegime::FreeFlow, q)
        }
    } else if h_down > hs && safe_div(h_down, h_up) > 0.8 {
        let delta_h = (h_up - h_down).max(0.0);
        let reduction = (1.0 - ((h_down - hs) / (h_up - hs)).powi(2)).max(0.3);
        let q = cs * gate.width_m * hs * (2.0 * GRAVITY_MS2 * delta_h).sqrt() * reduction;
        (FlowRegime::SubmergedFlow, q)
    } else {
        let delta_h = (h_up - hs / 2.0).max(0.0);
        let q = cs * gate.width_m * hs * (2.0 * GRAVITY_MS2 * delta_h).sqrt();
        (FlowRegime::FreeFlow, q)
    };

    let q = q_raw.max(0.0);
    let velocity = if area > 0.0 { q / area } else { 0.0 };
    let froude = velocity / (GRAVITY_MS2 * hs).sqrt();

    if (0.9..=1.1).contains(&froude) {
        warnings.push(Warning::new(
            "near_critical_flow",
            format!("gate {} Froude {:.3} near critical", gate.id, froude),
        ));
    }

    let energy_loss = if let Some(drop) = &gate.drop {
        drop.drop_height_m + 0.5 * velocity * velocity / (2.0 * GRAVITY_MS2)
    } else {
        0.1 * velocity * velocity / (2.0 * GRAVITY_MS2)
    };

    let mut confidence = gate.calibration.confidence;
    if matches!(regime, FlowRegime::SubmergedFlow) {
        confidence *= 0.8;
    }
    if gate.drop.is_some() {
        confidence *= 0.9;
    }

    (
        GateFlowResult {
            flow_m3s: q,
            regime,
            discharge_coefficient: cs,
            velocity_ms: velocity,
            froude,
            energy_loss_m: energy_loss,
            confidence,
        },
        warnings,
    )
}

fn safe_div(a: f64, b: f64) -> f64 {
    if b.abs() < 1e-9 {
        0.0
    } else {
        a / b
    }
}

/// One measured observation used by [`validate_calibration`].
pub struct MeasuredObservation {
    pub inputs: GateHydraulicInputs,
    pub measured_flow_m3s: f64,
}

/// Mean/max relative error, RMSE, and the fraction of observations within 5%
/// of the calibrated equation's prediction (spec §4.2 validation operation).
#[derive(Debug, Clone, Copy)]
pub struct CalibrationValidation {
    pub mean_relative_error: f64,
    pub max_relative_error: f64,
    pub rmse: f64,
    pub fraction_within_5pct: f64,
    pub sample_count: usize,
}

pub fn validate_calibration(gate: &Gate, observations: &[MeasuredObservation]) -> Option<CalibrationValidation> {
    if observations.is_empty() {
        return None;
    }
    let mut rel_errors = Vec::with_capacity(observations.len());
    let mut sq_errors = Vec::with_capacity(observations.len());
    let mut within_5pct = 0usize;
    for obs in observations {
        let (predicted, _) = compute_gate_flow(gate, obs.inputs);
        let err = predicted.flow_m3s - obs.measured_flow_m3s;
        sq_errors.push(err * err);
        let rel = if obs.measured_flow_m3s.abs() > 1e-9 {
            (err / obs.measured_flow_m3s).abs()
        } else {
            err.abs()
        };
        if rel <= 0.05 {
            within_5pct += 1;
        }
        rel_errors.push(rel);
    }
    let n = observations.len() as f64;
    let mean_relative_error = rel_errors.iter().sum::<f64>() / n;
    let max_relative_error = rel_errors.iter().cloned().fold(0.0_f64, f64::max);
    let rmse = (sq_errors.iter().sum::<f64>() / n).sqrt();
    Some(CalibrationValidation {
        mean_relative_error,
        max_relative_error,
        rmse,
        fraction_within_5pct: within_5pct as f64 / n,
        sample_count: observations.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use irrigation_core::Calibration;

    fn s1_gate() -> Gate {
        Gate {
            id: "G1".into(),
            width_m: 2.0,
            max_height_m: 1.5,
            sill_elevation_m: 0.0,
            drop: None,
            calibration: Calibration {
                k1: 0.61,
                k2: 0.08,
                confidence: 0.9,
                method: irrigation_core::CalibrationMethod::Direct,
            },
            upstream_node: "n1".into(),
            downstream_node: "n2".into(),
            max_flow_m3s: 20.0,
        }
    }

    #[test]
    fn scenario_s1_free_flow_single_gate() {
        let gate = s1_gate();
        let (result, _warnings) = compute_gate_flow(
            &gate,
            GateHydraulicInputs {
                upstream_head_m: 1.8,
                downstream_head_m: 0.4,
                opening_m: 0.6,
                timestamp: Utc::now(),
            },
        );
        assert_eq!(result.regime, FlowRegime::FreeFlow);
        assert!((result.discharge_coefficient - 0.566).abs() < 0.01);
        assert!((result.flow_m3s - 3.68).abs() < 0.05);
        assert!(result.froude > 1.0, "expected near/above-critical Froude, got {}", result.froude);
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn zero_delta_h_gives_no_flow() {
        let gate = s1_gate();
        let (result, _) = compute_gate_flow(
            &gate,
            GateHydraulicInputs {
                upstream_head_m: 0.0,
                downstream_head_m: 0.0,
                opening_m: 0.5,
                timestamp: Utc::now(),
            },
        );
        assert_eq!(result.regime, FlowRegime::NoFlow);
        assert_eq!(result.flow_m3s, 0.0);
    }

    #[test]
    fn full_opening_free_flow_uses_k1_only_coefficient() {
        let gate = s1_gate();
        let (result, _) = compute_gate_flow(
            &gate,
            GateHydraulicInputs {
                upstream_head_m: 5.0,
                downstream_head_m: 0.1,
                opening_m: gate.max_height_m,
                timestamp: Utc::now(),
            },
        );
        let expected_cs = gate.calibration.k1.clamp(0.3, 0.85);
        assert!((result.discharge_coefficient - expected_cs).abs() < 1e-9);
    }
}
