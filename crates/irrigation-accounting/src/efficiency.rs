use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EfficiencyClass {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl EfficiencyClass {
    pub fn classify(ratio: f64) -> Self {
        if ratio >= 0.85 {
            EfficiencyClass::Excellent
        } else if ratio >= 0.75 {
            EfficiencyClass::Good
        } else if ratio >= 0.65 {
            EfficiencyClass::Fair
        } else if ratio >= 0.55 {
            EfficiencyClass::Poor
        } else {
            EfficiencyClass::VeryPoor
        }
    }
}

/// Conveyance (delivery) efficiency for one section: how much of what left
/// the gate arrived (spec §4.5.3).
pub fn delivery_efficiency(section_inflow_m3: f64, gate_outflow_m3: f64) -> (f64, EfficiencyClass) {
    let ratio = if gate_outflow_m3 > 0.0 {
        (section_inflow_m3 / gate_outflow_m3).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (ratio, EfficiencyClass::classify(ratio))
}

/// Application efficiency: how much of what was applied to the field was
/// actually consumed by the crop, with return flow tracked separately.
pub fn application_efficiency(consumed_m3: f64, applied_m3: f64) -> f64 {
    if applied_m3 > 0.0 {
        (consumed_m3 / applied_m3).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitingFactor {
    Delivery,
    Application,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OverallEfficiency {
    pub delivery: f64,
    pub application: f64,
    pub overall: f64,
    pub limiting_factor: LimitingFactor,
}

pub fn overall_efficiency(delivery: f64, application: f64) -> OverallEfficiency {
    let limiting_factor = if delivery <= application {
        LimitingFactor::Delivery
    } else {
        LimitingFactor::Application
    };
    OverallEfficiency {
        delivery,
        application,
        overall: delivery * application,
        limiting_factor,
    }
}

/// Coefficient of uniformity across a section's deliveries in a window:
/// `1 - sigma/mu` of inflow volumes, bounded to `[0,1]` (spec §4.5.3).
pub fn uniformity_coefficient(inflow_volumes_m3: &[f64]) -> f64 {
    let n = inflow_volumes_m3.len();
    if n == 0 {
        return 0.0;
    }
    let mean = inflow_volumes_m3.iter().sum::<f64>() / n as f64;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = inflow_volumes_m3.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let sigma = variance.sqrt();
    (1.0 - sigma / mean).clamp(0.0, 1.0)
}

/// `0.4*delivery + 0.4*application + 0.2*uniformity` (spec §4.5.3).
pub fn performance_score(delivery: f64, application: f64, uniformity: f64) -> f64 {
    0.4 * delivery + 0.4 * application + 0.2 * uniformity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_bands_match_spec_thresholds() {
        assert_eq!(EfficiencyClass::classify(0.9), EfficiencyClass::Excellent);
        assert_eq!(EfficiencyClass::classify(0.8), EfficiencyClass::Good);
        assert_eq!(EfficiencyClass::classify(0.7), EfficiencyClass::Fair);
        assert_eq!(EfficiencyClass::classify(0.6), EfficiencyClass::Poor);
        assert_eq!(EfficiencyClass::classify(0.4), EfficiencyClass::VeryPoor);
    }

    #[test]
    fn uniform_deliveries_score_near_one() {
        let coeff = uniformity_coefficient(&[100.0, 100.0, 100.0]);
        assert!((coeff - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overall_efficiency_picks_the_smaller_term_as_limiting() {
        let result = overall_efficiency(0.6, 0.9);
        assert_eq!(result.limiting_factor, LimitingFactor::Delivery);
        assert!((result.overall - 0.54).abs() < 1e-9);
    }
}
