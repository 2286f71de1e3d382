use irrigation_core::{CanalKind, LossConfig};
use serde::{Deserialize, Serialize};

const EVAPORATION_RATE_BASE_M_PER_H: f64 = 1e-4;
const EVAPORATION_CAP_FRACTION: f64 = 0.05;
const SEEPAGE_UNCERTAINTY_FRACTION: f64 = 0.20;
const EVAPORATION_UNCERTAINTY_FRACTION: f64 = 0.30;
const OPERATIONAL_UNCERTAINTY_FRACTION: f64 = 0.40;
const CI_95_Z: f64 = 1.96;

/// Everything the transit-loss model (spec §4.5.2) needs for one delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitLossInputs {
    pub canal_kind: CanalKind,
    pub length_km: f64,
    pub volume_m3: f64,
    pub transit_hours: f64,
    pub surface_area_m2: f64,
    pub water_depth_m: f64,
    pub temperature_c: f64,
    pub relative_humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub solar_radiation_w_m2: f64,
    pub flow_m3s: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransitLossBreakdown {
    pub seepage_m3: f64,
    pub evaporation_m3: f64,
    pub operational_m3: f64,
    pub total_m3: f64,
    pub uncertainty_sigma_m3: f64,
    pub ci95_low_m3: f64,
    pub ci95_high_m3: f64,
    pub confidence: f64,
}

fn seepage_rate_per_km(kind: CanalKind, config: &LossConfig) -> f64 {
    match kind {
        CanalKind::Earthen => config.rate_earthen_per_km,
        CanalKind::Lined => config.rate_lined_per_km,
        CanalKind::Concrete => config.rate_concrete_per_km,
        CanalKind::Pipe => config.rate_pipe_per_km,
    }
}

fn operational_flow_factor(flow_m3s: f64) -> f64 {
    if flow_m3s < 5.0 {
        1.0
    } else if flow_m3s < 10.0 {
        1.2
    } else {
        1.5
    }
}

/// Estimates seepage, evaporation and operational loss for one delivery and
/// combines their independent uncertainties by root-sum-of-squares (spec
/// §4.5.2).
pub fn estimate_transit_loss(inputs: &TransitLossInputs, config: &LossConfig) -> TransitLossBreakdown {
    let rate_per_km = seepage_rate_per_km(inputs.canal_kind, config);
    let seepage_m3 = inputs.volume_m3 * rate_per_km * inputs.length_km * (1.0 + (inputs.transit_hours / 24.0).min(1.0));

    let f_temp = 1.0 + 0.02 * (inputs.temperature_c - 20.0);
    let f_humidity = (100.0 - inputs.relative_humidity_pct) / 100.0;
    let f_wind = 1.0 + 0.1 * inputs.wind_speed_ms;
    let f_solar = inputs.solar_radiation_w_m2 / 250.0;
    let evap_uncapped_m3 =
        inputs.surface_area_m2 * EVAPORATION_RATE_BASE_M_PER_H * f_temp * f_humidity * f_wind * f_solar * inputs.transit_hours;
    let evap_cap_m3 = EVAPORATION_CAP_FRACTION * inputs.water_depth_m * inputs.surface_area_m2;
    let evaporation_m3 = evap_uncapped_m3.max(0.0).min(evap_cap_m3.max(0.0));

    let operational_m3 = inputs.volume_m3 * 0.01 * operational_flow_factor(inputs.flow_m3s);

    let total_m3 = seepage_m3 + evaporation_m3 + operational_m3;

    let sigma_seepage = SEEPAGE_UNCERTAINTY_FRACTION * seepage_m3;
    let sigma_evap = EVAPORATION_UNCERTAINTY_FRACTION * evaporation_m3;
    let sigma_operational = OPERATIONAL_UNCERTAINTY_FRACTION * operational_m3;
    let uncertainty_sigma_m3 = (sigma_seepage.powi(2) + sigma_evap.powi(2) + sigma_operational.powi(2)).sqrt();

    let confidence = 1.0 / (1.0 + uncertainty_sigma_m3 / inputs.volume_m3.max(1e-9));

    TransitLossBreakdown {
        seepage_m3,
        evaporation_m3,
        operational_m3,
        total_m3,
        uncertainty_sigma_m3,
        ci95_low_m3: total_m3 - CI_95_Z * uncertainty_sigma_m3,
        ci95_high_m3: total_m3 + CI_95_Z * uncertainty_sigma_m3,
        confidence,
    }
}

/// Updates a canal kind's seepage rate from a historical measured rate
/// (spec §4.5.2: `rate <- rate * (measured_rate / rate)`, which reduces to
/// `measured_rate` — implemented literally rather than simplified, and
/// guarded against a zero current rate).
pub fn calibrate_seepage_rate(current_rate_per_km: f64, measured_rate_per_km: f64) -> f64 {
    if current_rate_per_km <= 0.0 {
        return measured_rate_per_km;
    }
    current_rate_per_km * (measured_rate_per_km / current_rate_per_km)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> TransitLossInputs {
        TransitLossInputs {
            canal_kind: CanalKind::Earthen,
            length_km: 5.0,
            volume_m3: 10_000.0,
            transit_hours: 4.0,
            surface_area_m2: 15_000.0,
            water_depth_m: 1.0,
            temperature_c: 28.0,
            relative_humidity_pct: 60.0,
            wind_speed_ms: 2.0,
            solar_radiation_w_m2: 300.0,
            flow_m3s: 6.0,
        }
    }

    #[test]
    fn loss_components_sum_to_total() {
        let breakdown = estimate_transit_loss(&base_inputs(), &LossConfig::default());
        let sum = breakdown.seepage_m3 + breakdown.evaporation_m3 + breakdown.operational_m3;
        assert!((sum - breakdown.total_m3).abs() < 1e-9);
        assert!(breakdown.confidence > 0.0 && breakdown.confidence <= 1.0);
    }

    #[test]
    fn evaporation_is_capped_at_5pct_of_depth_times_area() {
        let mut inputs = base_inputs();
        inputs.transit_hours = 1000.0;
        let breakdown = estimate_transit_loss(&inputs, &LossConfig::default());
        let cap = 0.05 * inputs.water_depth_m * inputs.surface_area_m2;
        assert!(breakdown.evaporation_m3 <= cap + 1e-6);
    }

    #[test]
    fn calibration_adopts_the_measured_rate() {
        let calibrated = calibrate_seepage_rate(0.025, 0.031);
        assert!((calibrated - 0.031).abs() < 1e-9);
    }
}
