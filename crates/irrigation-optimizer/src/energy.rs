use crate::types::{EnergyFeasibilityBand, EnergyRecoverySite};
use irrigation_core::{Config, GRAVITY_MS2};
use irrigation_hydraulics::Network;

const WATER_DENSITY_KG_M3: f64 = 1000.0;
const TURBINE_EFFICIENCY: f64 = 0.85;
const MIN_ELEVATION_DROP_M: f64 = 2.0;
const MIN_VIABLE_POWER_KW: f64 = 50.0;
const OPERATING_DAYS_PER_YEAR: f64 = 180.0;
const OPERATING_HOURS_PER_DAY: f64 = 24.0;

/// Power-band thresholds are an implementation choice (spec §4.4.6 only
/// fixes the >50 kW retention cutoff); fixed here rather than left to a
/// magic number scattered across call sites.
const MARGINAL_UPPER_KW: f64 = 150.0;
const VIABLE_UPPER_KW: f64 = 500.0;

fn classify(power_kw: f64) -> EnergyFeasibilityBand {
    if power_kw < MIN_VIABLE_POWER_KW {
        EnergyFeasibilityBand::NotViable
    } else if power_kw < MARGINAL_UPPER_KW {
        EnergyFeasibilityBand::Marginal
    } else if power_kw < VIABLE_UPPER_KW {
        EnergyFeasibilityBand::Viable
    } else {
        EnergyFeasibilityBand::HighValue
    }
}

/// Scans every canal section for an elevation drop exceeding
/// [`MIN_ELEVATION_DROP_M`] and estimates micro-hydro recovery potential
/// at 70% of the section's Manning capacity (spec §4.4.6). Sites below
/// 50 kW are dropped rather than returned with `NotViable`, matching the
/// spec's "retain sites with P > 50 kW".
pub fn scan_energy_recovery_sites(network: &Network, config: &Config) -> Vec<EnergyRecoverySite> {
    let mut sites = Vec::new();
    for section in network.sections.values() {
        let up_node = network.nodes.get(&section.upstream_node);
        let down_node = network.nodes.get(&section.downstream_node);
        let (Some(up), Some(down)) = (up_node, down_node) else {
            continue;
        };
        let drop_m = up.ground_elevation_m - down.ground_elevation_m;
        if drop_m <= MIN_ELEVATION_DROP_M {
            continue;
        }

        let capacity_depth = up.max_depth_m.min(down.max_depth_m).max(0.0);
        let capacity_area = section.cross_section.area(capacity_depth);
        let capacity_radius = section.cross_section.hydraulic_radius(capacity_depth);
        let capacity_slope = section.bed_slope.max(irrigation_hydraulics::MIN_SLOPE);
        let capacity_velocity = (1.0 / section.manning_n) * capacity_radius.powf(2.0 / 3.0) * capacity_slope.sqrt();
        let capacity_flow = capacity_area * capacity_velocity;
        let avg_flow = 0.7 * capacity_flow;
        if avg_flow <= 0.0 {
            continue;
        }

        let power_w = WATER_DENSITY_KG_M3 * GRAVITY_MS2 * avg_flow * drop_m * TURBINE_EFFICIENCY;
        let power_kw = power_w / 1000.0;
        if power_kw <= MIN_VIABLE_POWER_KW {
            continue;
        }

        let annual_energy_kwh = power_kw * OPERATING_DAYS_PER_YEAR * OPERATING_HOURS_PER_DAY;
        let annual_revenue = config.energy.price_per_kwh.map(|price| annual_energy_kwh * price);
        let payback_years = match (config.energy.cost_per_kw_installed, annual_revenue) {
            (Some(cost_per_kw), Some(revenue)) if revenue > 0.0 => Some((power_kw * cost_per_kw) / revenue),
            _ => None,
        };

        sites.push(EnergyRecoverySite {
            section_id: section.id.clone(),
            power_kw,
            annual_energy_kwh,
            feasibility: classify(power_kw),
            annual_revenue,
            payback_years,
        });
    }
    sites
}
