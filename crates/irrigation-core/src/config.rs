use serde::{Deserialize, Serialize};

/// Every configuration key enumerated in spec §6, with the documented
/// defaults. Loaded by [`Config::load`], which layers a `config::Config`
/// builder over defaults + environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct Config {
    pub source_elevation_m: f64,
    pub min_flow_depth_m: f64,
    pub max_flow_velocity_ms: f64,
    pub min_flow_velocity_ms: f64,
    pub depth_safety_factor: f64,
    pub solver: SolverConfig,
    pub deficit: DeficitConfig,
    pub loss: LossConfig,
    pub recon: ReconciliationConfig,
    pub scada: ScadaConfig,
    pub energy: EnergyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_elevation_m: 221.0,
            min_flow_depth_m: 0.3,
            max_flow_velocity_ms: 2.0,
            min_flow_velocity_ms: 0.3,
            depth_safety_factor: 1.2,
            solver: SolverConfig::default(),
            deficit: DeficitConfig::default(),
            loss: LossConfig::default(),
            recon: ReconciliationConfig::default(),
            scada: ScadaConfig::default(),
            energy: EnergyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct SolverConfig {
    pub max_iter: u32,
    pub tol_m: f64,
    pub mass_tol: f64,
    pub omega: f64,
    pub min_dt_s: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol_m: 1e-3,
            mass_tol: 0.01,
            omega: 0.7,
            min_dt_s: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct DeficitConfig {
    pub window_weeks: u32,
    /// Open Question #3 (SPEC_FULL.md §D): ISO week numbers treated as
    /// "critical" for the yield-impact timing multiplier. Empty by
    /// default, so the multiplier is always 1.0 until configured.
    pub critical_weeks: Vec<u8>,
}

impl Default for DeficitConfig {
    fn default() -> Self {
        Self {
            window_weeks: 4,
            critical_weeks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct LossConfig {
    pub rate_earthen_per_km: f64,
    pub rate_lined_per_km: f64,
    pub rate_concrete_per_km: f64,
    pub rate_pipe_per_km: f64,
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            rate_earthen_per_km: 0.025,
            rate_lined_per_km: 0.010,
            rate_concrete_per_km: 0.005,
            rate_pipe_per_km: 0.002,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub discrepancy_threshold: f64,
    pub dispute_threshold: f64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            discrepancy_threshold: 0.05,
            dispute_threshold: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct ScadaConfig {
    pub health_interval_s: u64,
    pub comm_failure_threshold: u32,
    pub default_timeout_s: u64,
    pub health_probe_timeout_s: u64,
    pub command_dispatch_timeout_s: u64,
}

impl Default for ScadaConfig {
    fn default() -> Self {
        Self {
            health_interval_s: 30,
            comm_failure_threshold: 3,
            default_timeout_s: 30,
            health_probe_timeout_s: 5,
            command_dispatch_timeout_s: 10,
        }
    }
}

/// Open Question #5: energy-recovery economics left unset by default.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct EnergyConfig {
    pub price_per_kwh: Option<f64>,
    pub cost_per_kw_installed: Option<f64>,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            price_per_kwh: None,
            cost_per_kw_installed: None,
        }
    }
}

impl Config {
    /// Layers defaults under `IRRIGATION_` environment overrides and an
    /// optional config file, composing a `config::Config` builder.
    pub fn load(path: Option<&str>) -> crate::error::Result<Self> {
        let defaults = Config::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults)?,
        );
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("IRRIGATION")
                .separator("__")
                .try_parsing(true),
        );
        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.source_elevation_m, 221.0);
        assert_eq!(cfg.solver.max_iter, 100);
        assert_eq!(cfg.solver.tol_m, 1e-3);
        assert_eq!(cfg.solver.mass_tol, 0.01);
        assert_eq!(cfg.solver.omega, 0.7);
        assert_eq!(cfg.deficit.window_weeks, 4);
        assert_eq!(cfg.loss.rate_earthen_per_km, 0.025);
        assert_eq!(cfg.recon.discrepancy_threshold, 0.05);
        assert_eq!(cfg.scada.health_interval_s, 30);
        assert_eq!(cfg.scada.comm_failure_threshold, 3);
    }

    #[test]
    fn load_without_file_returns_defaults() {
        let cfg = Config::load(None).expect("defaults always load");
        assert_eq!(cfg.depth_safety_factor, 1.2);
    }
}
