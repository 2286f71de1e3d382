use chrono::{DateTime, Utc};
use irrigation_core::{NamedGateSetting, SectionId, Warning, ZoneId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    MinimizeTravelTime,
    MaximizeEfficiency,
    MinimizeEnergyLoss,
    Balanced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeOptions {
    pub objective: Objective,
    pub include_contingencies: bool,
    pub include_energy_recovery: bool,
    pub deadline: Option<DateTime<Utc>>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            objective: Objective::Balanced,
            include_contingencies: true,
            include_energy_recovery: false,
            deadline: None,
        }
    }
}

/// Per-zone elevation feasibility (spec §4.4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneFeasibility {
    pub zone_id: ZoneId,
    pub feasible: bool,
    pub min_source_level_required_m: f64,
    pub total_head_loss_m: f64,
    pub critical_sections: Vec<SectionId>,
    pub recommended_flow_m3s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelRegimeClass {
    Subcritical,
    Supercritical,
    Critical,
}

/// Minimum-depth envelope for one section at a given flow (spec §4.4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthEnvelope {
    pub section_id: SectionId,
    pub critical_depth_m: f64,
    pub normal_depth_m: f64,
    pub sediment_min_depth_m: f64,
    pub operational_min_depth_m: f64,
    pub recommended_depth_m: f64,
    pub froude: f64,
    pub regime: ChannelRegimeClass,
    pub conjugate_depth_m: Option<f64>,
}

/// Result of the constrained flow-split optimization (spec §4.4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSplitResult {
    pub gate_settings: Vec<NamedGateSetting>,
    pub objective_value: f64,
    pub converged: bool,
    pub iterations: u32,
}

/// One scheduled zone window in the delivery sequence (spec §4.4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub zone_id: ZoneId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub travel_time_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyFeasibilityBand {
    NotViable,
    Marginal,
    Viable,
    HighValue,
}

/// One candidate micro-hydro energy-recovery site (spec §4.4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyRecoverySite {
    pub section_id: SectionId,
    pub power_kw: f64,
    pub annual_energy_kwh: f64,
    pub feasibility: EnergyFeasibilityBand,
    pub annual_revenue: Option<f64>,
    pub payback_years: Option<f64>,
}

/// A contingency variant of the base optimization (spec §4.4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContingencyPlan {
    pub name: String,
    pub flow_split: FlowSplitResult,
    pub sequence: Vec<DeliveryWindow>,
    pub efficiency: f64,
    pub warnings: Vec<Warning>,
}

/// Top-level result of [`crate::optimize::optimize`] (spec §4.4 contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub zone_feasibility: Vec<ZoneFeasibility>,
    pub flow_split: FlowSplitResult,
    pub sequence: Vec<DeliveryWindow>,
    pub contingencies: Vec<ContingencyPlan>,
    pub energy_recovery_sites: Vec<EnergyRecoverySite>,
    pub efficiency: f64,
    pub total_delivery_time_s: f64,
    pub warnings: Vec<Warning>,
}

/// Blocking warnings reject the command outright (spec §4.4.5); every other
/// warning rides along on a successful result.
pub fn is_blocking(warning: &Warning) -> bool {
    warning.code == "blocked"
}
