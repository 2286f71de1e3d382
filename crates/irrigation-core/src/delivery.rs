use crate::ids::{DeliveryId, GateId, SectionId, ZoneId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDemandRequest {
    pub zone_id: ZoneId,
    pub required_volume_m3: f64,
    pub required_flow_m3s: f64,
    /// 1 = highest.
    pub priority: u32,
    pub time_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub min_pressure_head_m: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateSetting {
    pub opening_ratio: f64,
    pub expected_flow_m3s: f64,
    pub upstream_head_m: f64,
    pub downstream_head_m: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedGateSetting {
    pub gate_id: GateId,
    pub setting: GateSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Scheduled,
    InProgress,
    Completed,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlowSample {
    pub timestamp: DateTime<Utc>,
    pub flow_m3s: f64,
    pub quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPath {
    pub gates: Vec<GateId>,
    pub sections: Vec<SectionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: DeliveryId,
    pub section_id: SectionId,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub scheduled_volume_m3: f64,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub status: DeliveryStatus,
    pub gate_outflow_m3: f64,
    pub section_inflow_m3: f64,
    pub transit_loss_m3: f64,
    pub flow_trace: Vec<FlowSample>,
    pub path: DeliveryPath,
    pub travel_time_s: f64,
    /// Set by weekly reconciliation when this delivery's totals were
    /// adjusted against the closed water balance.
    pub adjusted: bool,
    pub gate_id: Option<GateId>,
}

impl DeliveryRecord {
    /// Invariant 4: `gate_outflow = section_inflow + transit_loss` exactly;
    /// inflow is always derived, never independently measured.
    pub fn derive_inflow(outflow_m3: f64, loss_m3: f64) -> f64 {
        outflow_m3 - loss_m3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    Seepage,
    Evaporation,
    Operational,
    Structural,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitLoss {
    pub delivery_id: DeliveryId,
    pub kind: LossKind,
    pub volume_m3: f64,
    pub pct_of_flow: f64,
    pub inputs: serde_json::Value,
}
