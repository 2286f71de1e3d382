//! DTOs for the six inbound contracts of spec §6, owned by this crate
//! rather than `irrigation-core` since they're facade-shaped (they bundle
//! results from several components) rather than part of the shared data
//! model.

use chrono::{DateTime, Utc};
use irrigation_accounting::{EfficiencyClass, TraceValidation, TransitLossBreakdown};
use irrigation_core::{DeficitRecord, DeliveryRecord, GateId, Warning, ZoneId};
use serde::{Deserialize, Serialize};

/// Environmental conditions supplied by the caller for one delivery's
/// transit-loss calculation (spec §6 `complete_delivery` input) — the
/// service has no weather collaborator call on this path since the
/// original conditions are tied to the specific transit window, not to
/// "now".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeliveryEnvironment {
    pub temperature_c: f64,
    pub relative_humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub solar_radiation_w_m2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteDeliveryResult {
    pub delivery: DeliveryRecord,
    pub integrated_volume_m3: f64,
    pub trace_quality: TraceValidation,
    pub loss: TransitLossBreakdown,
    pub delivery_efficiency: f64,
    pub efficiency_class: EfficiencyClass,
    pub warnings: Vec<Warning>,
}

/// Which SCADA/field-ops channel a [`CommandAcceptance`] was routed
/// through; the caller can tell from this alone whether to expect a SCADA
/// ack or a work order without peeking at registry mode itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DispatchChannel {
    Scada,
    WorkOrder { work_order_id: String, assigned_team: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAcceptance {
    pub gate_id: GateId,
    pub accepted: bool,
    pub expected_completion: DateTime<Utc>,
    pub channel: DispatchChannel,
    pub warnings: Vec<Warning>,
}

/// `scope=single|zone|all` (spec §6 `emergency_stop`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EmergencyScope {
    Single(GateId),
    Zone(ZoneId),
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStopResult {
    pub gate_id: GateId,
    pub accepted: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionAccounting {
    pub recent_deliveries: Vec<DeliveryRecord>,
    pub latest_deficit: Option<DeficitRecord>,
    pub carry_forward_total_m3: f64,
    pub carry_forward_priority: f64,
    pub uniformity_coefficient: f64,
    pub mean_delivery_efficiency: f64,
}
