//! Outbound collaborator contracts (spec §6): the core never embeds a SCADA
//! driver, a work-order system, a time-series client or a GIS/weather feed —
//! it depends on these traits, implemented elsewhere and composed behind
//! [`crate::circuit_breaker::CircuitBreaker`], independent of any one
//! transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use irrigation_core::{ControlMode, GateId, NodeId, SectionId, ZoneId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} timed out after {attempts} attempts")]
    Timeout { service: &'static str, attempts: u32 },
    #[error("{service} returned an error: {detail}")]
    Remote { service: &'static str, detail: String },
    #[error("{service} is unreachable: {detail}")]
    Unreachable { service: &'static str, detail: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetPositionAck {
    pub accepted: bool,
    pub expected_completion: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStatus {
    pub gate_id: GateId,
    pub opening_m: f64,
    pub control_mode: ControlMode,
    pub upstream_level_m: f64,
    pub downstream_level_m: f64,
    pub flow_m3s: f64,
    pub timestamp: DateTime<Utc>,
}

/// `set_position`/`get_gate_status`/`batch_get_status`/`emergency_stop` plus
/// the health and OPC-UA probes a [`crate::health::HealthMonitor`] drives on
/// `scada.health_interval_s` (spec §6).
#[async_trait]
pub trait ScadaAdapter: Send + Sync {
    async fn set_position(
        &self,
        gate_id: &GateId,
        target_m: f64,
        transition_s: f64,
        priority: u8,
    ) -> Result<SetPositionAck, CollaboratorError>;

    async fn get_gate_status(&self, gate_id: &GateId) -> Result<GateStatus, CollaboratorError>;

    async fn batch_get_status(&self, gate_ids: &[GateId]) -> Result<Vec<GateStatus>, CollaboratorError>;

    async fn emergency_stop(&self, gate_id: &GateId) -> Result<SetPositionAck, CollaboratorError>;

    async fn health_probe(&self) -> Result<(), CollaboratorError>;

    async fn opc_ua_server_state(&self) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderPayload {
    pub gate_id: GateId,
    pub location: String,
    pub target_opening_pct: f64,
    pub priority: u8,
    pub scheduled_time: DateTime<Utc>,
    pub team_zone: String,
    pub contact_info: String,
    pub safety_notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderAck {
    pub id: String,
    pub assigned_team: String,
    pub qr_url: Option<String>,
}

#[async_trait]
pub trait FieldOpsAdapter: Send + Sync {
    async fn create_work_order(&self, payload: WorkOrderPayload) -> Result<WorkOrderAck, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlowReading {
    pub timestamp: DateTime<Utc>,
    pub flow_rate_m3s: f64,
    pub quality: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelReading {
    pub timestamp: DateTime<Utc>,
    pub level_m: f64,
    pub quality: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub gate_id: Option<GateId>,
    pub section_id: Option<SectionId>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

#[async_trait]
pub trait SensorStore: Send + Sync {
    async fn flow_readings(
        &self,
        gate_id: &GateId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FlowReading>, CollaboratorError>;

    async fn level_readings(
        &self,
        node_id: &NodeId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LevelReading>, CollaboratorError>;

    async fn gate_position(&self, gate_id: &GateId) -> Result<Option<f64>, CollaboratorError>;

    async fn anomaly_stream(&self, since: DateTime<Utc>) -> Result<Vec<AnomalyEvent>, CollaboratorError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkTopology {
    pub node_ids: Vec<NodeId>,
    pub gate_ids: Vec<GateId>,
    pub zone_ids: Vec<ZoneId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathElevationSample {
    pub distance_m: f64,
    pub elevation_m: f64,
}

#[async_trait]
pub trait GisProvider: Send + Sync {
    async fn network_topology(&self) -> Result<NetworkTopology, CollaboratorError>;

    async fn elevation_along_path(
        &self,
        source: &NodeId,
        destination: &NodeId,
        sample_interval_m: f64,
    ) -> Result<Vec<PathElevationSample>, CollaboratorError>;

    async fn path_find(&self, source: &NodeId, zone: &ZoneId) -> Result<Vec<NodeId>, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    pub relative_humidity_pct: f64,
    pub wind_speed_ms: f64,
    pub solar_radiation_w_m2: f64,
    pub rainfall_mm: f64,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, zone_id: &ZoneId) -> Result<WeatherSnapshot, CollaboratorError>;

    async fn windowed(
        &self,
        zone_id: &ZoneId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<WeatherSnapshot>, CollaboratorError>;

    async fn reference_et_mm(&self, zone_id: &ZoneId, day: DateTime<Utc>) -> Result<f64, CollaboratorError>;
}
