use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlMode {
    Auto,
    Manual,
    Transitioning,
    Maintenance,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipmentStatus {
    Operational,
    Degraded,
    Failed,
    Maintenance,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actuator {
    Electric,
    Hydraulic,
    Pneumatic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomatedControl {
    pub scada_tag: String,
    pub actuator: Actuator,
    pub position_sensor: bool,
    pub comm_protocol: String,
    pub comm_address: String,
    pub response_time_budget_s: f64,
    pub max_slew_rate_per_s: f64,
    pub equipment_status: EquipmentStatus,
    pub fallback_mode: ControlMode,
    pub last_comm: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMethod {
    Wheel,
    Lever,
    Chain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceCategory {
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualControl {
    pub operation_method: OperationMethod,
    pub turns_to_open: u32,
    pub force_category: ForceCategory,
    pub field_team_zone: String,
    pub last_operation: Option<DateTime<Utc>>,
    pub typical_operation_duration_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlKind {
    Automated(AutomatedControl),
    Manual(ManualControl),
}

/// The authoritative, registry-owned control record for one gate.
/// Hydraulics and every other consumer read this read-only (spec §3
/// ownership rule).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateControl {
    pub kind: ControlKind,
    pub control_mode: ControlMode,
    pub opening_ratio: f64,
}

impl GateControl {
    pub fn is_automated(&self) -> bool {
        matches!(self.kind, ControlKind::Automated(_))
    }

    /// Manual gates are pinned to `manual` and may never leave it (spec §3).
    pub fn is_pinned_manual(&self) -> bool {
        matches!(self.kind, ControlKind::Manual(_))
    }
}

/// Triggers that can fire a mode transition rule (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    CommTimeout,
    PositionFault,
    ActuatorFault,
    MaintenanceWindow,
    FaultCleared,
    OperatorApproval,
    MaintenanceComplete,
}

/// `(trigger, from_mode, to_mode, condition, priority)`. `condition` is
/// evaluated against the current [`TransitionContext`]; the first matching
/// rule (by ascending priority number = higher priority) applies.
pub struct TransitionRule {
    pub trigger: Trigger,
    pub from_mode: ControlMode,
    pub to_mode: ControlMode,
    pub priority: u8,
    pub condition: Box<dyn Fn(&TransitionContext) -> bool + Send + Sync>,
}

#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    pub checks_pass: bool,
    pub operator_approved: bool,
    pub fault_cleared: bool,
}
