use chrono::{DateTime, Utc};
use irrigation_core::{ControlKind, ControlMode, Gate, GateControl};

/// Everything the registry tracks about one gate: the physical asset, its
/// control record, and the bookkeeping the state machine and health
/// monitor need but that doesn't belong on the shared [`Gate`]/[`GateControl`]
/// types.
#[derive(Debug, Clone)]
pub struct GateEntry {
    pub gate: Gate,
    pub control: GateControl,
    pub mode_history: Vec<ModeTransition>,
}

#[derive(Debug, Clone)]
pub struct ModeTransition {
    pub from: ControlMode,
    pub to: ControlMode,
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl GateEntry {
    pub fn team_zone(&self) -> Option<&str> {
        match &self.control.kind {
            ControlKind::Manual(m) => Some(m.field_team_zone.as_str()),
            ControlKind::Automated(_) => None,
        }
    }

    pub fn scada_tag(&self) -> Option<&str> {
        match &self.control.kind {
            ControlKind::Automated(a) => Some(a.scada_tag.as_str()),
            ControlKind::Manual(_) => None,
        }
    }
}

/// Selector for [`crate::GateRegistry::list_by`].
#[derive(Debug, Clone)]
pub enum ListFilter {
    Mode(ControlMode),
    TeamZone(String),
}
