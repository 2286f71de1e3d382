use crate::error::Warning;
use crate::ids::{GateId, NodeId, SectionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowRegime {
    NoFlow,
    FreeFlow,
    SubmergedFlow,
    CriticalFlow,
}

/// Output of the calibrated gate hydraulics equation (spec §4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateFlowResult {
    pub flow_m3s: f64,
    pub regime: FlowRegime,
    pub discharge_coefficient: f64,
    pub velocity_ms: f64,
    pub froude: f64,
    pub energy_loss_m: f64,
    pub confidence: f64,
}

/// A point-in-time snapshot of the whole network's hydraulic state,
/// produced by the solver. Callers receive deep copies (spec §3
/// ownership); the solver never shares this across invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydraulicState {
    pub node_levels_m: HashMap<NodeId, f64>,
    pub gate_flows_m3s: HashMap<GateId, f64>,
    pub gate_openings_m: HashMap<GateId, f64>,
    pub section_flows_m3s: HashMap<SectionId, f64>,
    pub node_demands_m3s: HashMap<NodeId, f64>,
    pub converged: bool,
    pub iterations: u32,
    pub max_delta_m: f64,
    pub warnings: Vec<Warning>,
    pub timestamp: DateTime<Utc>,
}

impl HydraulicState {
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            node_levels_m: HashMap::new(),
            gate_flows_m3s: HashMap::new(),
            gate_openings_m: HashMap::new(),
            section_flows_m3s: HashMap::new(),
            node_demands_m3s: HashMap::new(),
            converged: false,
            iterations: 0,
            max_delta_m: f64::INFINITY,
            warnings: Vec::new(),
            timestamp,
        }
    }
}
