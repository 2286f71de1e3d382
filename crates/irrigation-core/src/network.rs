use crate::ids::{ChannelId, GateId, NodeId, SectionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Reservoir,
    Junction,
    Delivery,
    Terminal,
}

/// A point in the network graph. Reservoir nodes are infinite-supply
/// boundary conditions and are excluded from continuity (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub ground_elevation_m: f64,
    pub surface_area_m2: f64,
    /// m3/s, delivery nodes only.
    pub demand_m3s: f64,
    pub min_depth_m: f64,
    pub max_depth_m: f64,
}

impl Node {
    pub fn is_reservoir(&self) -> bool {
        matches!(self.kind, NodeKind::Reservoir)
    }

    pub fn min_elevation_m(&self) -> f64 {
        self.ground_elevation_m + self.min_depth_m
    }

    pub fn max_elevation_m(&self) -> f64 {
        self.ground_elevation_m + self.max_depth_m
    }
}

/// Trapezoidal cross-section of an irrigation canal segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrapezoidalCrossSection {
    pub bottom_width_m: f64,
    pub side_slope: f64, // horizontal : vertical
}

impl TrapezoidalCrossSection {
    pub fn area(&self, depth_m: f64) -> f64 {
        let depth_m = depth_m.max(0.0);
        (self.bottom_width_m + self.side_slope * depth_m) * depth_m
    }

    pub fn top_width(&self, depth_m: f64) -> f64 {
        self.bottom_width_m + 2.0 * self.side_slope * depth_m.max(0.0)
    }

    pub fn wetted_perimeter(&self, depth_m: f64) -> f64 {
        let depth_m = depth_m.max(0.0);
        self.bottom_width_m + 2.0 * depth_m * (1.0 + self.side_slope * self.side_slope).sqrt()
    }

    pub fn hydraulic_radius(&self, depth_m: f64) -> f64 {
        let p = self.wetted_perimeter(depth_m);
        if p <= 0.0 {
            0.0
        } else {
            self.area(depth_m) / p
        }
    }
}

/// An ordered segment of canal between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanalSection {
    pub id: SectionId,
    pub channel_id: ChannelId,
    pub upstream_node: NodeId,
    pub downstream_node: NodeId,
    pub cross_section: TrapezoidalCrossSection,
    pub length_m: f64,
    pub manning_n: f64,
    pub bed_slope: f64,
    pub kind: CanalKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanalKind {
    Earthen,
    Lined,
    Concrete,
    Pipe,
}

/// A named grouping of canal sections with one upstream gate and a set of
/// downstream delivery gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub sections: Vec<SectionId>,
    pub upstream_gate: GateId,
    pub downstream_gates: Vec<GateId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropKind {
    Vertical,
    Stepped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DropStructure {
    pub drop_height_m: f64,
    pub kind: DropKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CalibrationMethod {
    Direct,
    InheritedSimilarity,
    TypeDefault,
}

/// `Cs = K1 * (Hs/Go)^K2`, bounded confidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Calibration {
    pub k1: f64,
    pub k2: f64,
    pub confidence: f64,
    pub method: CalibrationMethod,
}

impl Calibration {
    pub fn type_default() -> Self {
        Self {
            k1: 0.61,
            k2: 0.0,
            confidence: 0.3,
            method: CalibrationMethod::TypeDefault,
        }
    }

    /// Weighted-average inheritance from a set of similar gates (spec §3):
    /// similarity >= 0.5, confidence multiplied by 0.7.
    pub fn inherit_from(similar: &[(Calibration, f64)]) -> Option<Self> {
        let usable: Vec<&(Calibration, f64)> =
            similar.iter().filter(|(_, sim)| *sim >= 0.5).collect();
        if usable.is_empty() {
            return None;
        }
        let weight_sum: f64 = usable.iter().map(|(_, sim)| sim).sum();
        if weight_sum <= 0.0 {
            return None;
        }
        let k1 = usable.iter().map(|(c, sim)| c.k1 * sim).sum::<f64>() / weight_sum;
        let k2 = usable.iter().map(|(c, sim)| c.k2 * sim).sum::<f64>() / weight_sum;
        let confidence = usable
            .iter()
            .map(|(c, sim)| c.confidence * sim)
            .sum::<f64>()
            / weight_sum
            * 0.7;
        Some(Self {
            k1,
            k2,
            confidence: confidence.clamp(0.0, 1.0),
            method: CalibrationMethod::InheritedSimilarity,
        })
    }
}

/// Physical gate asset: geometry, calibration, topology. Control-mode state
/// lives in [`crate::control::GateControl`], owned exclusively by the
/// registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub id: GateId,
    pub width_m: f64,
    pub max_height_m: f64, // Go
    pub sill_elevation_m: f64,
    pub drop: Option<DropStructure>,
    pub calibration: Calibration,
    pub upstream_node: NodeId,
    pub downstream_node: NodeId,
    pub max_flow_m3s: f64,
}

impl Gate {
    pub fn max_opening_m(&self) -> f64 {
        self.max_height_m
    }

    /// Similarity score against another gate for calibration inheritance:
    /// same kind-of-drop-presence and close width/height.
    pub fn similarity(&self, other: &Gate) -> f64 {
        if self.drop.is_some() != other.drop.is_some() {
            return 0.0;
        }
        let width_sim = 1.0
            - ((self.width_m - other.width_m).abs() / self.width_m.max(other.width_m).max(1e-6))
                .min(1.0);
        let height_sim = 1.0
            - ((self.max_height_m - other.max_height_m).abs()
                / self.max_height_m.max(other.max_height_m).max(1e-6))
            .min(1.0);
        (width_sim + height_sim) / 2.0
    }
}
