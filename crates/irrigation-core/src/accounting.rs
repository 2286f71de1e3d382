use crate::ids::{DeliveryId, SectionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressLevel {
    None,
    Mild,
    Moderate,
    Severe,
}

impl StressLevel {
    /// Thresholds are inclusive on the lower class boundary (spec §8):
    /// 10.0% -> mild, 20.0% -> moderate, 20.01% -> severe.
    pub fn from_deficit_pct(pct: f64) -> Self {
        if pct <= 0.0 {
            StressLevel::None
        } else if pct <= 0.10 {
            StressLevel::Mild
        } else if pct <= 0.20 {
            StressLevel::Moderate
        } else {
            StressLevel::Severe
        }
    }

    pub fn stress_multiplier(&self) -> f64 {
        match self {
            StressLevel::None => 0.0,
            StressLevel::Mild => 0.8,
            StressLevel::Moderate => 1.2,
            StressLevel::Severe => 1.5,
        }
    }

    pub fn priority_score_component(&self) -> f64 {
        match self {
            StressLevel::None => 0.0,
            StressLevel::Mild => 10.0,
            StressLevel::Moderate => 20.0,
            StressLevel::Severe => 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompensationState {
    Uncompensated,
    Scheduled,
    Compensated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeficitRecord {
    pub section_id: SectionId,
    pub week: u32,
    pub year: i32,
    pub demand_m3: f64,
    pub delivered_m3: f64,
    pub consumed_m3: f64,
    pub delivery_deficit_m3: f64,
    pub deficit_pct: f64,
    pub stress: StressLevel,
    pub yield_impact: f64,
    pub recovery_priority: u8,
    pub compensation: CompensationState,
}

impl DeficitRecord {
    pub fn new(section_id: SectionId, week: u32, year: i32, demand_m3: f64, delivered_m3: f64) -> Self {
        let delivery_deficit_m3 = (demand_m3 - delivered_m3).max(0.0);
        let deficit_pct = if demand_m3 > 0.0 {
            delivery_deficit_m3 / demand_m3
        } else {
            0.0
        };
        let stress = StressLevel::from_deficit_pct(deficit_pct);
        Self {
            section_id,
            week,
            year,
            demand_m3,
            delivered_m3,
            consumed_m3: delivered_m3,
            delivery_deficit_m3,
            deficit_pct,
            stress,
            yield_impact: 0.0,
            recovery_priority: 0,
            compensation: CompensationState::Uncompensated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarryForwardEntry {
    pub week: u32,
    pub year: i32,
    pub deficit_m3: f64,
    pub age_weeks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarryForward {
    pub section_id: SectionId,
    pub window_weeks: u32,
    pub active: Vec<CarryForwardEntry>,
    pub history: Vec<CarryForwardEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationStatus {
    Pending,
    InProgress,
    Completed,
    Approved,
    Disputed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub delivery_id: DeliveryId,
    pub pre_outflow_m3: f64,
    pub post_outflow_m3: f64,
    pub pre_loss_m3: f64,
    pub post_loss_m3: f64,
    pub reason: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationLog {
    pub week: u32,
    pub year: i32,
    pub automated_count: u32,
    pub manual_count: u32,
    pub total_in_m3: f64,
    pub total_out_m3: f64,
    pub total_losses_m3: f64,
    pub discrepancy_m3: f64,
    pub adjustments: Vec<AdjustmentLine>,
    pub data_quality_score: f64,
    pub status: ReconciliationStatus,
    pub recommendations: Vec<String>,
    pub computed_at: DateTime<Utc>,
}
