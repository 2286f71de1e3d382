use irrigation_core::{CarryForward, CarryForwardEntry, DeficitConfig, DeficitRecord, SectionId, StressLevel};
use serde::{Deserialize, Serialize};

const TIMING_MULTIPLIER_CRITICAL: f64 = 1.3;
const TIMING_MULTIPLIER_NORMAL: f64 = 1.0;
const YIELD_IMPACT_CAP: f64 = 0.5;

/// Builds a section-week deficit record with `yield_impact` filled in
/// (spec §4.5.4); [`DeficitRecord::new`] only derives the deficit and
/// stress level.
pub fn compute_deficit_record(
    section_id: SectionId,
    week: u32,
    year: i32,
    demand_m3: f64,
    delivered_m3: f64,
    config: &DeficitConfig,
) -> DeficitRecord {
    let mut record = DeficitRecord::new(section_id, week, year, demand_m3, delivered_m3);
    let week_u8 = u8::try_from(week).unwrap_or(u8::MAX);
    let timing_multiplier = if config.critical_weeks.contains(&week_u8) {
        TIMING_MULTIPLIER_CRITICAL
    } else {
        TIMING_MULTIPLIER_NORMAL
    };
    record.yield_impact = (record.deficit_pct * 0.5 * record.stress.stress_multiplier() * timing_multiplier).min(YIELD_IMPACT_CAP);
    record
}

/// Ages every active carry-forward entry by one week, retires entries that
/// have aged out of the window into `history`, and appends this week's
/// deficit if it is positive (spec §4.5.4).
pub fn update_carry_forward(carry: &mut CarryForward, week: u32, year: i32, deficit_m3: f64) {
    for entry in carry.active.iter_mut() {
        entry.age_weeks += 1;
    }
    let window = carry.window_weeks;
    let current = std::mem::take(&mut carry.active);
    let (kept, aged_out): (Vec<CarryForwardEntry>, Vec<CarryForwardEntry>) =
        current.into_iter().partition(|entry| entry.age_weeks < window);
    carry.active = kept;
    carry.history.extend(aged_out);
    if deficit_m3 > 0.0 {
        carry.active.push(CarryForwardEntry {
            week,
            year,
            deficit_m3,
            age_weeks: 0,
        });
    }
}

/// `0.4*min(total/1000, 100) + 30*(max_age/window) + stress_score`, capped
/// at 100 (spec §4.5.4).
pub fn carry_forward_priority(carry: &CarryForward, stress: StressLevel) -> f64 {
    let total_m3: f64 = carry.active.iter().map(|e| e.deficit_m3).sum();
    let max_age = carry.active.iter().map(|e| e.age_weeks).max().unwrap_or(0);
    let window = carry.window_weeks.max(1) as f64;
    let score = 0.4 * (total_m3 / 1000.0).min(100.0) + 30.0 * (max_age as f64 / window) + stress.priority_score_component();
    score.min(100.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub weekly_allocation_m3: f64,
    pub weeks_planned: u32,
    pub fits_horizon: bool,
    pub total_deficit_m3: f64,
}

/// Distributes `min(total/horizon_weeks, extra_capacity_m3)` per week until
/// the carried deficit is exhausted (spec §4.5.4).
pub fn plan_recovery(total_deficit_m3: f64, extra_capacity_m3: f64, horizon_weeks: u32) -> RecoveryPlan {
    if total_deficit_m3 <= 0.0 {
        return RecoveryPlan {
            weekly_allocation_m3: 0.0,
            weeks_planned: 0,
            fits_horizon: true,
            total_deficit_m3: 0.0,
        };
    }
    let horizon = horizon_weeks.max(1);
    let weekly_allocation_m3 = (total_deficit_m3 / horizon as f64).min(extra_capacity_m3.max(0.0));
    let weeks_planned = if weekly_allocation_m3 > 0.0 {
        (total_deficit_m3 / weekly_allocation_m3).ceil() as u32
    } else {
        u32::MAX
    };
    const WEEKS_PLANNED_CAP: u32 = 100_000;
    RecoveryPlan {
        weekly_allocation_m3,
        weeks_planned: weeks_planned.min(WEEKS_PLANNED_CAP),
        fits_horizon: weeks_planned <= horizon,
        total_deficit_m3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yield_impact_is_capped_at_half() {
        let config = DeficitConfig {
            window_weeks: 4,
            critical_weeks: vec![10],
        };
        let record = compute_deficit_record(SectionId::from("s1"), 10, 2026, 1000.0, 200.0, &config);
        assert!(record.yield_impact <= 0.5 + 1e-9);
        assert_eq!(record.stress, StressLevel::Severe);
    }

    #[test]
    fn carry_forward_drops_entries_past_the_window() {
        let mut carry = CarryForward {
            section_id: SectionId::from("s1"),
            window_weeks: 2,
            active: vec![CarryForwardEntry {
                week: 1,
                year: 2026,
                deficit_m3: 50.0,
                age_weeks: 1,
            }],
            history: Vec::new(),
        };
        update_carry_forward(&mut carry, 3, 2026, 0.0);
        assert!(carry.active.is_empty());
        assert_eq!(carry.history.len(), 1);
    }

    #[test]
    fn recovery_plan_fits_when_capacity_matches_deficit() {
        let plan = plan_recovery(400.0, 200.0, 4);
        assert!(plan.fits_horizon);
        assert!((plan.weekly_allocation_m3 - 100.0).abs() < 1e-9);
    }
}
