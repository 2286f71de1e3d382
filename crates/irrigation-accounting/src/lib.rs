//! Volume accounting and reconciliation (spec §4.5, component C5):
//! flow-to-volume integration, transit-loss modeling, conveyance/application
//! efficiency, deficit tracking with carry-forward, and weekly reconciliation
//! of manual-gate estimates against the closed water balance.

pub mod deficit;
pub mod efficiency;
pub mod loss;
pub mod reconciliation;
pub mod volume;

pub use deficit::{carry_forward_priority, compute_deficit_record, plan_recovery, update_carry_forward, RecoveryPlan};
pub use efficiency::{
    application_efficiency, delivery_efficiency, overall_efficiency, performance_score, uniformity_coefficient,
    EfficiencyClass, LimitingFactor, OverallEfficiency,
};
pub use loss::{calibrate_seepage_rate, estimate_transit_loss, TransitLossBreakdown, TransitLossInputs};
pub use reconciliation::{estimate_manual_gate_flow, reconcile_week, ManualFlowEstimate};
pub use volume::{integrate_volume, validate_flow_trace, IntegrationMethod, TraceValidation, VolumeIntegrationResult};
