use irrigation_core::{ControlMode, TransitionRule, Trigger};

/// The default automated-gate mode state machine (spec §4.1 diagram):
///
/// ```text
///                  fault_cleared ∧ checks_pass ∧ operator_ok
///         ┌──────────────────────────────────────────────┐
///         │                                              ▼
///      FAILED ◄──── actuator_fault ──── AUTO ──maint_window──► MAINTENANCE
///                                         │
///                            comm_timeout │ position_fault
///                                         ▼
///                                       MANUAL
/// ```
///
/// Rules are matched by `(trigger, from_mode)`; within a match, ascending
/// `priority` wins. Manual→Auto recovery additionally requires an explicit
/// operator approval flag, not just cleared faults.
pub fn default_transition_rules() -> Vec<TransitionRule> {
    vec![
        TransitionRule {
            trigger: Trigger::CommTimeout,
            from_mode: ControlMode::Auto,
            to_mode: ControlMode::Manual,
            priority: 10,
            condition: Box::new(|_ctx| true),
        },
        TransitionRule {
            trigger: Trigger::PositionFault,
            from_mode: ControlMode::Auto,
            to_mode: ControlMode::Manual,
            priority: 10,
            condition: Box::new(|_ctx| true),
        },
        TransitionRule {
            trigger: Trigger::ActuatorFault,
            from_mode: ControlMode::Auto,
            to_mode: ControlMode::Failed,
            priority: 10,
            condition: Box::new(|_ctx| true),
        },
        TransitionRule {
            trigger: Trigger::MaintenanceWindow,
            from_mode: ControlMode::Auto,
            to_mode: ControlMode::Maintenance,
            priority: 10,
            condition: Box::new(|_ctx| true),
        },
        TransitionRule {
            trigger: Trigger::FaultCleared,
            from_mode: ControlMode::Failed,
            to_mode: ControlMode::Auto,
            priority: 10,
            condition: Box::new(|ctx| ctx.fault_cleared && ctx.checks_pass && ctx.operator_approved),
        },
        TransitionRule {
            trigger: Trigger::MaintenanceComplete,
            from_mode: ControlMode::Maintenance,
            to_mode: ControlMode::Auto,
            priority: 10,
            condition: Box::new(|ctx| ctx.checks_pass),
        },
        // Manual→Auto recovery requires both automatic checks passing and
        // an explicit operator approval flag (spec §4.1).
        TransitionRule {
            trigger: Trigger::OperatorApproval,
            from_mode: ControlMode::Manual,
            to_mode: ControlMode::Auto,
            priority: 10,
            condition: Box::new(|ctx| ctx.checks_pass && ctx.operator_approved),
        },
    ]
}
