//! Calibrated gate discharge equations (C2) and the network-wide
//! steady-state hydraulic solver (C3), spec §4.2–§4.3.

pub mod gate;
pub mod geometry;
pub mod network;
pub mod solver;

pub use gate::{compute_gate_flow, validate_calibration, CalibrationValidation, GateHydraulicInputs, MeasuredObservation};
pub use geometry::{conjugate_depth, critical_depth, friction_loss_m, froude, normal_depth, velocity_at_depth, MIN_SLOPE};
pub use network::{Edge, Network};
pub use solver::{simulate_gate_change, solve_steady_state, Demands, GateOpenings, TransitionStep};
