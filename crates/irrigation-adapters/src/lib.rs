//! Outbound collaborator contracts and the supporting plumbing around them
//! (spec §6, SPEC_FULL.md §C): circuit-broken retries, the SCADA health
//! monitor, the per-gate dispatch queue, state preservation across control
//! transitions, and service discovery with a static fallback.

pub mod circuit_breaker;
pub mod collaborators;
pub mod dispatch;
pub mod health;
pub mod service_registry;
pub mod state_preservation;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use collaborators::{
    AnomalyEvent, CollaboratorError, FieldOpsAdapter, FlowReading, GateStatus, GisProvider, LevelReading,
    NetworkTopology, PathElevationSample, ScadaAdapter, SensorStore, SetPositionAck, WeatherProvider,
    WeatherSnapshot, WorkOrderAck, WorkOrderPayload,
};
pub use dispatch::{DispatchError, DispatchQueue, GateCommand};
pub use health::{run_probe_loop, HealthMonitor, HealthStatus};
pub use service_registry::{ServiceInfo, ServiceRegistry};
pub use state_preservation::{
    FileSnapshotStore, SnapshotStore, StatePreservation, StateRestoreResult, SystemStateSnapshot, TransitionType,
};
