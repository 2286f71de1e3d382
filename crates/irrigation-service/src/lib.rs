//! Facade crate wiring the gate registry, hydraulic solver, delivery
//! optimizer and accounting/reconciliation logic behind the six inbound
//! operations a control-room operator or an upstream scheduler calls.
//! Everything CPU-bound runs on the `rayon` pool via [`worker::run_cpu_bound`];
//! everything I/O-bound goes through [`collaborators::Collaborators`], each
//! call guarded by a circuit breaker.

pub mod anomaly;
pub mod collaborators;
pub mod error;
pub mod health_feed;
pub mod service;
pub mod store;
pub mod topology;
pub mod types;
pub mod worker;

pub use anomaly::AnomalyFeed;
pub use collaborators::Collaborators;
pub use error::{Result, ServiceError};
pub use health_feed::{HealthFeed, HealthSnapshot};
pub use service::{schedule_delivery, ServiceState};
pub use store::{InMemoryMetadataStore, MetadataStore};
pub use topology::TopologyRegistry;
pub use types::{
    CommandAcceptance, CompleteDeliveryResult, DeliveryEnvironment, DispatchChannel, EmergencyScope, GateStopResult,
    SectionAccounting,
};
