use irrigation_adapters::{CircuitBreakerError, CollaboratorError, DispatchError};
use irrigation_core::{DeliveryId, GateId};
use thiserror::Error;

/// Service-facade error taxonomy. Wraps the per-crate error kinds from
/// §7 (`CoreError`) plus the outbound-collaborator failure modes, so a
/// caller at the CLI boundary can match on one type instead of threading
/// five crates' error enums through every call site.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] irrigation_core::CoreError),

    #[error("gate {0} is not registered")]
    UnknownGate(GateId),

    #[error("delivery {0} has no scheduled record")]
    UnknownDelivery(DeliveryId),

    #[error("gate {gate_id} dispatch rejected: {source}")]
    Dispatch {
        gate_id: GateId,
        #[source]
        source: DispatchError,
    },

    #[error("collaborator call failed: {0}")]
    Collaborator(String),

    #[error("reconciliation for week {week}/{year} is already running")]
    ReconciliationInProgress { week: u32, year: i32 },

    #[error("background task panicked: {0}")]
    TaskJoin(String),
}

impl<E: std::fmt::Display> From<CircuitBreakerError<E>> for ServiceError {
    fn from(value: CircuitBreakerError<E>) -> Self {
        match value {
            CircuitBreakerError::Open => ServiceError::Collaborator("circuit breaker open".to_string()),
            CircuitBreakerError::Failed(e) => ServiceError::Collaborator(e.to_string()),
        }
    }
}

impl From<CollaboratorError> for ServiceError {
    fn from(value: CollaboratorError) -> Self {
        ServiceError::Collaborator(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
