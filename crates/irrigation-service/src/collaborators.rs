//! One circuit breaker per outbound collaborator (spec §6/§7), each call
//! routed through it the way `irrigation_adapters::circuit_breaker`
//! intends to be composed: retry on `Timeout`/`Unreachable` (the
//! 5xx/timeout-shaped failures), fail fast on `Remote` (the 4xx-shaped,
//! non-retryable application error).

use futures::future::BoxFuture;
use irrigation_adapters::{
    CircuitBreaker, CollaboratorError, FieldOpsAdapter, GisProvider, ScadaAdapter, SensorStore, WeatherProvider,
};
use std::sync::Arc;
use std::time::Duration;

type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

fn is_retryable(err: &CollaboratorError) -> bool {
    matches!(err, CollaboratorError::Timeout { .. } | CollaboratorError::Unreachable { .. })
}

/// Outbound collaborator handles plus the breaker guarding each one. Built
/// once at service startup and shared (via `Arc`) across every operation.
pub struct Collaborators {
    pub scada: Arc<dyn ScadaAdapter>,
    pub scada_breaker: CircuitBreaker,
    pub field_ops: Arc<dyn FieldOpsAdapter>,
    pub field_ops_breaker: CircuitBreaker,
    pub sensors: Arc<dyn SensorStore>,
    pub sensors_breaker: CircuitBreaker,
    pub gis: Arc<dyn GisProvider>,
    pub gis_breaker: CircuitBreaker,
    pub weather: Arc<dyn WeatherProvider>,
    pub weather_breaker: CircuitBreaker,
}

const FAILURE_THRESHOLD: u32 = 5;
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
const BASE_RETRY_DELAY: Duration = Duration::from_millis(200);

impl Collaborators {
    pub fn new(
        scada: Arc<dyn ScadaAdapter>,
        field_ops: Arc<dyn FieldOpsAdapter>,
        sensors: Arc<dyn SensorStore>,
        gis: Arc<dyn GisProvider>,
        weather: Arc<dyn WeatherProvider>,
    ) -> Self {
        Self {
            scada,
            scada_breaker: CircuitBreaker::new(FAILURE_THRESHOLD, RECOVERY_TIMEOUT),
            field_ops,
            field_ops_breaker: CircuitBreaker::new(FAILURE_THRESHOLD, RECOVERY_TIMEOUT),
            sensors,
            sensors_breaker: CircuitBreaker::new(FAILURE_THRESHOLD, RECOVERY_TIMEOUT),
            gis,
            gis_breaker: CircuitBreaker::new(FAILURE_THRESHOLD, RECOVERY_TIMEOUT),
            weather,
            weather_breaker: CircuitBreaker::new(FAILURE_THRESHOLD, RECOVERY_TIMEOUT),
        }
    }

    pub async fn call_scada<T: Send + 'static>(
        &self,
        f: impl FnMut() -> BoxFuture<'static, CollaboratorResult<T>>,
    ) -> crate::error::Result<T> {
        Ok(self.scada_breaker.call(BASE_RETRY_DELAY, is_retryable, f).await?)
    }

    pub async fn call_field_ops<T: Send + 'static>(
        &self,
        f: impl FnMut() -> BoxFuture<'static, CollaboratorResult<T>>,
    ) -> crate::error::Result<T> {
        Ok(self.field_ops_breaker.call(BASE_RETRY_DELAY, is_retryable, f).await?)
    }

    pub async fn call_sensors<T: Send + 'static>(
        &self,
        f: impl FnMut() -> BoxFuture<'static, CollaboratorResult<T>>,
    ) -> crate::error::Result<T> {
        Ok(self.sensors_breaker.call(BASE_RETRY_DELAY, is_retryable, f).await?)
    }

    pub async fn call_weather<T: Send + 'static>(
        &self,
        f: impl FnMut() -> BoxFuture<'static, CollaboratorResult<T>>,
    ) -> crate::error::Result<T> {
        Ok(self.weather_breaker.call(BASE_RETRY_DELAY, is_retryable, f).await?)
    }

    pub async fn call_gis<T: Send + 'static>(
        &self,
        f: impl FnMut() -> BoxFuture<'static, CollaboratorResult<T>>,
    ) -> crate::error::Result<T> {
        Ok(self.gis_breaker.call(BASE_RETRY_DELAY, is_retryable, f).await?)
    }
}
