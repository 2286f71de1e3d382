//! SCADA health monitor: a periodic probe loop independent of command
//! dispatch, grounded on the original `scada_health_monitor.py`. It keeps
//! its own rolling record of probe outcomes per automated gate, distinct
//! from [`irrigation_registry::GateRegistry`]'s `consecutive_failures`
//! counter — the registry counts *command/comm* failures, this monitor
//! counts *probe* outcomes on `scada.health_interval_s` (SPEC_FULL.md §C.1).

use crate::collaborators::ScadaAdapter;
use chrono::{DateTime, Utc};
use irrigation_core::GateId;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PROBE_HISTORY_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Copy)]
struct ProbeOutcome {
    at: DateTime<Utc>,
    success: bool,
}

#[derive(Default)]
struct GateProbeHistory {
    outcomes: VecDeque<ProbeOutcome>,
    streak_failures: u32,
}

/// Rolling per-gate probe record plus an overall SCADA availability figure,
/// read by mode-fallback decisions (spec §8 S6) alongside, not instead of,
/// the registry's own comm-failure counter.
pub struct HealthMonitor {
    gates: RwLock<HashMap<GateId, GateProbeHistory>>,
    overall_checks: RwLock<VecDeque<bool>>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self {
            gates: RwLock::new(HashMap::new()),
            overall_checks: RwLock::new(VecDeque::with_capacity(100)),
        }
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_probe(&self, gate_id: &GateId, success: bool) {
        let mut gates = self.gates.write();
        let history = gates.entry(gate_id.clone()).or_default();
        history.outcomes.push_back(ProbeOutcome { at: Utc::now(), success });
        if history.outcomes.len() > PROBE_HISTORY_LEN {
            history.outcomes.pop_front();
        }
        if success {
            history.streak_failures = 0;
        } else {
            history.streak_failures += 1;
        }
    }

    pub fn record_overall_check(&self, healthy: bool) {
        let mut checks = self.overall_checks.write();
        checks.push_back(healthy);
        if checks.len() > 100 {
            checks.pop_front();
        }
    }

    /// Percentage of successful probes within `window` for one gate.
    pub fn gate_availability(&self, gate_id: &GateId, window: Duration) -> f64 {
        let gates = self.gates.read();
        let Some(history) = gates.get(gate_id) else {
            return 0.0;
        };
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or(chrono::Duration::hours(1));
        let relevant: Vec<&ProbeOutcome> = history.outcomes.iter().filter(|o| o.at > cutoff).collect();
        if relevant.is_empty() {
            return 0.0;
        }
        let successes = relevant.iter().filter(|o| o.success).count();
        (successes as f64 / relevant.len() as f64) * 100.0
    }

    pub fn failed_gates(&self) -> Vec<GateId> {
        self.gates
            .read()
            .iter()
            .filter(|(_, h)| h.streak_failures >= 5)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Overall availability percentage across recorded checks, the basis
    /// for `SCADAHealthReport.availability_percentage` in the original.
    pub fn availability_percentage(&self) -> f64 {
        let checks = self.overall_checks.read();
        if checks.is_empty() {
            return 100.0;
        }
        let healthy = checks.iter().filter(|&&h| h).count();
        (healthy as f64 / checks.len() as f64) * 100.0
    }

    pub fn overall_status(&self) -> HealthStatus {
        let availability = self.availability_percentage();
        let failed = self.failed_gates().len();
        let total_gates = self.gates.read().len().max(1);
        let failed_fraction = failed as f64 / total_gates as f64;
        if availability < 90.0 || failed_fraction > 0.2 {
            HealthStatus::Failed
        } else if availability < 95.0 || failed_fraction > 0.1 {
            HealthStatus::Critical
        } else if availability < 99.0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn is_scada_available(&self) -> bool {
        matches!(self.overall_status(), HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Runs the periodic probe loop against `scada`, recording outcomes into
/// `monitor` and feeding `registry`'s comm-failure counter so mode fallback
/// (spec §8 S6) still happens through the registry's own threshold, not
/// through this monitor's availability figure.
pub async fn run_probe_loop(
    scada: Arc<dyn ScadaAdapter>,
    registry: Arc<irrigation_registry::GateRegistry>,
    monitor: Arc<HealthMonitor>,
    automated_gates: Vec<GateId>,
    interval: Duration,
    comm_failure_threshold: u32,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let overall_ok = scada.health_probe().await.is_ok();
        monitor.record_overall_check(overall_ok);
        if !overall_ok {
            warn!("scada health probe failed");
        }
        for gate_id in &automated_gates {
            let ok = scada.get_gate_status(gate_id).await.is_ok();
            monitor.record_probe(gate_id, ok);
            registry.record_communication(gate_id, ok, comm_failure_threshold);
        }
        info!(availability = monitor.availability_percentage(), "scada health check complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_reflects_recorded_outcomes() {
        let monitor = HealthMonitor::new();
        let gate: GateId = "g1".into();
        monitor.record_probe(&gate, true);
        monitor.record_probe(&gate, true);
        monitor.record_probe(&gate, false);
        let availability = monitor.gate_availability(&gate, Duration::from_secs(3600));
        assert!((availability - (2.0 / 3.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn streak_of_five_marks_gate_failed() {
        let monitor = HealthMonitor::new();
        let gate: GateId = "g1".into();
        for _ in 0..5 {
            monitor.record_probe(&gate, false);
        }
        assert!(monitor.failed_gates().contains(&gate));
    }

    #[test]
    fn overall_status_is_healthy_with_no_checks() {
        let monitor = HealthMonitor::new();
        assert_eq!(monitor.overall_status(), HealthStatus::Healthy);
    }
}
