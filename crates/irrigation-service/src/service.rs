//! The facade wiring C1–C5 and the adapters behind the six inbound
//! contracts of spec §6. This is the only place in the workspace that
//! owns a `Network`/`GateRegistry`/`Collaborators` triple together and
//! dispatches compute-heavy calls onto the `rayon` pool via
//! [`crate::worker::run_cpu_bound`] (spec §5).

use crate::collaborators::Collaborators;
use crate::error::{Result, ServiceError};
use crate::store::MetadataStore;
use crate::topology::TopologyRegistry;
use crate::types::{
    CommandAcceptance, CompleteDeliveryResult, DeliveryEnvironment, DispatchChannel, EmergencyScope, GateStopResult,
    SectionAccounting,
};
use crate::worker::run_cpu_bound;
use chrono::{DateTime, Utc};
use irrigation_accounting::{
    carry_forward_priority, delivery_efficiency as conveyance_efficiency, estimate_transit_loss, integrate_volume,
    uniformity_coefficient, validate_flow_trace, IntegrationMethod, TransitLossInputs,
};
use irrigation_adapters::{DispatchQueue, GateCommand, HealthMonitor, StatePreservation, WorkOrderPayload};
use irrigation_core::{
    Config, ControlMode, CoreError, DeliveryId, DeliveryPath, DeliveryRecord, DeliveryStatus, FlowSample, GateId,
    NodeId, SectionId, StressLevel, Warning, ZoneDemandRequest,
};
use irrigation_hydraulics::{Demands, GateOpenings, Network};
use irrigation_optimizer::{is_blocking, optimize, safety_precheck, Objective, OptimizationResult, OptimizeOptions};
use irrigation_registry::GateRegistry;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a reconciliation run is tracked against: in-flight guard and
/// the last-computed log per (week, year), matching spec §5's single-flight
/// requirement and the idempotence property in spec §8.
#[derive(Default)]
struct ReconciliationTracker {
    inflight: HashSet<(u32, i32)>,
    completed: HashMap<(u32, i32), irrigation_core::ReconciliationLog>,
}

/// Process-lifetime service state: the network topology, the gate
/// registry, every outbound collaborator, and the metadata store, composed
/// into the six inbound operations of spec §6. Constructed once per
/// process and shared behind an `Arc` by every caller (CLI commands, a
/// future RPC surface).
pub struct ServiceState {
    pub network: Network,
    pub registry: Arc<GateRegistry>,
    pub config: Config,
    pub topology: TopologyRegistry,
    pub store: Arc<dyn MetadataStore>,
    pub collaborators: Collaborators,
    pub dispatch: DispatchQueue,
    pub state_preservation: StatePreservation,
    pub health_monitor: Arc<HealthMonitor>,
    current_levels: RwLock<HashMap<NodeId, f64>>,
    reconciliation: Mutex<ReconciliationTracker>,
}

#[allow(clippy::too_many_arguments)]
impl ServiceState {
    pub fn new(
        network: Network,
        registry: Arc<GateRegistry>,
        config: Config,
        topology: TopologyRegistry,
        store: Arc<dyn MetadataStore>,
        collaborators: Collaborators,
        dispatch: DispatchQueue,
        state_preservation: StatePreservation,
        health_monitor: Arc<HealthMonitor>,
    ) -> Self {
        crate::worker::ensure_rayon_pool();
        let current_levels = network
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.min_elevation_m()))
            .collect();
        Self {
            network,
            registry,
            config,
            topology,
            store,
            collaborators,
            dispatch,
            state_preservation,
            health_monitor,
            current_levels: RwLock::new(current_levels),
            reconciliation: Mutex::new(ReconciliationTracker::default()),
        }
    }

    /// Opening in meters per gate, read off the registry's authoritative
    /// control record — the base state every optimization/safety-check
    /// call treats as "current" (spec §3 ownership: the registry owns
    /// control records, everything else reads them).
    fn current_gate_openings(&self) -> GateOpenings {
        let mut openings = GateOpenings::new();
        for gate_id in self.network.gates.keys() {
            if let Some(entry) = self.registry.get(gate_id) {
                openings.insert(gate_id.clone(), entry.control.opening_ratio * entry.gate.max_opening_m());
            }
        }
        openings
    }

    fn automated_gate_ids(&self) -> HashSet<GateId> {
        self.network
            .gates
            .keys()
            .filter(|id| self.registry.get(id).map(|e| e.control.is_automated()).unwrap_or(false))
            .cloned()
            .collect()
    }

    fn node_demands_for(&self, demands: &[ZoneDemandRequest]) -> Demands {
        let zone_nodes = self.topology.zone_nodes();
        let mut out = Demands::new();
        for demand in demands {
            if let Some(node_id) = zone_nodes.get(&demand.zone_id) {
                out.insert(node_id.clone(), demand.required_flow_m3s);
            }
        }
        out
    }

    // ---- §6 optimize_delivery ------------------------------------------------

    /// Runs the full gravity delivery optimization pipeline (spec §4.4) on
    /// the `rayon` pool, seeded with the registry's current gate openings
    /// and this service's best-known node levels.
    pub async fn optimize_delivery(
        &self,
        demands: Vec<ZoneDemandRequest>,
        source: NodeId,
        source_level_override: Option<f64>,
        objective: Objective,
        options: OptimizeOptions,
    ) -> Result<OptimizationResult> {
        let network = self.network.clone();
        let registry = self.registry.clone();
        let config = self.config.clone();
        let zone_nodes = self.topology.zone_nodes();
        let zone_gate = self.topology.zone_gate();
        let current_levels = self.current_levels.read().clone();
        let base_openings = self.current_gate_openings();
        let node_demands = self.node_demands_for(&demands);
        let source_level_m = source_level_override.unwrap_or(config.source_elevation_m);
        let total_inflow_m3s: f64 = demands.iter().map(|d| d.required_flow_m3s).sum();
        let mut options = options;
        options.objective = objective;

        let result = run_cpu_bound(move || {
            optimize(
                &network,
                &registry,
                &source,
                source_level_m,
                total_inflow_m3s,
                &zone_nodes,
                &zone_gate,
                &current_levels,
                &demands,
                &base_openings,
                &node_demands,
                &options,
                &config,
            )
        })
        .await?;

        info!(
            zones = result.zone_feasibility.len(),
            efficiency = result.efficiency,
            warnings = result.warnings.len(),
            "optimize_delivery complete"
        );
        Ok(result)
    }

    // ---- §6 complete_delivery --------------------------------------------------

    /// Integrates a flow trace into a volume, estimates transit loss, and
    /// finalizes the stored [`DeliveryRecord`] — spec §3 invariant 4:
    /// `gate_outflow = section_inflow + transit_loss` exactly, inflow is
    /// always derived, never independently measured.
    pub async fn complete_delivery(
        &self,
        delivery_id: DeliveryId,
        actual_start: DateTime<Utc>,
        actual_end: DateTime<Utc>,
        flow_trace: Vec<FlowSample>,
        environment: DeliveryEnvironment,
    ) -> Result<CompleteDeliveryResult> {
        let mut record = self
            .store
            .get_delivery(delivery_id)
            .await
            .ok_or(ServiceError::UnknownDelivery(delivery_id))?;

        let section = self
            .network
            .sections
            .get(&record.section_id)
            .ok_or_else(|| ServiceError::Core(CoreError::Validation(format!("section {} not in network", record.section_id))))?;

        let trace_quality = validate_flow_trace(&flow_trace);
        let integration = integrate_volume(&flow_trace, IntegrationMethod::Trapezoidal, 60);
        let outflow_m3 = integration.total_volume_m3;
        let transit_hours = (actual_end - actual_start).num_seconds().max(0) as f64 / 3600.0;

        let inputs = TransitLossInputs {
            canal_kind: section.kind,
            length_km: section.length_m / 1000.0,
            volume_m3: outflow_m3,
            transit_hours,
            surface_area_m2: section.cross_section.top_width(section.cross_section.bottom_width_m) * section.length_m,
            water_depth_m: section.cross_section.bottom_width_m.max(0.3),
            temperature_c: environment.temperature_c,
            relative_humidity_pct: environment.relative_humidity_pct,
            wind_speed_ms: environment.wind_speed_ms,
            solar_radiation_w_m2: environment.solar_radiation_w_m2,
            flow_m3s: if transit_hours > 0.0 { outflow_m3 / (transit_hours * 3600.0) } else { 0.0 },
        };
        let loss = estimate_transit_loss(&inputs, &self.config.loss);
        let inflow_m3 = DeliveryRecord::derive_inflow(outflow_m3, loss.total_m3);
        let (efficiency, efficiency_class) = conveyance_efficiency(inflow_m3, outflow_m3);

        record.actual_start = Some(actual_start);
        record.actual_end = Some(actual_end);
        record.gate_outflow_m3 = outflow_m3;
        record.section_inflow_m3 = inflow_m3;
        record.transit_loss_m3 = loss.total_m3;
        record.flow_trace = flow_trace;
        record.travel_time_s = (actual_end - actual_start).num_seconds().max(0) as f64;
        record.status = if trace_quality.quality_score < 0.3 {
            DeliveryStatus::Partial
        } else {
            DeliveryStatus::Completed
        };

        self.store.put_delivery(record.clone()).await;

        let mut warnings = Vec::new();
        if trace_quality.quality_score < 0.5 {
            warnings.push(Warning::new("low_trace_quality", "flow trace quality score below 0.5"));
        }

        Ok(CompleteDeliveryResult {
            delivery: record,
            integrated_volume_m3: outflow_m3,
            trace_quality,
            loss,
            delivery_efficiency: efficiency,
            efficiency_class,
            warnings,
        })
    }

    // ---- §6 reconcile_week ------------------------------------------------------

    /// Closes the weekly water balance (spec §4.5.5). Single-flight per
    /// (week, year): a concurrent call while one is running, or a repeat
    /// call after one has already completed, is a no-op unless `force` is
    /// set (spec §5, §8 idempotence property).
    pub async fn reconcile_week(&self, week: u32, year: i32, force: bool) -> Result<irrigation_core::ReconciliationLog> {
        {
            let mut tracker = self.reconciliation.lock();
            if !force {
                if let Some(log) = tracker.completed.get(&(week, year)) {
                    return Ok(log.clone());
                }
                if tracker.inflight.contains(&(week, year)) {
                    return Ok(irrigation_core::ReconciliationLog {
                        week,
                        year,
                        automated_count: 0,
                        manual_count: 0,
                        total_in_m3: 0.0,
                        total_out_m3: 0.0,
                        total_losses_m3: 0.0,
                        discrepancy_m3: 0.0,
                        adjustments: Vec::new(),
                        data_quality_score: 0.0,
                        status: irrigation_core::ReconciliationStatus::InProgress,
                        recommendations: Vec::new(),
                        computed_at: Utc::now(),
                    });
                }
            }
            tracker.inflight.insert((week, year));
        }

        let outcome = self.run_reconciliation(week, year).await;
        self.reconciliation.lock().inflight.remove(&(week, year));

        let log = outcome?;
        self.reconciliation.lock().completed.insert((week, year), log.clone());
        Ok(log)
    }

    async fn run_reconciliation(&self, week: u32, year: i32) -> Result<irrigation_core::ReconciliationLog> {
        let deliveries: Vec<DeliveryRecord> = self
            .store
            .deliveries_for_week(week, year)
            .await
            .into_iter()
            .filter(|d| matches!(d.status, DeliveryStatus::Completed | DeliveryStatus::Partial))
            .collect();
        let reported_losses_m3: f64 = deliveries.iter().map(|d| d.transit_loss_m3).sum();
        let automated_gates = self.automated_gate_ids();
        let config = self.config.recon.clone();

        let outcome = irrigation_accounting::reconcile_week(&deliveries, &automated_gates, reported_losses_m3, week, year, &config)?;
        for warning in &outcome.warnings {
            warn!(code = %warning.code, message = %warning.message, "reconciliation warning");
        }
        let log = outcome.value;

        for adjustment in &log.adjustments {
            if let Some(mut delivery) = self.store.get_delivery(adjustment.delivery_id).await {
                delivery.gate_outflow_m3 = adjustment.post_outflow_m3;
                delivery.transit_loss_m3 = adjustment.post_loss_m3;
                delivery.section_inflow_m3 = DeliveryRecord::derive_inflow(adjustment.post_outflow_m3, adjustment.post_loss_m3);
                delivery.adjusted = true;
                self.store.put_delivery(delivery).await;
            }
        }
        Ok(log)
    }

    // ---- §6 control_gate ---------------------------------------------------------

    /// Routes one gate command through the registry's current mode: a
    /// `transitioning`/`maintenance`/`failed`/`manual` gate gets a field
    /// work order, an `auto` gate is safety pre-checked and dispatched
    /// through the per-gate queue to SCADA (spec §6, §4.4.5, §5 ordering).
    pub async fn control_gate(
        &self,
        gate_id: GateId,
        target_opening_ratio: f64,
        transition_s: f64,
        priority: u8,
        reason: String,
    ) -> Result<CommandAcceptance> {
        let entry = self.registry.get(&gate_id).ok_or_else(|| ServiceError::UnknownGate(gate_id.clone()))?;
        let target_ratio = target_opening_ratio.clamp(0.0, 1.0);
        let target_m = target_ratio * entry.gate.max_opening_m();

        let base_openings = self.current_gate_openings();
        let node_demands: Demands = self
            .network
            .nodes
            .iter()
            .filter(|(_, n)| n.demand_m3s > 0.0)
            .map(|(id, n)| (id.clone(), n.demand_m3s))
            .collect();
        let (mut warnings, _state) = safety_precheck(
            &self.network,
            &self.registry,
            &base_openings,
            &node_demands,
            &self.config,
            &gate_id,
            target_m,
            transition_s,
        );
        if warnings.iter().any(is_blocking) {
            return Err(ServiceError::Core(CoreError::Safety(format!(
                "control_gate for {gate_id} rejected by safety pre-check"
            ))));
        }

        match entry.control.control_mode {
            ControlMode::Auto => {
                let command = GateCommand::new(gate_id.clone(), target_m, transition_s, priority, reason);
                self.dispatch
                    .enqueue(command)
                    .map_err(|source| ServiceError::Dispatch { gate_id: gate_id.clone(), source })?;
                let Some(next) = self.dispatch.pop_next(&gate_id) else {
                    return Err(ServiceError::UnknownGate(gate_id));
                };
                let scada = self.collaborators.scada.clone();
                let g = gate_id.clone();
                let ack = self
                    .collaborators
                    .call_scada(move || {
                        let scada = scada.clone();
                        let g = g.clone();
                        Box::pin(async move { scada.set_position(&g, next.target_m, next.transition_s, next.priority).await })
                    })
                    .await;
                match ack {
                    Ok(ack) => {
                        self.registry.record_communication(&gate_id, true, self.config.scada.comm_failure_threshold);
                        Ok(CommandAcceptance {
                            gate_id,
                            accepted: ack.accepted,
                            expected_completion: ack.expected_completion,
                            channel: DispatchChannel::Scada,
                            warnings,
                        })
                    }
                    Err(err) => {
                        self.registry.record_communication(&gate_id, false, self.config.scada.comm_failure_threshold);
                        warnings.push(Warning::new("scada_dispatch_failed", err.to_string()));
                        Err(ServiceError::Collaborator(err.to_string()))
                    }
                }
            }
            ControlMode::Manual | ControlMode::Transitioning | ControlMode::Maintenance | ControlMode::Failed => {
                let team_zone = entry.team_zone().unwrap_or("unassigned").to_string();
                let payload = WorkOrderPayload {
                    gate_id: gate_id.clone(),
                    location: format!("node {}", entry.gate.upstream_node),
                    target_opening_pct: target_ratio * 100.0,
                    priority,
                    scheduled_time: Utc::now(),
                    team_zone,
                    contact_info: String::new(),
                    safety_notes: Vec::new(),
                };
                let field_ops = self.collaborators.field_ops.clone();
                let ack = self
                    .collaborators
                    .call_field_ops(move || {
                        let field_ops = field_ops.clone();
                        let payload = payload.clone();
                        Box::pin(async move { field_ops.create_work_order(payload).await })
                    })
                    .await
                    .map_err(|err| ServiceError::Collaborator(err.to_string()))?;
                Ok(CommandAcceptance {
                    gate_id,
                    accepted: true,
                    expected_completion: Utc::now() + chrono::Duration::seconds(transition_s.max(0.0) as i64),
                    channel: DispatchChannel::WorkOrder { work_order_id: ack.id, assigned_team: ack.assigned_team },
                    warnings,
                })
            }
        }
    }

    // ---- §6 emergency_stop --------------------------------------------------------

    /// Stops every gate in `scope` immediately: automated gates via the
    /// SCADA adapter's `emergency_stop`, manual gates via a
    /// maximum-priority work order, per spec §6.
    pub async fn emergency_stop(&self, scope: EmergencyScope, reason: String, operator: String) -> Result<Vec<GateStopResult>> {
        let gate_ids: Vec<GateId> = match scope {
            EmergencyScope::Single(id) => vec![id],
            EmergencyScope::Zone(zone) => self.topology.gate_for_zone(&zone).into_iter().collect(),
            EmergencyScope::All => self.network.gates.keys().cloned().collect(),
        };

        let mut results = Vec::with_capacity(gate_ids.len());
        for gate_id in gate_ids {
            let Some(entry) = self.registry.get(&gate_id) else {
                results.push(GateStopResult { gate_id, accepted: false, detail: "unknown gate".to_string() });
                continue;
            };

            if entry.control.is_automated() {
                let scada = self.collaborators.scada.clone();
                let g = gate_id.clone();
                let result = self
                    .collaborators
                    .call_scada(move || {
                        let scada = scada.clone();
                        let g = g.clone();
                        Box::pin(async move { scada.emergency_stop(&g).await })
                    })
                    .await;
                match result {
                    Ok(_) => {
                        self.registry.record_communication(&gate_id, true, self.config.scada.comm_failure_threshold);
                        results.push(GateStopResult { gate_id, accepted: true, detail: "scada emergency_stop accepted".to_string() });
                    }
                    Err(err) => {
                        self.registry.record_communication(&gate_id, false, self.config.scada.comm_failure_threshold);
                        results.push(GateStopResult { gate_id, accepted: false, detail: err.to_string() });
                    }
                }
            } else {
                let team_zone = entry.team_zone().unwrap_or("unassigned").to_string();
                let payload = WorkOrderPayload {
                    gate_id: gate_id.clone(),
                    location: format!("node {}", entry.gate.upstream_node),
                    target_opening_pct: 0.0,
                    priority: u8::MAX,
                    scheduled_time: Utc::now(),
                    team_zone,
                    contact_info: operator.clone(),
                    safety_notes: vec![reason.clone()],
                };
                let field_ops = self.collaborators.field_ops.clone();
                let result = self
                    .collaborators
                    .call_field_ops(move || {
                        let field_ops = field_ops.clone();
                        let payload = payload.clone();
                        Box::pin(async move { field_ops.create_work_order(payload).await })
                    })
                    .await;
                match result {
                    Ok(ack) => results.push(GateStopResult {
                        gate_id,
                        accepted: true,
                        detail: format!("emergency work order {} assigned to {}", ack.id, ack.assigned_team),
                    }),
                    Err(err) => results.push(GateStopResult { gate_id, accepted: false, detail: err.to_string() }),
                }
            }
        }
        Ok(results)
    }

    // ---- §6 get_section_accounting ------------------------------------------------

    pub async fn get_section_accounting(&self, section_id: SectionId) -> Result<SectionAccounting> {
        let recent_deliveries = self.store.recent_deliveries(&section_id, 10).await;
        let latest_deficit = self.store.latest_deficit(&section_id).await;
        let carry_forward = self.store.get_carry_forward(&section_id, self.config.deficit.window_weeks).await;
        let stress = latest_deficit.as_ref().map(|d| d.stress).unwrap_or(StressLevel::None);
        let priority = carry_forward_priority(&carry_forward, stress);
        let total_m3: f64 = carry_forward.active.iter().map(|e| e.deficit_m3).sum();

        let inflow_volumes: Vec<f64> = recent_deliveries.iter().map(|d| d.section_inflow_m3).collect();
        let uniformity = uniformity_coefficient(&inflow_volumes);
        let mean_efficiency = if recent_deliveries.is_empty() {
            0.0
        } else {
            recent_deliveries
                .iter()
                .map(|d| conveyance_efficiency(d.section_inflow_m3, d.gate_outflow_m3.max(1e-9)).0)
                .sum::<f64>()
                / recent_deliveries.len() as f64
        };

        Ok(SectionAccounting {
            recent_deliveries,
            latest_deficit,
            carry_forward_total_m3: total_m3,
            carry_forward_priority: priority,
            uniformity_coefficient: uniformity,
            mean_delivery_efficiency: mean_efficiency,
        })
    }
}

/// Schedules a new, empty delivery record (spec §3: delivery records are
/// created by the optimizer as `scheduled`). Kept as a free function since
/// it needs no collaborator access, only the chosen path/window from an
/// [`OptimizationResult`]'s sequence.
pub fn schedule_delivery(
    section_id: SectionId,
    gate_id: GateId,
    scheduled_start: DateTime<Utc>,
    scheduled_end: DateTime<Utc>,
    scheduled_volume_m3: f64,
    path: DeliveryPath,
) -> DeliveryRecord {
    DeliveryRecord {
        id: DeliveryId::new_v4(),
        section_id,
        scheduled_start,
        scheduled_end,
        scheduled_volume_m3,
        actual_start: None,
        actual_end: None,
        status: DeliveryStatus::Scheduled,
        gate_outflow_m3: 0.0,
        section_inflow_m3: 0.0,
        transit_loss_m3: 0.0,
        flow_trace: Vec::new(),
        path,
        travel_time_s: 0.0,
        adjusted: false,
        gate_id: Some(gate_id),
    }
}
