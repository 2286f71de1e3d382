use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use irrigation_adapters::{
    CollaboratorError, FieldOpsAdapter, FlowReading, GateStatus, GisProvider, LevelReading, NetworkTopology,
    PathElevationSample, ScadaAdapter, SensorStore, SetPositionAck, WeatherProvider, WeatherSnapshot, WorkOrderAck,
    WorkOrderPayload,
};
use irrigation_core::{
    Actuator, AutomatedControl, Calibration, CalibrationMethod, CanalKind, CanalSection, Config, ControlKind,
    ControlMode, EquipmentStatus, Gate, GateControl, GateId, Node, NodeKind, SectionId, TrapezoidalCrossSection,
    ZoneDemandRequest, ZoneId,
};
use irrigation_hydraulics::Network;
use irrigation_optimizer::{Objective, OptimizeOptions};
use irrigation_registry::GateRegistry;
use irrigation_service::{Collaborators, DeliveryEnvironment, EmergencyScope, InMemoryMetadataStore, ServiceState, TopologyRegistry};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "irrigation-cli")]
#[command(about = "Operator CLI over the gravity-delivery irrigation control core", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gravity delivery optimizer for one zone demand
    OptimizeDelivery {
        #[arg(long, default_value = "zoneA")]
        zone_id: String,
        #[arg(long, default_value_t = 5000.0)]
        volume_m3: f64,
        #[arg(long, default_value_t = 1.5)]
        flow_m3s: f64,
        #[arg(long, default_value_t = 1)]
        priority: u32,
        #[arg(long, value_enum, default_value = "balanced")]
        objective: ObjectiveArg,
    },

    /// Finalize a delivery from a flow trace
    CompleteDelivery {
        #[arg(long)]
        delivery_id: Uuid,
        #[arg(long, default_value_t = 25.0)]
        temperature_c: f64,
        #[arg(long, default_value_t = 40.0)]
        relative_humidity_pct: f64,
        #[arg(long, default_value_t = 2.0)]
        wind_speed_ms: f64,
        #[arg(long, default_value_t = 500.0)]
        solar_radiation_w_m2: f64,
    },

    /// Close the weekly water balance
    ReconcileWeek {
        #[arg(long)]
        week: u32,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        force: bool,
    },

    /// Send one gate to a target opening
    ControlGate {
        #[arg(long)]
        gate_id: String,
        #[arg(long)]
        opening_ratio: f64,
        #[arg(long, default_value_t = 120.0)]
        transition_s: f64,
        #[arg(long, default_value_t = 5)]
        priority: u8,
        #[arg(long, default_value = "operator request")]
        reason: String,
    },

    /// Stop one gate, one zone, or every gate immediately
    EmergencyStop {
        #[arg(long)]
        gate_id: Option<String>,
        #[arg(long)]
        zone_id: Option<String>,
        #[arg(long)]
        all: bool,
        #[arg(long, default_value = "emergency stop")]
        reason: String,
        #[arg(long, default_value = "operator")]
        operator: String,
    },

    /// Report recent deliveries, deficit and efficiency for one section
    SectionAccounting {
        #[arg(long)]
        section_id: String,
    },
}

#[derive(Clone, ValueEnum)]
enum ObjectiveArg {
    MinimizeTravelTime,
    MaximizeEfficiency,
    MinimizeEnergyLoss,
    Balanced,
}

impl From<ObjectiveArg> for Objective {
    fn from(arg: ObjectiveArg) -> Self {
        match arg {
            ObjectiveArg::MinimizeTravelTime => Objective::MinimizeTravelTime,
            ObjectiveArg::MaximizeEfficiency => Objective::MaximizeEfficiency,
            ObjectiveArg::MinimizeEnergyLoss => Objective::MinimizeEnergyLoss,
            ObjectiveArg::Balanced => Objective::Balanced,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let service = build_demo_service();

    let value = match cli.command {
        Commands::OptimizeDelivery { zone_id, volume_m3, flow_m3s, priority, objective } => {
            let demands = vec![ZoneDemandRequest {
                zone_id: ZoneId::from(zone_id.as_str()),
                required_volume_m3: volume_m3,
                required_flow_m3s: flow_m3s,
                priority,
                time_window: None,
                min_pressure_head_m: None,
            }];
            let result = service
                .optimize_delivery(demands, source_node(), None, objective.into(), OptimizeOptions::default())
                .await
                .context("optimize_delivery failed")?;
            serde_json::to_value(result)?
        }

        Commands::CompleteDelivery { delivery_id, temperature_c, relative_humidity_pct, wind_speed_ms, solar_radiation_w_m2 } => {
            let environment = DeliveryEnvironment { temperature_c, relative_humidity_pct, wind_speed_ms, solar_radiation_w_m2 };
            let now = Utc::now();
            let result = service
                .complete_delivery(delivery_id, now - chrono::Duration::hours(2), now, Vec::new(), environment)
                .await
                .context("complete_delivery failed")?;
            serde_json::to_value(result)?
        }

        Commands::ReconcileWeek { week, year, force } => {
            let log = service.reconcile_week(week, year, force).await.context("reconcile_week failed")?;
            serde_json::to_value(log)?
        }

        Commands::ControlGate { gate_id, opening_ratio, transition_s, priority, reason } => {
            let result = service
                .control_gate(GateId::from(gate_id.as_str()), opening_ratio, transition_s, priority, reason)
                .await
                .context("control_gate failed")?;
            serde_json::to_value(result)?
        }

        Commands::EmergencyStop { gate_id, zone_id, all, reason, operator } => {
            let scope = if all {
                EmergencyScope::All
            } else if let Some(zone_id) = zone_id {
                EmergencyScope::Zone(ZoneId::from(zone_id.as_str()))
            } else if let Some(gate_id) = gate_id {
                EmergencyScope::Single(GateId::from(gate_id.as_str()))
            } else {
                anyhow::bail!("one of --gate-id, --zone-id or --all is required");
            };
            let result = service.emergency_stop(scope, reason, operator).await.context("emergency_stop failed")?;
            serde_json::to_value(result)?
        }

        Commands::SectionAccounting { section_id } => {
            let result = service
                .get_section_accounting(SectionId::from(section_id.as_str()))
                .await
                .context("get_section_accounting failed")?;
            serde_json::to_value(result)?
        }
    };

    print_output(&cli.output, &value)?;
    Ok(())
}

fn source_node() -> irrigation_core::NodeId {
    irrigation_core::NodeId::from("reservoir")
}

/// Builds a small, self-contained network (one reservoir, one delivery
/// zone, one automated gate) with stub collaborators so every subcommand
/// runs standalone without a real SCADA/field-ops/sensor deployment — this
/// CLI is a manual-invocation and smoke-testing surface, not a production
/// asset-catalog loader.
fn build_demo_service() -> ServiceState {
    let mut network = Network::default();
    let source = source_node();
    network.nodes.insert(
        source.clone(),
        Node {
            id: source.clone(),
            kind: NodeKind::Reservoir,
            ground_elevation_m: 221.0,
            surface_area_m2: 1e9,
            demand_m3s: 0.0,
            min_depth_m: 0.0,
            max_depth_m: 100.0,
        },
    );
    let zone_node: irrigation_core::NodeId = "zoneA".into();
    network.nodes.insert(
        zone_node.clone(),
        Node {
            id: zone_node.clone(),
            kind: NodeKind::Delivery,
            ground_elevation_m: 218.0,
            surface_area_m2: 2000.0,
            demand_m3s: 1.5,
            min_depth_m: 0.3,
            max_depth_m: 4.0,
        },
    );
    let section_id: SectionId = "sec1".into();
    network.sections.insert(
        section_id.clone(),
        CanalSection {
            id: section_id.clone(),
            channel_id: "ch1".into(),
            upstream_node: source.clone(),
            downstream_node: zone_node.clone(),
            cross_section: TrapezoidalCrossSection { bottom_width_m: 3.0, side_slope: 1.5 },
            length_m: 2000.0,
            manning_n: 0.025,
            bed_slope: 0.0008,
            kind: CanalKind::Earthen,
        },
    );
    let gate_id: GateId = "gateA".into();
    let gate = Gate {
        id: gate_id.clone(),
        width_m: 2.0,
        max_height_m: 1.2,
        sill_elevation_m: 219.5,
        drop: None,
        calibration: Calibration { k1: 0.61, k2: 0.0, confidence: 0.9, method: CalibrationMethod::Direct },
        upstream_node: source.clone(),
        downstream_node: zone_node.clone(),
        max_flow_m3s: 5.0,
    };
    network.gates.insert(gate.id.clone(), gate.clone());

    let registry = Arc::new(GateRegistry::default());
    registry.register(
        gate,
        GateControl {
            kind: ControlKind::Automated(AutomatedControl {
                scada_tag: "GATEA".into(),
                actuator: Actuator::Electric,
                position_sensor: true,
                comm_protocol: "modbus".into(),
                comm_address: "10.0.0.1:502".into(),
                response_time_budget_s: 120.0,
                max_slew_rate_per_s: 0.1,
                equipment_status: EquipmentStatus::Operational,
                fallback_mode: ControlMode::Manual,
                last_comm: None,
                consecutive_failures: 0,
            }),
            control_mode: ControlMode::Auto,
            opening_ratio: 0.4,
        },
    );

    let topology = TopologyRegistry::new();
    topology.register_zone("zoneA".into(), zone_node, gate_id, section_id);

    let config = Config::default();
    let collaborators = Collaborators::new(
        Arc::new(DemoScada),
        Arc::new(DemoFieldOps),
        Arc::new(DemoSensors),
        Arc::new(DemoGis),
        Arc::new(DemoWeather),
    );

    ServiceState::new(
        network,
        registry,
        config,
        topology,
        Arc::new(InMemoryMetadataStore::default()),
        collaborators,
        irrigation_adapters::DispatchQueue::new(16),
        irrigation_adapters::StatePreservation::new(
            Arc::new(irrigation_adapters::FileSnapshotStore::new(std::env::temp_dir().join("irrigation-cli-snapshots"))),
            64,
        ),
        Arc::new(irrigation_adapters::HealthMonitor::new()),
    )
}

struct DemoScada;

#[async_trait]
impl ScadaAdapter for DemoScada {
    async fn set_position(&self, _gate_id: &GateId, _target_m: f64, transition_s: f64, _priority: u8) -> Result<SetPositionAck, CollaboratorError> {
        Ok(SetPositionAck { accepted: true, expected_completion: Utc::now() + chrono::Duration::seconds(transition_s.max(0.0) as i64) })
    }

    async fn get_gate_status(&self, gate_id: &GateId) -> Result<GateStatus, CollaboratorError> {
        Ok(GateStatus {
            gate_id: gate_id.clone(),
            opening_m: 0.4,
            control_mode: ControlMode::Auto,
            upstream_level_m: 221.0,
            downstream_level_m: 218.4,
            flow_m3s: 1.5,
            timestamp: Utc::now(),
        })
    }

    async fn batch_get_status(&self, gate_ids: &[GateId]) -> Result<Vec<GateStatus>, CollaboratorError> {
        let mut statuses = Vec::with_capacity(gate_ids.len());
        for gate_id in gate_ids {
            statuses.push(self.get_gate_status(gate_id).await?);
        }
        Ok(statuses)
    }

    async fn emergency_stop(&self, gate_id: &GateId) -> Result<SetPositionAck, CollaboratorError> {
        let _ = gate_id;
        Ok(SetPositionAck { accepted: true, expected_completion: Utc::now() })
    }

    async fn health_probe(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn opc_ua_server_state(&self) -> Result<String, CollaboratorError> {
        Ok("running".to_string())
    }
}

struct DemoFieldOps;

#[async_trait]
impl FieldOpsAdapter for DemoFieldOps {
    async fn create_work_order(&self, payload: WorkOrderPayload) -> Result<WorkOrderAck, CollaboratorError> {
        Ok(WorkOrderAck { id: Uuid::new_v4().to_string(), assigned_team: payload.team_zone, qr_url: None })
    }
}

struct DemoSensors;

#[async_trait]
impl SensorStore for DemoSensors {
    async fn flow_readings(&self, _gate_id: &GateId, _from: chrono::DateTime<Utc>, _to: chrono::DateTime<Utc>) -> Result<Vec<FlowReading>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn level_readings(&self, _node_id: &irrigation_core::NodeId, _from: chrono::DateTime<Utc>, _to: chrono::DateTime<Utc>) -> Result<Vec<LevelReading>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn gate_position(&self, _gate_id: &GateId) -> Result<Option<f64>, CollaboratorError> {
        Ok(Some(0.4))
    }

    async fn anomaly_stream(&self, _since: chrono::DateTime<Utc>) -> Result<Vec<irrigation_adapters::AnomalyEvent>, CollaboratorError> {
        Ok(Vec::new())
    }
}

struct DemoGis;

#[async_trait]
impl GisProvider for DemoGis {
    async fn network_topology(&self) -> Result<NetworkTopology, CollaboratorError> {
        Ok(NetworkTopology {
            node_ids: vec![source_node(), "zoneA".into()],
            gate_ids: vec!["gateA".into()],
            zone_ids: vec!["zoneA".into()],
        })
    }

    async fn elevation_along_path(&self, _source: &irrigation_core::NodeId, _destination: &irrigation_core::NodeId, _sample_interval_m: f64) -> Result<Vec<PathElevationSample>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn path_find(&self, source: &irrigation_core::NodeId, _zone: &ZoneId) -> Result<Vec<irrigation_core::NodeId>, CollaboratorError> {
        Ok(vec![source.clone(), "zoneA".into()])
    }
}

struct DemoWeather;

#[async_trait]
impl WeatherProvider for DemoWeather {
    async fn current(&self, _zone_id: &ZoneId) -> Result<WeatherSnapshot, CollaboratorError> {
        Ok(WeatherSnapshot { temperature_c: 25.0, relative_humidity_pct: 40.0, wind_speed_ms: 2.0, solar_radiation_w_m2: 500.0, timestamp: Utc::now() })
    }

    async fn windowed(&self, zone_id: &ZoneId, _from: chrono::DateTime<Utc>, _to: chrono::DateTime<Utc>) -> Result<Vec<WeatherSnapshot>, CollaboratorError> {
        Ok(vec![self.current(zone_id).await?])
    }

    async fn reference_et_mm(&self, _zone_id: &ZoneId, _day: chrono::DateTime<Utc>) -> Result<f64, CollaboratorError> {
        Ok(5.0)
    }
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Pretty => print_pretty(value, 0)?,
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{indent}{key_colored}:");
                        print_pretty(val, depth + 1)?;
                    }
                    serde_json::Value::String(s) => println!("{indent}{key_colored}: {}", s.green()),
                    serde_json::Value::Number(n) => println!("{indent}{key_colored}: {}", n.to_string().yellow()),
                    serde_json::Value::Bool(b) => {
                        let colored = if *b { "true".green() } else { "false".red() };
                        println!("{indent}{key_colored}: {colored}");
                    }
                    _ => println!("{indent}{key_colored}: {val}"),
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                println!("{indent}{} {}:", "-".cyan(), i.to_string().yellow());
                print_pretty(item, depth + 1)?;
            }
        }
        _ => println!("{indent}{value}"),
    }
    Ok(())
}
