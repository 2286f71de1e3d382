//! Lock-free and wait-free queueing primitives shared by the service and
//! adapters layers of the irrigation control core. The per-gate SCADA
//! dispatch queue (spec §5) has its own priority/eviction policy and is
//! implemented directly on `priority_queue` + `parking_lot::Mutex` in
//! `irrigation_adapters::dispatch` rather than on these primitives, which
//! are plain FIFOs with no priority ordering.
//!
//! - `spsc`: wait-free single-producer single-consumer queue. Used by
//!   `irrigation_service::health_feed` to forward probe outcomes from the
//!   one dedicated health-probe loop to the one task that folds them into
//!   the service's cached health snapshot.
//! - `mpmc`: lock-free bounded multi-producer multi-consumer queue. Used by
//!   `irrigation_service::anomaly` to fan a sensor-anomaly poll loop out to
//!   however many independent subscribers (CLI watchers, internal checks)
//!   are draining it concurrently.

pub mod mpmc;
pub mod spsc;
