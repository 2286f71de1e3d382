//! Core data model, error taxonomy and configuration shared by every
//! component of the irrigation control core (spec §3, §6, §7).

pub mod accounting;
pub mod config;
pub mod control;
pub mod delivery;
pub mod error;
pub mod hydraulic;
pub mod ids;
pub mod network;

pub use accounting::*;
pub use config::Config;
pub use control::*;
pub use delivery::*;
pub use error::{CoreError, Outcome, Result, Warning};
pub use hydraulic::*;
pub use ids::*;
pub use network::*;

/// Physical constant used throughout the hydraulics and accounting
/// modules.
pub const GRAVITY_MS2: f64 = 9.81;
