//! # OCPP 1.6 charging-station simulator
//!
//! Simulates a fleet of EV charging stations speaking OCPP 1.6-J to a
//! central system. Each station runs as its own cooperative task around a
//! charging-session engine:
//!
//! - **domain**: connector ledger, station identity, templates, reservations
//! - **application**: feature-profile gate, inbound command handlers,
//!   meter-value synthesizer, smart-charging manager
//! - **station**: per-station runtime and session coordinator
//! - **infrastructure**: WebSocket transport, pending calls, state snapshots
//! - **support**: OCPP-J framing, errors, clock, shutdown
//! - **config**: TOML launcher configuration

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod notifications;
pub mod station;
pub mod support;

pub use config::{default_config_path, AppConfig};
pub use notifications::{EventBus, StationEvent};
pub use station::{run_station, ChargingStation, StationRuntime};
