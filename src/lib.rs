//! Autonomous monitoring loop: timer-driven detection cycles, a confidence
//! gate that escalates into simulated actions, bounded histories and a
//! running performance ledger.

pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod history;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod observer;
pub mod sentinel;
pub mod source;
pub mod state;
pub mod watchlist;

pub use config::SentinelConfig;
pub use error::{SentinelError, SentinelResult};
pub use sentinel::{DashboardSnapshot, Sentinel, Wiring};
