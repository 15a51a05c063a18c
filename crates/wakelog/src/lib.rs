//! `wakelog` - A personal boat-trip logger
//!
//! This library records GPS tracks into a durable SQLite store, derives
//! stop-point and motion statistics from the raw position stream, and
//! keeps a user-facing controller converged with a long-lived background
//! recorder that owns the "is a trip open" fact, surviving crashes
//! without losing or duplicating open trips.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod geo;
pub mod logging;
pub mod model;
pub mod position;
pub mod recorder;
pub mod repair;
pub mod stats;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use controller::{CachedStatus, ControllerSettings, TripController};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Boat, GpsPoint, StopPoint, Trip, TripStatistics};
pub use recorder::{Recorder, RecorderHandle, RecorderLink, RecorderStatus, StartRequest};
pub use storage::{SharedStore, TripStore};
