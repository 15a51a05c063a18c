//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::model::{TripRole, WaterType};

/// Record command arguments.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// The boat to record the trip against
    #[arg(short, long)]
    pub boat: i64,

    /// Kind of water
    #[arg(short, long, value_enum, default_value = "salt")]
    pub water: WaterTypeArg,

    /// Your role aboard
    #[arg(short, long, value_enum, default_value = "skipper")]
    pub role: RoleArg,

    /// Position sampling period in milliseconds (defaults to configuration)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop automatically after this many seconds (otherwise Ctrl-C)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Departure harbour or location name
    #[arg(long)]
    pub departure: Option<String>,

    /// Free-form purpose of the trip
    #[arg(long)]
    pub purpose: Option<String>,

    /// Replay positions from a JSON fix script instead of live hardware
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Hold position at this latitude (with --lon, for dry runs)
    #[arg(long, requires = "lon")]
    pub lat: Option<f64>,

    /// Hold position at this longitude (with --lat, for dry runs)
    #[arg(long, requires = "lat")]
    pub lon: Option<f64>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Trip listing and inspection commands.
#[derive(Debug, Subcommand)]
pub enum TripsCommand {
    /// List recent trips
    List {
        /// Maximum number of trips to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show one trip with derived statistics
    Show {
        /// The trip id
        id: i64,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Boat management commands.
#[derive(Debug, Subcommand)]
pub enum BoatsCommand {
    /// Register a new boat
    Add {
        /// The boat's name
        name: String,
    },

    /// List registered boats
    List,

    /// Enable a boat for trip recording
    Enable {
        /// The boat id
        id: i64,
    },

    /// Disable a boat (rejects new trips)
    Disable {
        /// The boat id
        id: i64,
    },
}

/// Note management commands.
#[derive(Debug, Subcommand)]
pub enum NotesCommand {
    /// Add a note, optionally attached to a trip
    Add {
        /// The note text
        text: String,

        /// Attach to this trip
        #[arg(short, long)]
        trip: Option<i64>,
    },

    /// List notes, newest first
    List {
        /// Maximum number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete a note
    Rm {
        /// The note id
        id: i64,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Water type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WaterTypeArg {
    /// Salt water
    Salt,
    /// Fresh water
    Fresh,
    /// Brackish water
    Brackish,
}

impl From<WaterTypeArg> for WaterType {
    fn from(arg: WaterTypeArg) -> Self {
        match arg {
            WaterTypeArg::Salt => Self::Salt,
            WaterTypeArg::Fresh => Self::Fresh,
            WaterTypeArg::Brackish => Self::Brackish,
        }
    }
}

/// Role argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Responsible for the vessel
    Skipper,
    /// Working crew
    Crew,
    /// Along for the ride
    Passenger,
}

impl From<RoleArg> for TripRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Skipper => Self::Skipper,
            RoleArg::Crew => Self::Crew,
            RoleArg::Passenger => Self::Passenger,
        }
    }
}
