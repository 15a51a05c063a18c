//! Command-line interface for wakelog.
//!
//! This module provides the CLI structure and command handlers for the
//! `wakelog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    BoatsCommand, ConfigCommand, NotesCommand, RecordCommand, RoleArg, StatusCommand,
    TripsCommand, WaterTypeArg,
};

/// wakelog - Log your boat trips
///
/// A personal boat-trip logger that records GPS tracks into a durable
/// local store and derives trip statistics, surviving crashes without
/// losing or duplicating open trips.
#[derive(Debug, Parser)]
#[command(name = "wakelog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record a trip in the foreground
    Record(RecordCommand),

    /// Show recorder and trip status
    Status(StatusCommand),

    /// Close orphaned trips left behind by a crash
    Cleanup,

    /// List and inspect trips
    #[command(subcommand)]
    Trips(TripsCommand),

    /// Manage boats
    #[command(subcommand)]
    Boats(BoatsCommand),

    /// Manage notes
    #[command(subcommand)]
    Notes(NotesCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
