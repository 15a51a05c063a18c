//! `wakelog` - CLI for the boat-trip logger
//!
//! This binary wires the recorder, controller, and store together for
//! foreground recording, and exposes one-shot commands for status,
//! cleanup, trips, boats, notes, and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::warn;

use wakelog::cli::{
    BoatsCommand, Cli, Command, ConfigCommand, NotesCommand, RecordCommand, TripsCommand,
};
use wakelog::controller::{ControllerSettings, TripController};
use wakelog::geo::meters_to_nautical_miles;
use wakelog::model::{Boat, TripContext, TripNote};
use wakelog::position::{PositionSource, ReplaySource};
use wakelog::recorder::{NoRecorder, Recorder, StartRequest};
use wakelog::storage::SharedStore;
use wakelog::sync::NullSync;
use wakelog::{init_logging, Config, Error, TripStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Record(cmd) => handle_record(&config, cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json).await,
        Command::Cleanup => handle_cleanup(&config).await,
        Command::Trips(cmd) => handle_trips(&config, cmd).await,
        Command::Boats(cmd) => handle_boats(&config, &cmd).await,
        Command::Notes(cmd) => handle_notes(&config, cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<SharedStore> {
    Ok(TripStore::open(config.database_path())?.into_shared())
}

/// Controller for one-shot commands, with no recorder behind it.
fn detached_controller(config: &Config, store: SharedStore) -> TripController {
    TripController::new(
        Arc::new(NoRecorder),
        store,
        Arc::new(NullSync),
        ControllerSettings::from_config(config),
    )
}

fn build_source(cmd: &RecordCommand) -> Result<Box<dyn PositionSource>, Error> {
    if let Some(path) = &cmd.replay {
        return Ok(Box::new(ReplaySource::from_json_file(path)?));
    }
    if let (Some(lat), Some(lon)) = (cmd.lat, cmd.lon) {
        return Ok(Box::new(ReplaySource::stationary(lat, lon)));
    }
    Err(Error::position_unavailable(
        "no position source configured; pass --replay FILE or --lat/--lon",
    ))
}

async fn handle_record(config: &Config, cmd: RecordCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let source = build_source(&cmd)?;
    let handle = Recorder::spawn(store.clone(), source);
    let controller = TripController::new(
        Arc::new(handle),
        store.clone(),
        Arc::new(NullSync),
        ControllerSettings::from_config(config),
    );
    controller.attach().await?;

    let request = StartRequest {
        boat_id: cmd.boat,
        water_type: cmd.water.into(),
        role: cmd.role.into(),
        update_interval_ms: cmd.interval_ms.unwrap_or(config.tracking.update_interval_ms),
        context: TripContext {
            departure: cmd.departure,
            purpose: cmd.purpose,
        },
    };
    let trip_id = controller.start_trip(request).await?;

    match cmd.duration {
        Some(secs) => {
            println!("Recording trip {trip_id} for {secs} s...");
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
        None => {
            println!("Recording trip {trip_id} (Ctrl-C to stop)...");
            tokio::signal::ctrl_c().await?;
            println!();
        }
    }

    controller.stop_trip().await?;

    let (trip, points) = {
        let guard = store.lock().await;
        (guard.get_trip(trip_id)?, guard.points_for_trip(trip_id)?)
    };
    match trip {
        Some(trip) => {
            let stats = wakelog::stats::calculate_with(
                &trip,
                &points,
                chrono::Utc::now(),
                config.tracking.stop_radius_meters,
                config.tracking.stop_min_dwell_seconds,
            );
            println!(
                "Trip {trip_id} stopped: {} points, {:.2} nm, avg {:.1} kn, {} stop(s)",
                points.len(),
                meters_to_nautical_miles(stats.distance_meters),
                stats.average_speed_knots,
                stats.stop_points.len()
            );
        }
        None => warn!("trip {} vanished before the summary", trip_id),
    }
    Ok(())
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let controller = detached_controller(config, store.clone());
    let snapshot = controller.attach().await?;
    let open = store.lock().await.active_trips()?;

    if json {
        let status = serde_json::json!({
            "is_tracking": snapshot.is_tracking,
            "trip_id": snapshot.trip_id,
            "open_trips": open.len(),
            "database_path": config.database_path(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("wakelog status");
        println!("--------------");
        match snapshot.trip_id {
            Some(trip_id) => println!("Recording:  trip {trip_id}"),
            None => println!("Recording:  no"),
        }
        println!("Open trips: {}", open.len());
        println!("Database:   {}", config.database_path().display());
    }
    Ok(())
}

async fn handle_cleanup(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let controller = detached_controller(config, store);
    let report = controller.force_cleanup().await?;

    if report.closed.is_empty() {
        println!("Nothing to repair ({} open trip(s) examined).", report.examined);
    } else {
        for trip_id in &report.closed {
            println!("Closed orphaned trip {trip_id}.");
        }
    }
    Ok(())
}

async fn handle_trips(config: &Config, cmd: TripsCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    match cmd {
        TripsCommand::List { limit } => {
            let trips = store.lock().await.recent_trips(limit)?;
            if trips.is_empty() {
                println!("No trips recorded yet.");
                return Ok(());
            }
            for trip in trips {
                let id = trip.id.unwrap_or(-1);
                let end = trip
                    .end_time
                    .map_or_else(|| "open".to_string(), |t| t.to_rfc3339());
                println!(
                    "{id:>5}  boat {:<3}  {}  {} -> {end}",
                    trip.boat_id,
                    trip.water_type,
                    trip.start_time.to_rfc3339()
                );
            }
        }
        TripsCommand::Show { id, json } => {
            let (trip, points) = {
                let guard = store.lock().await;
                (guard.get_trip(id)?, guard.points_for_trip(id)?)
            };
            let trip = trip.ok_or(Error::TripNotFound { trip_id: id })?;
            let stats = wakelog::stats::calculate_with(
                &trip,
                &points,
                chrono::Utc::now(),
                config.tracking.stop_radius_meters,
                config.tracking.stop_min_dwell_seconds,
            );

            if json {
                let report = serde_json::json!({
                    "trip": trip,
                    "point_count": points.len(),
                    "statistics": stats,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Trip {id}");
                println!("  Boat:       {}", trip.boat_id);
                println!("  Water:      {}", trip.water_type);
                println!("  Role:       {}", trip.role);
                println!("  Start:      {}", trip.start_time.to_rfc3339());
                match trip.end_time {
                    Some(end) => println!("  End:        {}", end.to_rfc3339()),
                    None => println!("  End:        still open"),
                }
                if let Some(departure) = &trip.context.departure {
                    println!("  Departure:  {departure}");
                }
                if let Some(purpose) = &trip.context.purpose {
                    println!("  Purpose:    {purpose}");
                }
                println!("  Points:     {}", points.len());
                println!("  Distance:   {:.2} nm", meters_to_nautical_miles(stats.distance_meters));
                println!("  Duration:   {} s", stats.duration_seconds);
                println!("  Avg speed:  {:.1} kn", stats.average_speed_knots);
                println!("  Max speed:  {:.1} kn", stats.max_speed_knots);
                println!("  Stops:      {}", stats.stop_points.len());
                for stop in &stats.stop_points {
                    println!(
                        "    {:.5}, {:.5}  {} s from {}",
                        stop.latitude,
                        stop.longitude,
                        stop.duration_seconds,
                        stop.start_time.to_rfc3339()
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_boats(config: &Config, cmd: &BoatsCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let guard = store.lock().await;
    match cmd {
        BoatsCommand::Add { name } => {
            let id = guard.insert_boat(&Boat::new(name.clone()))?;
            println!("Added boat {id}: {name}");
        }
        BoatsCommand::List => {
            let boats = guard.list_boats()?;
            if boats.is_empty() {
                println!("No boats registered. Add one with `wakelog boats add <name>`.");
            }
            for boat in boats {
                let state = if boat.enabled { "enabled" } else { "disabled" };
                println!("{:>5}  {:<20} {state}", boat.id.unwrap_or(-1), boat.name);
            }
        }
        BoatsCommand::Enable { id } => {
            if guard.set_boat_enabled(*id, true)? {
                println!("Boat {id} enabled.");
            } else {
                return Err(Error::BoatNotFound { boat_id: *id }.into());
            }
        }
        BoatsCommand::Disable { id } => {
            if guard.set_boat_enabled(*id, false)? {
                println!("Boat {id} disabled.");
            } else {
                return Err(Error::BoatNotFound { boat_id: *id }.into());
            }
        }
    }
    Ok(())
}

async fn handle_notes(config: &Config, cmd: NotesCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let guard = store.lock().await;
    match cmd {
        NotesCommand::Add { text, trip } => {
            if let Some(trip_id) = trip {
                if guard.get_trip(trip_id)?.is_none() {
                    return Err(Error::TripNotFound { trip_id }.into());
                }
            }
            let id = guard.add_note(&TripNote::new(text, trip))?;
            println!("Added note {id}.");
        }
        NotesCommand::List { limit } => {
            let notes = guard.list_notes(limit)?;
            if notes.is_empty() {
                println!("No notes.");
            }
            for note in notes {
                let scope = note
                    .trip_id
                    .map_or_else(|| "general".to_string(), |id| format!("trip {id}"));
                println!(
                    "{:>5}  [{scope}] {}  ({})",
                    note.id.unwrap_or(-1),
                    note.text,
                    note.created_at.to_rfc3339()
                );
            }
        }
        NotesCommand::Rm { id } => {
            if guard.delete_note(id)? {
                println!("Deleted note {id}.");
            } else {
                println!("No note with id {id}.");
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[storage]");
                println!("  Database path:    {}", config.database_path().display());
                println!();
                println!("[tracking]");
                println!("  Update interval:  {} ms", config.tracking.update_interval_ms);
                println!("  Stop radius:      {} m", config.tracking.stop_radius_meters);
                println!("  Stop dwell:       {} s", config.tracking.stop_min_dwell_seconds);
                println!();
                println!("[controller]");
                println!(
                    "  Convergence:      {:?} ms",
                    config.controller.convergence_delays_ms
                );
                println!("  Stop wait:        {} ms", config.controller.stop_wait_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
