//! `SQLite` schema definitions for wakelog.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the trips table.
pub const CREATE_TRIPS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS trips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    boat_id INTEGER NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    water_type TEXT NOT NULL,
    role TEXT NOT NULL,
    update_interval_ms INTEGER NOT NULL,
    departure TEXT,
    purpose TEXT,
    manual_data TEXT,
    last_modified TEXT NOT NULL
)
";

/// SQL statement to create the GPS points table.
pub const CREATE_POINTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS gps_points (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trip_id INTEGER NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    altitude REAL,
    accuracy REAL,
    speed REAL,
    heading REAL,
    timestamp TEXT NOT NULL
)
";

/// SQL statement to create the boats table.
pub const CREATE_BOATS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS boats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1
)
";

/// SQL statement to create the notes table.
pub const CREATE_NOTES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trip_id INTEGER,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create an index on open trips for orphan queries.
pub const CREATE_OPEN_TRIPS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_trips_end_time ON trips(end_time)
";

/// SQL statement to create an index for ordered point reads per trip.
pub const CREATE_POINTS_TRIP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_points_trip_timestamp ON gps_points(trip_id, timestamp)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_TRIPS_TABLE,
    CREATE_POINTS_TABLE,
    CREATE_BOATS_TABLE,
    CREATE_NOTES_TABLE,
    CREATE_OPEN_TRIPS_INDEX,
    CREATE_POINTS_TRIP_INDEX,
    CREATE_METADATA_TABLE,
];
