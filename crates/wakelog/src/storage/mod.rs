//! Storage layer for wakelog.
//!
//! This module provides `SQLite`-based persistent storage for trips, GPS
//! points, boats, and notes. The trip table is the authoritative recovery
//! source across crashes: a trip row with a NULL `end_time` is an open
//! trip, whoever owns it.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Boat, GpsPoint, ManualTripData, Trip, TripContext, TripNote, TripRole, WaterType};

/// Storage engine for trips and related records.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Trip lifecycle (insert open, close once, query open rows)
/// - Append-only GPS point tracks
/// - Boat and note CRUD
#[derive(Debug)]
pub struct TripStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

/// A store handle shareable between the recorder task and the controller.
///
/// Point appends and repair updates are serialized through this lock; the
/// recorder is the only writer of points while a trip is open.
pub type SharedStore = Arc<tokio::sync::Mutex<TripStore>>;

impl TripStore {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wrap this store in the shared handle used across tasks.
    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    // === Trips ===

    /// Insert a trip and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_trip(&self, trip: &Trip) -> Result<i64> {
        let manual_data = trip
            .manual_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            r"
            INSERT INTO trips (
                boat_id, start_time, end_time, water_type, role,
                update_interval_ms, departure, purpose, manual_data, last_modified
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                trip.boat_id,
                trip.start_time.to_rfc3339(),
                trip.end_time.map(|t| t.to_rfc3339()),
                trip.water_type.to_string(),
                trip.role.to_string(),
                i64::try_from(trip.update_interval_ms).unwrap_or(i64::MAX),
                trip.context.departure,
                trip.context.purpose,
                manual_data,
                trip.last_modified.to_rfc3339(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted trip {} for boat {}", id, trip.boat_id);
        Ok(id)
    }

    /// Get a trip by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_trip(&self, id: i64) -> Result<Option<Trip>> {
        let result = self
            .conn
            .query_row(
                &format!("{TRIP_SELECT} WHERE id = ?1"),
                [id],
                Self::row_to_trip,
            )
            .optional()?;
        Ok(result)
    }

    /// Get all open trips (`end_time IS NULL`), oldest first.
    ///
    /// After orphan repair has run, at most one row is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn active_trips(&self) -> Result<Vec<Trip>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TRIP_SELECT} WHERE end_time IS NULL ORDER BY start_time ASC"))?;

        let trips = stmt
            .query_map([], Self::row_to_trip)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(trips)
    }

    /// Get the most recent trips, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_trips(&self, limit: usize) -> Result<Vec<Trip>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TRIP_SELECT} ORDER BY start_time DESC LIMIT ?1"))?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let trips = stmt
            .query_map([limit_i64], Self::row_to_trip)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(trips)
    }

    /// Close a trip, setting its end time and bumping `last_modified`.
    ///
    /// Only affects the row if it is still open, so repeated or concurrent
    /// closes are no-ops. Returns `true` if the row was closed by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn close_trip(&self, id: i64, end_time: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn.execute(
            r"
            UPDATE trips SET end_time = ?1, last_modified = ?1
            WHERE id = ?2 AND end_time IS NULL
            ",
            params![end_time.to_rfc3339(), id],
        )?;

        if affected > 0 {
            debug!("Closed trip {}", id);
        }
        Ok(affected > 0)
    }

    /// Replace a trip's manual data and bump `last_modified`.
    ///
    /// Returns `true` if the trip exists.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database operation fails.
    pub fn set_manual_data(&self, id: i64, data: &ManualTripData) -> Result<bool> {
        let json = serde_json::to_string(data)?;
        let affected = self.conn.execute(
            "UPDATE trips SET manual_data = ?1, last_modified = ?2 WHERE id = ?3",
            params![json, Utc::now().to_rfc3339(), id],
        )?;
        Ok(affected > 0)
    }

    // === GPS points ===

    /// Append a point to a trip's track. Returns the point's rowid.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn append_point(&self, point: &GpsPoint) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT INTO gps_points (
                trip_id, latitude, longitude, altitude, accuracy, speed, heading, timestamp
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                point.trip_id,
                point.latitude,
                point.longitude,
                point.altitude,
                point.accuracy,
                point.speed,
                point.heading,
                point.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a trip's points in timestamp order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn points_for_trip(&self, trip_id: i64) -> Result<Vec<GpsPoint>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT trip_id, latitude, longitude, altitude, accuracy, speed, heading, timestamp
            FROM gps_points WHERE trip_id = ?1
            ORDER BY timestamp ASC, id ASC
            ",
        )?;

        let points = stmt
            .query_map([trip_id], Self::row_to_point)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(points)
    }

    /// Count the points recorded for a trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn point_count(&self, trip_id: i64) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM gps_points WHERE trip_id = ?1",
            [trip_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // === Boats ===

    /// Insert a boat and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_boat(&self, boat: &Boat) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO boats (name, enabled) VALUES (?1, ?2)",
            params![boat.name, boat.enabled],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a boat by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_boat(&self, id: i64) -> Result<Option<Boat>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, name, enabled FROM boats WHERE id = ?1",
                [id],
                Self::row_to_boat,
            )
            .optional()?;
        Ok(result)
    }

    /// List all boats.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_boats(&self) -> Result<Vec<Boat>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, enabled FROM boats ORDER BY id ASC")?;

        let boats = stmt
            .query_map([], Self::row_to_boat)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(boats)
    }

    /// Enable or disable a boat. Returns `true` if the boat exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_boat_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE boats SET enabled = ?1 WHERE id = ?2",
            params![enabled, id],
        )?;
        Ok(affected > 0)
    }

    // === Notes ===

    /// Insert a note and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn add_note(&self, note: &TripNote) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO notes (trip_id, text, created_at) VALUES (?1, ?2, ?3)",
            params![note.trip_id, note.text, note.created_at.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List the most recent notes, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_notes(&self, limit: usize) -> Result<Vec<TripNote>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, trip_id, text, created_at
            FROM notes ORDER BY created_at DESC, id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let notes = stmt
            .query_map([limit_i64], Self::row_to_note)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Delete a note by id. Returns `true` if a note was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_note(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    // === Row mappers ===

    fn row_to_trip(row: &rusqlite::Row) -> rusqlite::Result<Trip> {
        let id: i64 = row.get(0)?;
        let boat_id: i64 = row.get(1)?;
        let start_time: String = row.get(2)?;
        let end_time: Option<String> = row.get(3)?;
        let water_type: String = row.get(4)?;
        let role: String = row.get(5)?;
        let update_interval_ms: i64 = row.get(6)?;
        let departure: Option<String> = row.get(7)?;
        let purpose: Option<String> = row.get(8)?;
        let manual_data: Option<String> = row.get(9)?;
        let last_modified: String = row.get(10)?;

        let water_type = WaterType::parse(&water_type).unwrap_or_else(|| {
            warn!("Unknown water type: {}, defaulting to salt", water_type);
            WaterType::Salt
        });
        let role = TripRole::parse(&role).unwrap_or_else(|| {
            warn!("Unknown trip role: {}, defaulting to skipper", role);
            TripRole::Skipper
        });
        let manual_data = manual_data.and_then(|json| {
            serde_json::from_str(&json)
                .map_err(|e| warn!("Discarding unreadable manual data: {}", e))
                .ok()
        });

        Ok(Trip {
            id: Some(id),
            boat_id,
            start_time: parse_timestamp(&start_time),
            end_time: end_time.as_deref().map(parse_timestamp),
            water_type,
            role,
            update_interval_ms: u64::try_from(update_interval_ms).unwrap_or_default(),
            context: TripContext { departure, purpose },
            manual_data,
            last_modified: parse_timestamp(&last_modified),
        })
    }

    fn row_to_point(row: &rusqlite::Row) -> rusqlite::Result<GpsPoint> {
        let timestamp: String = row.get(7)?;
        Ok(GpsPoint {
            trip_id: row.get(0)?,
            latitude: row.get(1)?,
            longitude: row.get(2)?,
            altitude: row.get(3)?,
            accuracy: row.get(4)?,
            speed: row.get(5)?,
            heading: row.get(6)?,
            timestamp: parse_timestamp(&timestamp),
        })
    }

    fn row_to_boat(row: &rusqlite::Row) -> rusqlite::Result<Boat> {
        Ok(Boat {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            enabled: row.get(2)?,
        })
    }

    fn row_to_note(row: &rusqlite::Row) -> rusqlite::Result<TripNote> {
        let created_at: String = row.get(3)?;
        Ok(TripNote {
            id: Some(row.get(0)?),
            trip_id: row.get(1)?,
            text: row.get(2)?,
            created_at: parse_timestamp(&created_at),
        })
    }
}

/// Shared SELECT column list for trip queries.
const TRIP_SELECT: &str = r"
    SELECT id, boat_id, start_time, end_time, water_type, role,
           update_interval_ms, departure, purpose, manual_data, last_modified
    FROM trips
";

/// Parse an RFC 3339 timestamp, falling back to now on corruption.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_store() -> TripStore {
        TripStore::open_in_memory().expect("failed to create test store")
    }

    fn create_test_trip(boat_id: i64) -> Trip {
        Trip::new(
            boat_id,
            WaterType::Salt,
            TripRole::Skipper,
            1000,
            TripContext::default(),
        )
    }

    fn point_at(trip_id: i64, lat: f64, lon: f64, timestamp: DateTime<Utc>) -> GpsPoint {
        GpsPoint {
            trip_id,
            latitude: lat,
            longitude: lon,
            altitude: None,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp,
        }
    }

    #[test]
    fn test_open_in_memory() {
        let store = TripStore::open_in_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_insert_and_get_trip() {
        let store = create_test_store();
        let trip = create_test_trip(1);

        let id = store.insert_trip(&trip).unwrap();
        let retrieved = store.get_trip(id).unwrap().unwrap();

        assert_eq!(retrieved.id, Some(id));
        assert_eq!(retrieved.boat_id, 1);
        assert_eq!(retrieved.water_type, WaterType::Salt);
        assert_eq!(retrieved.role, TripRole::Skipper);
        assert!(retrieved.is_open());
    }

    #[test]
    fn test_get_nonexistent_trip() {
        let store = create_test_store();
        assert!(store.get_trip(99999).unwrap().is_none());
    }

    #[test]
    fn test_active_trips() {
        let store = create_test_store();

        let open_id = store.insert_trip(&create_test_trip(1)).unwrap();
        let closed_id = store.insert_trip(&create_test_trip(1)).unwrap();
        store.close_trip(closed_id, Utc::now()).unwrap();

        let active = store.active_trips().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, Some(open_id));
    }

    #[test]
    fn test_close_trip_idempotent() {
        let store = create_test_store();
        let id = store.insert_trip(&create_test_trip(1)).unwrap();

        assert!(store.close_trip(id, Utc::now()).unwrap());
        // Second close is a no-op
        assert!(!store.close_trip(id, Utc::now()).unwrap());

        let trip = store.get_trip(id).unwrap().unwrap();
        assert!(!trip.is_open());
    }

    #[test]
    fn test_close_trip_bumps_last_modified() {
        let store = create_test_store();
        let id = store.insert_trip(&create_test_trip(1)).unwrap();
        let before = store.get_trip(id).unwrap().unwrap().last_modified;

        let end = Utc::now() + Duration::seconds(10);
        store.close_trip(id, end).unwrap();

        let after = store.get_trip(id).unwrap().unwrap();
        assert!(after.last_modified > before);
        assert_eq!(
            after.end_time.unwrap().timestamp(),
            after.last_modified.timestamp()
        );
    }

    #[test]
    fn test_append_and_read_points_in_order() {
        let store = create_test_store();
        let id = store.insert_trip(&create_test_trip(1)).unwrap();

        let base = Utc::now();
        for i in 0..5 {
            let point = point_at(id, 59.9 + f64::from(i) * 0.001, 10.7, base + Duration::seconds(i64::from(i)));
            store.append_point(&point).unwrap();
        }

        let points = store.points_for_trip(id).unwrap();
        assert_eq!(points.len(), 5);
        for pair in points.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        assert_eq!(store.point_count(id).unwrap(), 5);
    }

    #[test]
    fn test_points_isolated_per_trip() {
        let store = create_test_store();
        let a = store.insert_trip(&create_test_trip(1)).unwrap();
        let b = store.insert_trip(&create_test_trip(1)).unwrap();

        store.append_point(&point_at(a, 59.9, 10.7, Utc::now())).unwrap();
        store.append_point(&point_at(b, 60.0, 10.8, Utc::now())).unwrap();

        assert_eq!(store.points_for_trip(a).unwrap().len(), 1);
        assert_eq!(store.points_for_trip(b).unwrap().len(), 1);
    }

    #[test]
    fn test_set_manual_data_round_trip() {
        let store = create_test_store();
        let id = store.insert_trip(&create_test_trip(1)).unwrap();

        let data = ManualTripData {
            notes: Some("light winds".to_string()),
            crew_count: Some(2),
            engine_hours: None,
        };
        assert!(store.set_manual_data(id, &data).unwrap());

        let trip = store.get_trip(id).unwrap().unwrap();
        assert_eq!(trip.manual_data, Some(data));
    }

    #[test]
    fn test_set_manual_data_missing_trip() {
        let store = create_test_store();
        assert!(!store
            .set_manual_data(424_242, &ManualTripData::default())
            .unwrap());
    }

    #[test]
    fn test_trip_context_round_trip() {
        let store = create_test_store();
        let mut trip = create_test_trip(1);
        trip.context = TripContext {
            departure: Some("Aker Brygge".to_string()),
            purpose: Some("evening sail".to_string()),
        };

        let id = store.insert_trip(&trip).unwrap();
        let retrieved = store.get_trip(id).unwrap().unwrap();
        assert_eq!(retrieved.context, trip.context);
    }

    #[test]
    fn test_boat_crud() {
        let store = create_test_store();

        let id = store.insert_boat(&Boat::new("Misty")).unwrap();
        let boat = store.get_boat(id).unwrap().unwrap();
        assert_eq!(boat.name, "Misty");
        assert!(boat.enabled);

        assert!(store.set_boat_enabled(id, false).unwrap());
        assert!(!store.get_boat(id).unwrap().unwrap().enabled);

        assert_eq!(store.list_boats().unwrap().len(), 1);
        assert!(store.get_boat(999).unwrap().is_none());
        assert!(!store.set_boat_enabled(999, true).unwrap());
    }

    #[test]
    fn test_note_crud() {
        let store = create_test_store();

        let id = store.add_note(&TripNote::new("checked bilge", None)).unwrap();
        let notes = store.list_notes(10).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "checked bilge");

        assert!(store.delete_note(id).unwrap());
        assert!(!store.delete_note(id).unwrap());
        assert!(store.list_notes(10).unwrap().is_empty());
    }

    #[test]
    fn test_recent_trips_ordering() {
        let store = create_test_store();

        let mut older = create_test_trip(1);
        older.start_time = Utc::now() - Duration::hours(2);
        let older_id = store.insert_trip(&older).unwrap();

        let newer_id = store.insert_trip(&create_test_trip(1)).unwrap();

        let recent = store.recent_trips(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, Some(newer_id));
        assert_eq!(recent[1].id, Some(older_id));

        assert_eq!(store.recent_trips(1).unwrap().len(), 1);
    }

    #[test]
    fn test_open_file_based() {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("wakelog_test_{}.db", std::process::id()));

        let store = TripStore::open(&db_path).unwrap();
        store.insert_trip(&create_test_trip(1)).unwrap();
        assert_eq!(store.path(), db_path);

        drop(store);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let nested_path = temp_dir.join(format!(
            "wakelog_test_{}/nested/db.sqlite",
            std::process::id()
        ));

        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let store = TripStore::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(store);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&now.to_rfc3339());
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }
}
