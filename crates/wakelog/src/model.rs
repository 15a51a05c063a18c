//! Core domain types for wakelog.
//!
//! This module defines the persistent records (trips, points, boats, notes)
//! and the derived records (stop points, statistics) that the rest of the
//! crate operates on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of water a trip took place on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterType {
    /// Open sea or coastal salt water.
    Salt,
    /// Lakes and rivers.
    Fresh,
    /// Estuaries and mixed water.
    Brackish,
}

impl std::fmt::Display for WaterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Salt => write!(f, "salt"),
            Self::Fresh => write!(f, "fresh"),
            Self::Brackish => write!(f, "brackish"),
        }
    }
}

impl WaterType {
    /// Parse a water type from its storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "salt" => Some(Self::Salt),
            "fresh" => Some(Self::Fresh),
            "brackish" => Some(Self::Brackish),
            _ => None,
        }
    }
}

/// The role the user held on a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripRole {
    /// In command of the boat.
    Skipper,
    /// Active crew member.
    Crew,
    /// Along for the ride.
    Passenger,
}

impl std::fmt::Display for TripRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipper => write!(f, "skipper"),
            Self::Crew => write!(f, "crew"),
            Self::Passenger => write!(f, "passenger"),
        }
    }
}

impl TripRole {
    /// Parse a role from its storage representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "skipper" => Some(Self::Skipper),
            "crew" => Some(Self::Crew),
            "passenger" => Some(Self::Passenger),
            _ => None,
        }
    }
}

/// Optional context supplied when a trip is started.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripContext {
    /// Departure harbour or location name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,

    /// Free-form purpose of the trip ("delivery", "club race", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// Manually entered data attached to a trip after the fact.
///
/// Edits to this record are forwarded to the sync service fire-and-forget;
/// the edit itself never waits on sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualTripData {
    /// Free-form notes about the trip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Number of crew aboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crew_count: Option<u32>,

    /// Engine hours logged on the trip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_hours: Option<f64>,
}

/// A recorded boat trip.
///
/// A trip is created open (`end_time == None`) when recording starts and
/// is closed exactly once, by a stop command or by orphan repair. The
/// durable trip row is the authoritative recovery source after a crash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Unique identifier (assigned by the storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// The boat this trip was taken on.
    pub boat_id: i64,

    /// When recording started.
    pub start_time: DateTime<Utc>,

    /// When recording ended; `None` while the trip is open.
    pub end_time: Option<DateTime<Utc>>,

    /// The kind of water.
    pub water_type: WaterType,

    /// The user's role aboard.
    pub role: TripRole,

    /// Position sampling period in milliseconds.
    pub update_interval_ms: u64,

    /// Optional context captured at start.
    pub context: TripContext,

    /// Manually entered data, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_data: Option<ManualTripData>,

    /// Last time any field of this row changed.
    pub last_modified: DateTime<Utc>,
}

impl Trip {
    /// Create a new open trip starting now.
    #[must_use]
    pub fn new(
        boat_id: i64,
        water_type: WaterType,
        role: TripRole,
        update_interval_ms: u64,
        context: TripContext,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            boat_id,
            start_time: now,
            end_time: None,
            water_type,
            role,
            update_interval_ms,
            context,
            manual_data: None,
            last_modified: now,
        }
    }

    /// Check whether the trip is still open (being recorded or orphaned).
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// A single GPS sample appended to a trip's track.
///
/// Points are append-only; the route is defined by timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    /// The trip this point belongs to.
    pub trip_id: i64,

    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// Altitude in meters, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,

    /// Horizontal accuracy in meters, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    /// Speed over ground in meters per second, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,

    /// Heading in degrees, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,

    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
}

/// A boat that trips can be recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boat {
    /// Unique identifier (assigned by the storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Display name.
    pub name: String,

    /// Whether trips may be started on this boat.
    pub enabled: bool,
}

impl Boat {
    /// Create a new enabled boat.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            enabled: true,
        }
    }
}

/// A detected dwell location within a trip's route.
///
/// Stop points are fully derived from the point stream and may be cached,
/// but are never persisted as authoritative data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopPoint {
    /// Latitude of the dwell anchor.
    pub latitude: f64,

    /// Longitude of the dwell anchor.
    pub longitude: f64,

    /// When the dwell began.
    pub start_time: DateTime<Utc>,

    /// When the dwell ended.
    pub end_time: DateTime<Utc>,

    /// Dwell duration in seconds.
    pub duration_seconds: i64,
}

/// Derived motion statistics for a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripStatistics {
    /// Trip duration in seconds (up to now for open trips).
    pub duration_seconds: i64,

    /// Total route distance in meters.
    pub distance_meters: f64,

    /// Average speed over the whole trip in knots.
    pub average_speed_knots: f64,

    /// Maximum observed speed in knots.
    pub max_speed_knots: f64,

    /// Detected dwell locations.
    pub stop_points: Vec<StopPoint>,
}

/// A free-form log note, optionally attached to a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripNote {
    /// Unique identifier (assigned by the storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// The trip this note is attached to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<i64>,

    /// Note text.
    pub text: String,

    /// When the note was created.
    pub created_at: DateTime<Utc>,
}

impl TripNote {
    /// Create a new note with the given text.
    #[must_use]
    pub fn new(text: impl Into<String>, trip_id: Option<i64>) -> Self {
        Self {
            id: None,
            trip_id,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_type_display() {
        assert_eq!(WaterType::Salt.to_string(), "salt");
        assert_eq!(WaterType::Fresh.to_string(), "fresh");
        assert_eq!(WaterType::Brackish.to_string(), "brackish");
    }

    #[test]
    fn test_water_type_parse_round_trip() {
        for wt in [WaterType::Salt, WaterType::Fresh, WaterType::Brackish] {
            assert_eq!(WaterType::parse(&wt.to_string()), Some(wt));
        }
        assert_eq!(WaterType::parse("lava"), None);
    }

    #[test]
    fn test_trip_role_display() {
        assert_eq!(TripRole::Skipper.to_string(), "skipper");
        assert_eq!(TripRole::Crew.to_string(), "crew");
        assert_eq!(TripRole::Passenger.to_string(), "passenger");
    }

    #[test]
    fn test_trip_role_parse_round_trip() {
        for role in [TripRole::Skipper, TripRole::Crew, TripRole::Passenger] {
            assert_eq!(TripRole::parse(&role.to_string()), Some(role));
        }
        assert_eq!(TripRole::parse("stowaway"), None);
    }

    #[test]
    fn test_trip_new_is_open() {
        let trip = Trip::new(
            1,
            WaterType::Salt,
            TripRole::Skipper,
            5000,
            TripContext::default(),
        );
        assert!(trip.id.is_none());
        assert!(trip.is_open());
        assert_eq!(trip.boat_id, 1);
        assert_eq!(trip.update_interval_ms, 5000);
        assert!(trip.manual_data.is_none());
    }

    #[test]
    fn test_trip_closed_is_not_open() {
        let mut trip = Trip::new(
            1,
            WaterType::Fresh,
            TripRole::Crew,
            1000,
            TripContext::default(),
        );
        trip.end_time = Some(Utc::now());
        assert!(!trip.is_open());
    }

    #[test]
    fn test_boat_new_enabled() {
        let boat = Boat::new("Misty");
        assert!(boat.enabled);
        assert_eq!(boat.name, "Misty");
        assert!(boat.id.is_none());
    }

    #[test]
    fn test_trip_note_new() {
        let note = TripNote::new("furler serviced", Some(3));
        assert_eq!(note.text, "furler serviced");
        assert_eq!(note.trip_id, Some(3));
        assert!(note.id.is_none());
    }

    #[test]
    fn test_trip_serialization() {
        let trip = Trip::new(
            2,
            WaterType::Brackish,
            TripRole::Passenger,
            2000,
            TripContext {
                departure: Some("Oslo".to_string()),
                purpose: None,
            },
        );

        let json = serde_json::to_string(&trip).unwrap();
        let deserialized: Trip = serde_json::from_str(&json).unwrap();

        assert_eq!(trip.boat_id, deserialized.boat_id);
        assert_eq!(trip.water_type, deserialized.water_type);
        assert_eq!(trip.context, deserialized.context);
        assert!(deserialized.is_open());
    }

    #[test]
    fn test_manual_data_serialization() {
        let data = ManualTripData {
            notes: Some("rough crossing".to_string()),
            crew_count: Some(3),
            engine_hours: Some(1.5),
        };

        let json = serde_json::to_string(&data).unwrap();
        let deserialized: ManualTripData = serde_json::from_str(&json).unwrap();
        assert_eq!(data, deserialized);
    }

    #[test]
    fn test_manual_data_skips_empty_fields() {
        let json = serde_json::to_string(&ManualTripData::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
