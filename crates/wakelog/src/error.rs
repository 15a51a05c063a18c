//! Error types for wakelog.
//!
//! This module defines all error types used throughout the wakelog crate.
//! Start-trip precondition failures (`BoatNotFound`, `BoatDisabled`,
//! `AlreadyTracking`) are ordinary variants here so they can be surfaced
//! verbatim to the user, while `RecorderUnreachable` marks transport
//! failures that the controller handles with its escalation path.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for wakelog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Start-Trip Precondition Errors ===
    /// The requested boat does not exist.
    #[error("boat {boat_id} not found")]
    BoatNotFound {
        /// The boat id that was requested.
        boat_id: i64,
    },

    /// The requested boat is disabled.
    #[error("boat '{name}' is disabled")]
    BoatDisabled {
        /// Name of the disabled boat.
        name: String,
    },

    /// A trip is already being recorded.
    #[error("a trip is already being recorded")]
    AlreadyTracking {
        /// The trip currently owned by the recorder, when known.
        trip_id: Option<i64>,
    },

    /// The referenced trip does not exist.
    #[error("trip {trip_id} not found")]
    TripNotFound {
        /// The trip id that was requested.
        trip_id: i64,
    },

    // === Transport Errors ===
    /// The recorder task cannot be reached (crashed or shut down).
    #[error("recorder is unreachable")]
    RecorderUnreachable,

    // === Position Errors ===
    /// The position source could not produce a fix.
    #[error("position unavailable: {message}")]
    PositionUnavailable {
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for wakelog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new position-unavailable error.
    #[must_use]
    pub fn position_unavailable(message: impl Into<String>) -> Self {
        Self::PositionUnavailable {
            message: message.into(),
        }
    }

    /// Check if this error indicates the recorder cannot be reached.
    #[must_use]
    pub fn is_recorder_unreachable(&self) -> bool {
        matches!(self, Self::RecorderUnreachable)
    }

    /// Check if this error is a start-trip precondition rejection.
    ///
    /// Rejections are surfaced verbatim and never mutate recorder state.
    #[must_use]
    pub fn is_start_rejection(&self) -> bool {
        matches!(
            self,
            Self::BoatNotFound { .. } | Self::BoatDisabled { .. } | Self::AlreadyTracking { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RecorderUnreachable;
        assert_eq!(err.to_string(), "recorder is unreachable");

        let err = Error::BoatNotFound { boat_id: 42 };
        assert_eq!(err.to_string(), "boat 42 not found");

        let err = Error::BoatDisabled {
            name: "Misty".to_string(),
        };
        assert_eq!(err.to_string(), "boat 'Misty' is disabled");
    }

    #[test]
    fn test_is_recorder_unreachable() {
        assert!(Error::RecorderUnreachable.is_recorder_unreachable());
        assert!(!Error::BoatNotFound { boat_id: 1 }.is_recorder_unreachable());
    }

    #[test]
    fn test_is_start_rejection() {
        assert!(Error::BoatNotFound { boat_id: 1 }.is_start_rejection());
        assert!(Error::BoatDisabled {
            name: "Misty".to_string()
        }
        .is_start_rejection());
        assert!(Error::AlreadyTracking { trip_id: Some(3) }.is_start_rejection());
        assert!(!Error::RecorderUnreachable.is_start_rejection());
        assert!(!Error::TripNotFound { trip_id: 1 }.is_start_rejection());
    }

    #[test]
    fn test_position_unavailable() {
        let err = Error::position_unavailable("no satellite lock");
        assert_eq!(err.to_string(), "position unavailable: no satellite lock");
    }

    #[test]
    fn test_already_tracking_display() {
        let err = Error::AlreadyTracking { trip_id: None };
        assert!(err.to_string().contains("already being recorded"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "invalid interval".to_string(),
        };
        assert!(err.to_string().contains("invalid interval"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
