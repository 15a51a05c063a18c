//! Position source abstraction.
//!
//! The positioning hardware is an external collaborator; this module
//! defines the trait boundary the recorder samples through, plus a
//! scripted replay source used by tests and demos.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single timestamped position sample from the positioning hardware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
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

impl PositionFix {
    /// Create a bare fix at the given coordinates, timestamped now.
    #[must_use]
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the reported speed in meters per second.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }
}

/// Trait for position sources the recorder samples from.
///
/// Implementors wrap the actual positioning hardware or API. The recorder
/// calls `current_fix` once per sampling tick; a failed call is logged and
/// the tick is skipped, it never stops the trip.
#[async_trait::async_trait]
pub trait PositionSource: Send {
    /// The name of this source (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Produce the current position fix.
    ///
    /// # Errors
    ///
    /// Returns an error if no fix is currently available.
    async fn current_fix(&mut self) -> Result<PositionFix>;
}

/// A position source that replays a scripted sequence of fixes.
///
/// Used by tests and by the `record` command's replay mode. When the
/// script runs out the last fix is repeated (the boat "holds position"),
/// unless repetition is disabled, in which case further samples fail.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    fixes: VecDeque<PositionFix>,
    last: Option<PositionFix>,
    repeat_last: bool,
}

impl ReplaySource {
    /// Create a replay source from a sequence of fixes.
    #[must_use]
    pub fn new(fixes: impl IntoIterator<Item = PositionFix>) -> Self {
        Self {
            fixes: fixes.into_iter().collect(),
            last: None,
            repeat_last: true,
        }
    }

    /// Create a source that always reports the same coordinates.
    #[must_use]
    pub fn stationary(latitude: f64, longitude: f64) -> Self {
        Self::new([PositionFix::at(latitude, longitude)])
    }

    /// Disable repeating the last fix once the script is exhausted.
    #[must_use]
    pub fn finite(mut self) -> Self {
        self.repeat_last = false;
        self
    }

    /// Load a replay script from a JSON file containing an array of fixes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let fixes: Vec<PositionFix> = serde_json::from_str(&data)?;
        Ok(Self::new(fixes))
    }

    /// Number of scripted fixes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.fixes.len()
    }
}

#[async_trait::async_trait]
impl PositionSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn current_fix(&mut self) -> Result<PositionFix> {
        if let Some(mut fix) = self.fixes.pop_front() {
            // Scripted timestamps are advisory; samples are stamped as taken.
            fix.timestamp = Utc::now();
            self.last = Some(fix.clone());
            return Ok(fix);
        }

        if self.repeat_last {
            if let Some(last) = &self.last {
                let mut fix = last.clone();
                fix.timestamp = Utc::now();
                return Ok(fix);
            }
        }

        Err(Error::position_unavailable("replay script exhausted"))
    }
}
