//! Trip statistics derivation.
//!
//! Statistics are a pure function of a trip's ordered points: no side
//! effects, no storage access. Because points are append-only while a
//! trip is open and immutable once it is closed, results may be cached
//! keyed on `(trip_id, point_count)`.

pub mod stop_points;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::geo::{haversine_meters, meters_to_nautical_miles, mps_to_knots};
use crate::model::{GpsPoint, Trip, TripStatistics};

pub use stop_points::{detect_stop_points, StopPointDetector};

/// Calculate statistics for a trip with the default stop-detection
/// thresholds.
///
/// `as_of` supplies "now" for open trips; closed trips use their own end
/// time. Passing the clock in keeps the function pure and testable.
#[must_use]
pub fn calculate(trip: &Trip, points: &[GpsPoint], as_of: DateTime<Utc>) -> TripStatistics {
    calculate_with(
        trip,
        points,
        as_of,
        stop_points::DEFAULT_RADIUS_METERS,
        stop_points::DEFAULT_MIN_DWELL_SECONDS,
    )
}

/// Calculate statistics with explicit stop-detection thresholds.
#[must_use]
pub fn calculate_with(
    trip: &Trip,
    points: &[GpsPoint],
    as_of: DateTime<Utc>,
    stop_radius_meters: f64,
    stop_min_dwell_seconds: i64,
) -> TripStatistics {
    let end = trip.end_time.unwrap_or(as_of);
    let duration_seconds = (end - trip.start_time).num_seconds().max(0);

    let distance_meters: f64 = points
        .windows(2)
        .map(|pair| {
            haversine_meters(
                pair[0].latitude,
                pair[0].longitude,
                pair[1].latitude,
                pair[1].longitude,
            )
        })
        .sum();

    let average_speed_knots = if duration_seconds > 0 {
        let hours = duration_seconds as f64 / 3600.0;
        meters_to_nautical_miles(distance_meters) / hours
    } else {
        0.0
    };

    let max_speed_knots = (0..points.len())
        .filter_map(|i| point_speed_mps(points, i))
        .map(mps_to_knots)
        .fold(0.0_f64, f64::max);

    let stop_points = detect_stop_points(points, stop_radius_meters, stop_min_dwell_seconds);

    TripStatistics {
        duration_seconds,
        distance_meters,
        average_speed_knots,
        max_speed_knots,
        stop_points,
    }
}

/// Speed of the point at `index` in m/s.
///
/// Uses the reported speed when present; otherwise derives it from the
/// distance and elapsed time to the adjacent point (the previous one,
/// or the next one for the first point).
fn point_speed_mps(points: &[GpsPoint], index: usize) -> Option<f64> {
    if let Some(speed) = points[index].speed {
        return Some(speed);
    }

    let (a, b) = if index > 0 {
        (index - 1, index)
    } else if points.len() > 1 {
        (index, index + 1)
    } else {
        return None;
    };

    let elapsed = (points[b].timestamp - points[a].timestamp).num_milliseconds();
    if elapsed <= 0 {
        return None;
    }

    let distance = haversine_meters(
        points[a].latitude,
        points[a].longitude,
        points[b].latitude,
        points[b].longitude,
    );
    Some(distance / (elapsed as f64 / 1000.0))
}

/// A cache of derived statistics keyed on `(trip_id, point_count)`.
///
/// Valid because tracks are append-only: a new point changes the count
/// and misses the cache, and closed trips never change at all.
#[derive(Debug, Default)]
pub struct StatsCache {
    entries: HashMap<(i64, usize), TripStatistics>,
}

impl StatsCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get cached statistics for the trip, computing them on a miss.
    pub fn get_or_compute(
        &mut self,
        trip: &Trip,
        points: &[GpsPoint],
        as_of: DateTime<Utc>,
    ) -> TripStatistics {
        let Some(trip_id) = trip.id else {
            // Unsaved trips are never cached.
            return calculate(trip, points, as_of);
        };

        self.entries
            .entry((trip_id, points.len()))
            .or_insert_with(|| calculate(trip, points, as_of))
            .clone()
    }

    /// Drop all cached entries for a trip.
    pub fn invalidate(&mut self, trip_id: i64) {
        self.entries.retain(|(id, _), _| *id != trip_id);
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
