//! Streaming stop-point detection.
//!
//! A stop point is a dwell: a stretch of the track where every sample
//! stays within a small radius of an anchor for at least a minimum
//! duration. The detector makes one left-to-right pass and can be fed
//! incrementally as points arrive or run in batch over a stored track;
//! both produce identical output for the same point sequence.

use chrono::{DateTime, Duration, Utc};

use crate::geo::haversine_meters;
use crate::model::{GpsPoint, StopPoint};

/// Default dwell radius: 45 ft in meters.
pub const DEFAULT_RADIUS_METERS: f64 = 13.716;

/// Default minimum dwell duration: 5 minutes.
pub const DEFAULT_MIN_DWELL_SECONDS: i64 = 300;

/// A candidate dwell window anchored at the first non-moving point.
#[derive(Debug, Clone)]
struct Window {
    latitude: f64,
    longitude: f64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl Window {
    fn anchored_at(point: &GpsPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            start_time: point.timestamp,
            end_time: point.timestamp,
        }
    }
}

/// Streaming dwell detector over a trip's ordered points.
///
/// Feed points in timestamp order with [`observe`](Self::observe); call
/// [`finish`](Self::finish) when the trip ends to evaluate a window that
/// is still open. The detector is deterministic: re-running it over an
/// unchanged point sequence yields an identical stop-point list.
#[derive(Debug, Clone)]
pub struct StopPointDetector {
    radius_meters: f64,
    min_dwell: Duration,
    window: Option<Window>,
}

impl Default for StopPointDetector {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS_METERS, DEFAULT_MIN_DWELL_SECONDS)
    }
}

impl StopPointDetector {
    /// Create a detector with the given dwell radius and minimum duration.
    #[must_use]
    pub fn new(radius_meters: f64, min_dwell_seconds: i64) -> Self {
        Self {
            radius_meters,
            min_dwell: Duration::seconds(min_dwell_seconds),
            window: None,
        }
    }

    /// Feed the next point, in timestamp order.
    ///
    /// Returns a stop point when this sample moves outside the current
    /// window's radius and the window it closes met the dwell minimum.
    pub fn observe(&mut self, point: &GpsPoint) -> Option<StopPoint> {
        match &mut self.window {
            None => {
                self.window = Some(Window::anchored_at(point));
                None
            }
            Some(window) => {
                let distance = haversine_meters(
                    window.latitude,
                    window.longitude,
                    point.latitude,
                    point.longitude,
                );
                if distance <= self.radius_meters {
                    window.end_time = point.timestamp;
                    None
                } else {
                    let closed = self.window.replace(Window::anchored_at(point));
                    closed.and_then(|w| self.evaluate(&w))
                }
            }
        }
    }

    /// Signal the end of the point stream, evaluating any open window
    /// with the final point seen as its implicit end.
    pub fn finish(&mut self) -> Option<StopPoint> {
        let window = self.window.take()?;
        self.evaluate(&window)
    }

    fn evaluate(&self, window: &Window) -> Option<StopPoint> {
        let dwell = window.end_time - window.start_time;
        if dwell >= self.min_dwell {
            Some(StopPoint {
                latitude: window.latitude,
                longitude: window.longitude,
                start_time: window.start_time,
                end_time: window.end_time,
                duration_seconds: dwell.num_seconds(),
            })
        } else {
            None
        }
    }
}

/// Run the detector in batch over an ordered point slice.
#[must_use]
pub fn detect_stop_points(
    points: &[GpsPoint],
    radius_meters: f64,
    min_dwell_seconds: i64,
) -> Vec<StopPoint> {
    // A single point can never satisfy the dwell minimum.
    if points.len() < 2 {
        return Vec::new();
    }

    let mut detector = StopPointDetector::new(radius_meters, min_dwell_seconds);
    let mut stops: Vec<StopPoint> = points
        .iter()
        .filter_map(|point| detector.observe(point))
        .collect();
    if let Some(last) = detector.finish() {
        stops.push(last);
    }
    stops
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn point(lat: f64, lon: f64, seconds: i64) -> GpsPoint {
        GpsPoint {
            trip_id: 1,
            latitude: lat,
            longitude: lon,
            altitude: None,
            accuracy: None,
            speed: None,
            heading: None,
            timestamp: ts(seconds),
        }
    }

    /// Offset in degrees latitude corresponding to roughly 5 meters.
    const FIVE_METERS_LAT: f64 = 5.0 / 111_195.0;

    /// Offset in degrees latitude corresponding to roughly 50 meters,
    /// safely outside the default radius.
    const FIFTY_METERS_LAT: f64 = 50.0 / 111_195.0;

    fn detect(points: &[GpsPoint]) -> Vec<StopPoint> {
        detect_stop_points(points, DEFAULT_RADIUS_METERS, DEFAULT_MIN_DWELL_SECONDS)
    }

    #[test]
    fn test_no_points_no_stops() {
        assert!(detect(&[]).is_empty());
    }

    #[test]
    fn test_single_point_no_stops() {
        assert!(detect(&[point(59.9, 10.7, 0)]).is_empty());
    }

    #[test]
    fn test_cluster_spanning_exactly_dwell_minimum_emits() {
        // Points within ~5 m of the anchor, spanning exactly 300 seconds.
        let points = vec![
            point(59.9, 10.7, 0),
            point(59.9 + FIVE_METERS_LAT, 10.7, 150),
            point(59.9, 10.7, 300),
        ];

        let stops = detect(&points);
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].duration_seconds, 300);
        assert!((stops[0].latitude - 59.9).abs() < 1e-9);
        assert_eq!(stops[0].start_time, ts(0));
        assert_eq!(stops[0].end_time, ts(300));
    }

    #[test]
    fn test_cluster_one_second_short_emits_nothing() {
        let points = vec![
            point(59.9, 10.7, 0),
            point(59.9 + FIVE_METERS_LAT, 10.7, 150),
            point(59.9, 10.7, 299),
        ];

        assert!(detect(&points).is_empty());
    }

    #[test]
    fn test_departure_closes_window() {
        // Dwell for 400 s, then move well outside the radius.
        let points = vec![
            point(59.9, 10.7, 0),
            point(59.9, 10.7, 400),
            point(59.9 + FIFTY_METERS_LAT, 10.7, 410),
        ];

        let stops = detect(&points);
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].duration_seconds, 400);
        assert_eq!(stops[0].end_time, ts(400));
    }

    #[test]
    fn test_open_window_evaluated_at_trip_end() {
        // Trip ends while still dwelling; the final point is the implicit end.
        let points = vec![
            point(59.9 + FIFTY_METERS_LAT, 10.7, 0),
            point(59.9, 10.7, 10),
            point(59.9, 10.7, 350),
        ];

        let stops = detect(&points);
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].start_time, ts(10));
        assert_eq!(stops[0].end_time, ts(350));
        assert_eq!(stops[0].duration_seconds, 340);
    }

    #[test]
    fn test_moving_track_emits_nothing() {
        let points: Vec<GpsPoint> = (0..20)
            .map(|i| point(59.9 + f64::from(i) * FIFTY_METERS_LAT, 10.7, i64::from(i) * 60))
            .collect();

        assert!(detect(&points).is_empty());
    }

    #[test]
    fn test_two_separate_dwells() {
        let far = 59.9 + 100.0 * FIFTY_METERS_LAT;
        let points = vec![
            // First dwell: 0..360 s
            point(59.9, 10.7, 0),
            point(59.9, 10.7, 360),
            // Transit
            point(far, 10.7, 400),
            // Second dwell: 400..760 s
            point(far, 10.7, 760),
            // Departure closes it
            point(far + FIFTY_METERS_LAT, 10.7, 770),
        ];

        let stops = detect(&points);
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].start_time, ts(0));
        assert_eq!(stops[1].start_time, ts(400));
    }

    #[test]
    fn test_anchor_is_window_origin_not_centroid() {
        // The emitted coordinates are the anchor's, even when later points
        // drift within the radius.
        let points = vec![
            point(59.9, 10.7, 0),
            point(59.9 + FIVE_METERS_LAT, 10.7, 400),
            point(59.9 + FIFTY_METERS_LAT, 10.7, 410),
        ];

        let stops = detect(&points);
        assert_eq!(stops.len(), 1);
        assert!((stops[0].latitude - 59.9).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic_over_reruns() {
        let points: Vec<GpsPoint> = (0..50)
            .map(|i| {
                let moving = (i / 10) % 2 == 1;
                let lat = if moving {
                    59.9 + f64::from(i) * FIFTY_METERS_LAT
                } else {
                    59.9
                };
                point(lat, 10.7, i64::from(i) * 45)
            })
            .collect();

        let first = detect(&points);
        let second = detect(&points);
        assert_eq!(first, second);
    }

    #[test]
    fn test_incremental_matches_batch() {
        let points = vec![
            point(59.9, 10.7, 0),
            point(59.9, 10.7, 400),
            point(59.9 + FIFTY_METERS_LAT, 10.7, 410),
            point(59.9 + FIFTY_METERS_LAT, 10.7, 800),
        ];

        let batch = detect(&points);

        let mut detector = StopPointDetector::default();
        let mut incremental = Vec::new();
        for p in &points {
            if let Some(stop) = detector.observe(p) {
                incremental.push(stop);
            }
        }
        if let Some(stop) = detector.finish() {
            incremental.push(stop);
        }

        assert_eq!(batch, incremental);
    }

    #[test]
    fn test_custom_thresholds() {
        // A 60 second dwell emits with a lowered minimum.
        let points = vec![
            point(59.9, 10.7, 0),
            point(59.9, 10.7, 60),
            point(59.9 + FIFTY_METERS_LAT, 10.7, 70),
        ];

        assert!(detect_stop_points(&points, DEFAULT_RADIUS_METERS, 300).is_empty());
        let stops = detect_stop_points(&points, DEFAULT_RADIUS_METERS, 60);
        assert_eq!(stops.len(), 1);
    }

    #[test]
    fn test_finish_is_empty_after_take() {
        let mut detector = StopPointDetector::default();
        detector.observe(&point(59.9, 10.7, 0));
        detector.observe(&point(59.9, 10.7, 400));

        assert!(detector.finish().is_some());
        assert!(detector.finish().is_none());
    }
}
