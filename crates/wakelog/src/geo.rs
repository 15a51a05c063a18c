//! Geodesic helpers.
//!
//! Great-circle distance and the unit conversions used by the statistics
//! layer. All functions are pure.

/// Mean Earth radius in meters, as used by the Haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters in one international nautical mile.
pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

/// Great-circle distance in meters between two latitude/longitude pairs.
///
/// Uses the Haversine formula with a mean Earth radius of 6,371,000 m.
/// Coordinates are decimal degrees.
#[must_use]
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Convert meters per second to knots.
#[must_use]
pub fn mps_to_knots(mps: f64) -> f64 {
    mps * 3600.0 / METERS_PER_NAUTICAL_MILE
}

/// Convert meters to nautical miles.
#[must_use]
pub fn meters_to_nautical_miles(meters: f64) -> f64 {
    meters / METERS_PER_NAUTICAL_MILE
}
