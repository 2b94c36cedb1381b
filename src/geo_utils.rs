//! Geographic utilities: great-circle distance and path measurements.
//!
//! All distances are in meters. Coordinates are WGS84 degrees.

use geo::{Distance, Haversine, Point};

use crate::Coordinate;

/// Mean Earth radius in meters (same radius `geo` uses for haversine).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates in meters.
///
/// Symmetric, zero for identical points and finite for every pair of valid
/// coordinates, antipodal points included.
///
/// # Example
/// ```
/// use course_tracker::Coordinate;
/// use course_tracker::geo_utils::haversine_distance;
///
/// let london = Coordinate::new(51.5074, -0.1278);
/// let paris = Coordinate::new(48.8566, 2.3522);
/// let d = haversine_distance(&london, &paris);
/// assert!((d - 343_500.0).abs() < 5_000.0);
/// ```
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let p1 = Point::new(a.lng, a.lat);
    let p2 = Point::new(b.lng, b.lat);
    let distance = Haversine::distance(p1, p2);
    if distance.is_finite() {
        distance
    } else {
        // Rounding can push the haversine term just past 1 for antipodes.
        clamped_haversine(a, b)
    }
}

fn clamped_haversine(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let h = if h.is_finite() { h.clamp(0.0, 1.0) } else { 0.0 };

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Total length of a path in meters, summed segment by segment.
pub fn path_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Path distance from `from_index` to the last point of `points`.
///
/// Returns 0 when `from_index` is at or past the last point.
pub fn remaining_path_length(points: &[Coordinate], from_index: usize) -> f64 {
    if from_index + 1 >= points.len() {
        return 0.0;
    }
    path_length(&points[from_index..])
}

/// Find the path point closest to `target`.
///
/// Scans every point; ties go to the earliest index. Returns the index and
/// the distance in meters, or `None` for an empty path.
pub fn closest_point(points: &[Coordinate], target: &Coordinate) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate() {
        let distance = haversine_distance(target, point);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best
}

/// Walk forward along the path from `from_index` and return the index of the
/// first point reached after at least `lookahead_meters` of path distance.
///
/// Falls back to the last index if the path ends first.
pub fn index_after_path_distance(
    points: &[Coordinate],
    from_index: usize,
    lookahead_meters: f64,
) -> Option<usize> {
    if points.is_empty() {
        return None;
    }
    let last = points.len() - 1;
    let mut accumulated = 0.0;
    for index in (from_index + 1)..points.len() {
        accumulated += haversine_distance(&points[index - 1], &points[index]);
        if accumulated >= lookahead_meters {
            return Some(index);
        }
    }
    Some(last)
}

/// Convert a distance in meters to an approximate span in degrees of
/// latitude and longitude at the given latitude.
///
/// Slightly generous, so an envelope built from it contains every point
/// within `meters`.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> (f64, f64) {
    const METERS_PER_DEGREE: f64 = 111_000.0;
    let lat_degrees = meters / METERS_PER_DEGREE;
    let cos_lat = latitude.to_radians().cos().abs().max(1e-6);
    let lng_degrees = meters / (METERS_PER_DEGREE * cos_lat);
    (lat_degrees, lng_degrees)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_distance_same_point() {
        let p = Coordinate::new(37.5665, 126.9780);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let pairs = [
            (Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.001)),
            (Coordinate::new(37.5665, 126.9780), Coordinate::new(35.1796, 129.0756)),
            (Coordinate::new(-33.8688, 151.2093), Coordinate::new(51.5074, -0.1278)),
        ];
        for (a, b) in pairs {
            assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
        }
    }

    #[test]
    fn test_distance_antipodal_is_finite() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 180.0);
        let d = haversine_distance(&a, &b);
        assert!(d.is_finite());
        assert!(approx_eq(d, std::f64::consts::PI * EARTH_RADIUS_METERS, 1.0));
    }

    #[test]
    fn test_clamped_matches_geo() {
        let a = Coordinate::new(51.5074, -0.1278);
        let b = Coordinate::new(48.8566, 2.3522);
        assert!(approx_eq(
            clamped_haversine(&a, &b),
            haversine_distance(&a, &b),
            0.01
        ));
    }

    #[test]
    fn test_path_length() {
        let path = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.0, 0.002),
        ];
        let total = path_length(&path);
        // ~111 m per 0.001 degree at the equator
        assert!(approx_eq(total, 222.4, 1.0));
        assert!(approx_eq(remaining_path_length(&path, 1), total / 2.0, 0.5));
        assert_eq!(remaining_path_length(&path, 2), 0.0);
        assert_eq!(remaining_path_length(&path, 9), 0.0);
    }

    #[test]
    fn test_closest_point_prefers_first_index() {
        let path = vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.001),
            Coordinate::new(0.0, 0.0),
        ];
        let (index, distance) = closest_point(&path, &Coordinate::new(0.0, 0.0)).unwrap();
        assert_eq!(index, 0);
        assert_eq!(distance, 0.0);
        assert!(closest_point(&[], &Coordinate::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_index_after_path_distance() {
        // Points ~111 m apart
        let path: Vec<Coordinate> = (0..6)
            .map(|i| Coordinate::new(0.0, i as f64 * 0.001))
            .collect();
        assert_eq!(index_after_path_distance(&path, 0, 200.0), Some(2));
        assert_eq!(index_after_path_distance(&path, 3, 200.0), Some(5));
        assert_eq!(index_after_path_distance(&path, 4, 200.0), Some(5));
        assert_eq!(index_after_path_distance(&[], 0, 200.0), None);
    }

    #[test]
    fn test_meters_to_degrees() {
        let (lat, lng) = meters_to_degrees(111_000.0, 0.0);
        assert!(approx_eq(lat, 1.0, 1e-9));
        assert!(approx_eq(lng, 1.0, 1e-6));
        let (_, lng_north) = meters_to_degrees(111_000.0, 60.0);
        assert!(approx_eq(lng_north, 2.0, 1e-3));
    }
}
