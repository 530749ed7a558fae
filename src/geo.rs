//! Geodesy utilities: dead reckoning, bearing, distance, and unit
//! conversions, on a spherical Earth model (spec section 4.2).
//!
//! Pure functions only; no state, no I/O.

/// Mean Earth radius in nautical miles, per spec section 4.2.
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// A point on the sphere, decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Normalise an angle to [0, 360).
pub fn normalize_deg(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    d
}

/// Normalise longitude to (−180, 180].
pub fn normalize_lon(lon: f64) -> f64 {
    let mut l = (lon + 180.0) % 360.0;
    if l <= 0.0 {
        l += 360.0;
    }
    l - 180.0
}

/// Forward dead-reckoning: the position reached from `from`, travelling
/// `distance_nm` nautical miles along initial `bearing_deg` (true), on a
/// spherical Earth.
pub fn dead_reckon(from: LatLon, bearing_deg: f64, distance_nm: f64) -> LatLon {
    let lat1 = from.lat.to_radians();
    let lon1 = from.lon.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_nm / EARTH_RADIUS_NM;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    LatLon {
        lat: lat2.to_degrees().clamp(-90.0, 90.0),
        lon: normalize_lon(lon2.to_degrees()),
    }
}

/// Initial bearing (degrees true, [0, 360)) from `from` to `to`.
pub fn initial_bearing(from: LatLon, to: LatLon) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_deg(y.atan2(x).to_degrees())
}

/// Great-circle distance between two points, in nautical miles.
pub fn distance_nm(from: LatLon, to: LatLon) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (to.lon - from.lon).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_NM * c
}

// ── Unit conversions ──────────────────────────────────────────────────────

pub fn m_to_ft(m: f64) -> f64 {
    m * 3.280839895
}

pub fn m_to_fathoms(m: f64) -> f64 {
    m * 0.5468066492
}

pub fn ms_to_kn(ms: f64) -> f64 {
    ms * 1.9438444924
}

pub fn kn_to_ms(kn: f64) -> f64 {
    kn / 1.9438444924
}

pub fn kn_to_kmh(kn: f64) -> f64 {
    kn * 1.852
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn normalize_wraps_negative() {
        assert!((normalize_deg(-10.0) - 350.0).abs() < 1e-9);
        assert!((normalize_deg(370.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn normalize_lon_boundary() {
        assert!((normalize_lon(180.0) - 180.0).abs() < 1e-9);
        assert!((normalize_lon(181.0) - (-179.0)).abs() < 1e-9);
        assert!((normalize_lon(-181.0) - 179.0).abs() < 1e-9);
    }

    #[test]
    fn dead_reckon_north_one_degree_lat() {
        let start = LatLon { lat: 0.0, lon: 0.0 };
        // One degree of latitude is 60 nm along a meridian.
        let end = dead_reckon(start, 0.0, 60.0);
        assert!((end.lat - 1.0).abs() < 1e-3, "lat={}", end.lat);
        assert!(end.lon.abs() < 1e-6);
    }

    #[quickcheck]
    fn bearing_reciprocal_short_hop(lat: f64, lon: f64, bearing: f64, dist: f64) -> bool {
        // Restrict domain to valid, well-conditioned inputs; avoid poles
        // where initial bearing is degenerate.
        let lat = lat.rem_euclid(180.0) - 80.0; // (-80, 100) -> clamp below
        if !(-80.0..=80.0).contains(&lat) {
            return true;
        }
        let lon = normalize_lon(lon % 360.0);
        let bearing = normalize_deg(bearing % 360.0);
        let dist = (dist.abs() % 9.0) + 0.1; // < 10 nm, per spec section 8

        let start = LatLon { lat, lon };
        let end = dead_reckon(start, bearing, dist);
        let back = initial_bearing(end, start);
        let expected = normalize_deg(bearing + 180.0);
        let diff = (back - expected).abs();
        let diff = diff.min(360.0 - diff);
        diff < 0.05
    }
}
