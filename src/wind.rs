//! True/apparent wind conversions (spec section 4.4, glossary "apparent
//! wind").

use crate::geo::normalize_deg;

/// Bow-relative angle of a true bearing given the vessel's course over
/// ground, normalized to `[0, 360)`.
pub fn relative_angle(bearing_deg: f64, cog_deg: f64) -> f64 {
    normalize_deg(bearing_deg - cog_deg)
}

/// Apparent wind speed/angle felt aboard a vessel making `sog_kn` along
/// `cog_deg`, given true wind speed `tws_kn` blowing from `twd_deg`.
///
/// Returns `(aws_kn, awa_deg)` where `awa_deg` is bow-relative in
/// `[0, 360)`. Computed as the vector sum of the true wind velocity and the
/// negative of the vessel's velocity (glossary "apparent wind").
pub fn apparent_wind(tws_kn: f64, twd_deg: f64, sog_kn: f64, cog_deg: f64) -> (f64, f64) {
    // Wind velocity vector: blows *toward* twd_deg + 180.
    let wind_to_rad = (twd_deg + 180.0).to_radians();
    let wind_x = tws_kn * wind_to_rad.sin();
    let wind_y = tws_kn * wind_to_rad.cos();

    let cog_rad = cog_deg.to_radians();
    let vessel_x = sog_kn * cog_rad.sin();
    let vessel_y = sog_kn * cog_rad.cos();

    let rel_x = wind_x - vessel_x;
    let rel_y = wind_y - vessel_y;

    let aws = (rel_x * rel_x + rel_y * rel_y).sqrt();
    // The vector (rel_x, rel_y) points in the direction the apparent wind is
    // blowing *toward*; the angle it's arriving *from* is its reciprocal.
    let blowing_toward_deg = normalize_deg(rel_x.atan2(rel_y).to_degrees());
    let blowing_from_deg = normalize_deg(blowing_toward_deg + 180.0);
    let awa = relative_angle(blowing_from_deg, cog_deg);

    (aws, awa)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headwind_matches_true_wind_plus_boat_speed() {
        // Wind from dead ahead (twd == cog), vessel moving into it: apparent
        // wind speed is the sum, straight over the bow.
        let (aws, awa) = apparent_wind(10.0, 0.0, 5.0, 0.0);
        assert!((aws - 15.0).abs() < 1e-9);
        assert!(awa.abs() < 1e-6 || (awa - 360.0).abs() < 1e-6);
    }

    #[test]
    fn no_true_wind_apparent_wind_is_straight_ahead_at_boat_speed() {
        let (aws, awa) = apparent_wind(0.0, 0.0, 6.0, 90.0);
        assert!((aws - 6.0).abs() < 1e-9);
        assert!(awa.abs() < 1e-6 || (awa - 360.0).abs() < 1e-6);
    }

    #[test]
    fn becalmed_vessel_feels_true_wind_unchanged() {
        let (aws, awa) = apparent_wind(8.0, 45.0, 0.0, 0.0);
        assert!((aws - 8.0).abs() < 1e-9);
        assert!((awa - 45.0).abs() < 1e-6);
    }
}
