//! Own-ship kinematic model (spec section 4.4).
//!
//! The engine's single mutable pose/environmentals holder. Exactly one
//! [`OwnShip`] exists per running engine; its `tick` method is called once
//! per scheduler wake-up and either random-walks the state or interpolates
//! it from a GPX track.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::{GpxAnchor, SimConfig};
use crate::geo::{dead_reckon, normalize_deg};
use crate::gpx::Track;

const SOG_STEP_KN: f64 = 0.2;
const COG_STEP_DEG: f64 = 2.0;
const TWS_STEP_KN: f64 = 0.3;
const TWD_STEP_DEG: f64 = 3.0;
const MAX_SOG_KN: f64 = 40.0;

const DEPTH_JITTER_M: f64 = 0.1;
const TEMP_JITTER_C: f64 = 0.05;
const BATTERY_JITTER_V: f64 = 0.01;

const TANK_FRESH_RATE_PER_S: f64 = -0.01;
const TANK_FUEL_RATE_PER_S: f64 = -0.015;
const TANK_WASTE_RATE_PER_S: f64 = 0.01;

/// How the own-ship position advances each tick.
#[derive(Debug, Clone)]
enum Drive {
    Manual,
    Gpx { track: Track, time_offset_s: f64, fraction: f64 },
}

/// GPX playback progress exposed through `status()` (spec section 6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpxProgress {
    pub has_time: bool,
    pub elapsed_s: Option<f64>,
    pub duration_s: Option<f64>,
    pub fraction: f64,
}

/// Own-ship pose, wind, environmentals, and simulated clock (spec section 3,
/// "Own-ship state").
#[derive(Debug, Clone)]
pub struct OwnShip {
    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    pub tws_kn: f64,
    pub twd_deg: f64,
    pub depth_m: f64,
    pub depth_offset_m: f64,
    pub water_temp_c: f64,
    pub air_temp_c: f64,
    pub battery_v: f64,
    pub tank_fresh_water: f64,
    pub tank_fuel: f64,
    pub tank_waste: f64,
    pub magvar_deg: f64,
    pub clock: DateTime<Utc>,

    drive: Drive,
}

impl OwnShip {
    pub fn new(cfg: &SimConfig, start: DateTime<Utc>) -> Self {
        let drive = match (&cfg.gpx_track, &cfg.gpx_anchor) {
            (Some(track), Some(GpxAnchor::OffsetS(off))) => {
                Drive::Gpx { track: track.clone(), time_offset_s: *off, fraction: 0.0 }
            }
            (Some(track), Some(GpxAnchor::StartFraction(f))) => {
                Drive::Gpx { track: track.clone(), time_offset_s: 0.0, fraction: *f }
            }
            _ => Drive::Manual,
        };

        let (lat, lon, sog_kn, cog_deg) = match &drive {
            Drive::Gpx { track, time_offset_s, fraction: _ } if track.has_time => {
                let p = track.position_at(*time_offset_s);
                let (sog, cog) = track.sog_cog_at(*time_offset_s);
                (p.lat, p.lon, sog, cog)
            }
            Drive::Gpx { track, fraction, .. } => {
                let p = track.position_at_fraction(*fraction);
                (p.lat, p.lon, cfg.sog_kn, track.cog_at_fraction(*fraction))
            }
            Drive::Manual => (cfg.lat, cfg.lon, cfg.sog_kn, cfg.cog_deg),
        };

        Self {
            lat,
            lon,
            sog_kn,
            cog_deg,
            tws_kn: cfg.tws_kn,
            twd_deg: cfg.twd_deg,
            depth_m: cfg.depth_m,
            depth_offset_m: cfg.depth_offset_m,
            water_temp_c: cfg.water_temp_c,
            air_temp_c: cfg.air_temp_c,
            battery_v: cfg.battery_v,
            tank_fresh_water: cfg.tank_fresh_water,
            tank_fuel: cfg.tank_fuel,
            tank_waste: cfg.tank_waste,
            magvar_deg: cfg.magvar_deg,
            clock: start,
            drive,
        }
    }

    /// Magnetic course over ground, used by GPVTG/WIMWD.
    pub fn cog_magnetic_deg(&self) -> f64 {
        normalize_deg(self.cog_deg - self.magvar_deg)
    }

    /// GPX playback progress, or `None` when driven manually.
    pub fn gpx_progress(&self) -> Option<GpxProgress> {
        match &self.drive {
            Drive::Manual => None,
            Drive::Gpx { track, time_offset_s, fraction: _ } if track.has_time => {
                let fraction = track
                    .duration_s
                    .map(|d| if d > 0.0 { (*time_offset_s / d).clamp(0.0, 1.0) } else { 0.0 })
                    .unwrap_or(0.0);
                Some(GpxProgress {
                    has_time: true,
                    elapsed_s: Some(*time_offset_s),
                    duration_s: track.duration_s,
                    fraction,
                })
            }
            Drive::Gpx { fraction, .. } => {
                Some(GpxProgress { has_time: false, elapsed_s: None, duration_s: None, fraction: *fraction })
            }
        }
    }

    /// Advance own-ship state by `dt_s` seconds (spec section 4.4).
    pub fn tick<R: Rng>(&mut self, dt_s: f64, rng: &mut R) {
        self.clock += chrono::Duration::milliseconds((dt_s * 1000.0).round() as i64);

        match &mut self.drive {
            Drive::Gpx { track, time_offset_s, fraction: _ } if track.has_time => {
                *time_offset_s += dt_s;
                let p = track.position_at(*time_offset_s);
                let (sog, cog) = track.sog_cog_at(*time_offset_s);
                self.lat = p.lat;
                self.lon = p.lon;
                self.sog_kn = sog;
                self.cog_deg = cog;
            }
            Drive::Gpx { track, fraction, .. } => {
                let delta_nm = self.sog_kn * dt_s / 3600.0;
                let delta_fraction = if track.length_nm > 0.0 { delta_nm / track.length_nm } else { 0.0 };
                *fraction = (*fraction + delta_fraction).clamp(0.0, 1.0);
                let p = track.position_at_fraction(*fraction);
                self.lat = p.lat;
                self.lon = p.lon;
                self.cog_deg = track.cog_at_fraction(*fraction);
            }
            Drive::Manual => {
                self.sog_kn = (self.sog_kn + rng.gen_range(-SOG_STEP_KN..=SOG_STEP_KN)).clamp(0.0, MAX_SOG_KN);
                self.cog_deg = normalize_deg(self.cog_deg + rng.gen_range(-COG_STEP_DEG..=COG_STEP_DEG));
                self.tws_kn = (self.tws_kn + rng.gen_range(-TWS_STEP_KN..=TWS_STEP_KN)).max(0.0);
                self.twd_deg = normalize_deg(self.twd_deg + rng.gen_range(-TWD_STEP_DEG..=TWD_STEP_DEG));
                let delta_nm = self.sog_kn * dt_s / 3600.0;
                let p = dead_reckon(crate::geo::LatLon { lat: self.lat, lon: self.lon }, self.cog_deg, delta_nm);
                self.lat = p.lat;
                self.lon = p.lon;
            }
        }

        self.tick_sensors(dt_s, rng);
    }

    fn tick_sensors<R: Rng>(&mut self, dt_s: f64, rng: &mut R) {
        self.depth_m = (self.depth_m + rng.gen_range(-DEPTH_JITTER_M..=DEPTH_JITTER_M)).max(0.0);
        self.water_temp_c =
            (self.water_temp_c + rng.gen_range(-TEMP_JITTER_C..=TEMP_JITTER_C)).clamp(-20.0, 50.0);
        self.air_temp_c = (self.air_temp_c + rng.gen_range(-TEMP_JITTER_C..=TEMP_JITTER_C)).clamp(-20.0, 50.0);
        self.battery_v =
            (self.battery_v + rng.gen_range(-BATTERY_JITTER_V..=BATTERY_JITTER_V)).clamp(0.0, 30.0);

        self.tank_fresh_water = (self.tank_fresh_water + TANK_FRESH_RATE_PER_S * dt_s).clamp(0.0, 100.0);
        self.tank_fuel = (self.tank_fuel + TANK_FUEL_RATE_PER_S * dt_s).clamp(0.0, 100.0);
        self.tank_waste = (self.tank_waste + TANK_WASTE_RATE_PER_S * dt_s).clamp(0.0, 100.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn base_cfg() -> SimConfig {
        SimConfig { lat: 42.0, lon: -16.0, sog_kn: 5.0, cog_deg: 90.0, ..SimConfig::default() }
    }

    #[test]
    fn manual_tick_advances_position_east() {
        let mut ship = OwnShip::new(&base_cfg(), Utc::now());
        let mut rng = StdRng::seed_from_u64(1);
        let before = ship.lon;
        ship.tick(1.0, &mut rng);
        assert!(ship.lon > before);
        assert!(ship.sog_kn >= 0.0 && ship.sog_kn <= MAX_SOG_KN);
    }

    #[test]
    fn tank_levels_drift_and_clamp() {
        let mut ship = OwnShip::new(&base_cfg(), Utc::now());
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..20_000 {
            ship.tick(1.0, &mut rng);
        }
        assert!((0.0..=100.0).contains(&ship.tank_fresh_water));
        assert!((0.0..=100.0).contains(&ship.tank_fuel));
        assert!((0.0..=100.0).contains(&ship.tank_waste));
        assert_eq!(ship.tank_fresh_water, 0.0);
        assert_eq!(ship.tank_fuel, 0.0);
        assert_eq!(ship.tank_waste, 100.0);
    }

    #[test]
    fn sensors_stay_within_plausible_bounds() {
        let mut ship = OwnShip::new(&base_cfg(), Utc::now());
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..5_000 {
            ship.tick(1.0, &mut rng);
            assert!(ship.depth_m >= 0.0);
            assert!((-20.0..=50.0).contains(&ship.water_temp_c));
            assert!((0.0..=30.0).contains(&ship.battery_v));
        }
    }

    #[test]
    fn manual_ship_has_no_gpx_progress() {
        let ship = OwnShip::new(&base_cfg(), Utc::now());
        assert!(ship.gpx_progress().is_none());
    }

    #[test]
    fn cog_magnetic_applies_variation() {
        let cfg = SimConfig { cog_deg: 10.0, magvar_deg: 15.0, ..base_cfg() };
        let ship = OwnShip::new(&cfg, Utc::now());
        assert!((ship.cog_magnetic_deg() - 355.0).abs() < 1e-9);
    }
}
