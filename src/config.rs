//! Simulation engine configuration.
//!
//! Parses a flat `key = value` configuration file, same format and loader
//! shape the rest of this codebase's ancestry uses for its daemon configs.
//! A [`SimConfig`] is the record the control plane hands to
//! [`crate::engine::Engine::start`] / `restart`; it is never mutated in
//! place — a new one is built and swapped in wholesale.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::gpx::Track;

// Defaults (spec section 6)
const UDP_PORT:     u16 = 10110;
const TCP_PORT:     u16 = 10111;
const INTERVAL_S:   f64 = 1.0;
const AIS_COG_OFF:  f64 = 20.0;
const AIS_SOG_OFF:  f64 = 2.0;
const AIS_RADIUS_NM: f64 = 1.0;

/// Which GPX time anchor a run starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GpxAnchor {
    /// Seconds into a timed track.
    OffsetS(f64),
    /// Fractional position (by arc length) into an untimed track, in [0, 1].
    StartFraction(f64),
}

/// AIS fleet generation parameters (spec section 4.5).
#[derive(Debug, Clone)]
pub struct AisConfig {
    pub num_targets: u32,
    pub max_cog_offset_deg: f64,
    pub max_sog_offset_kn: f64,
    pub distribution_radius_nm: f64,
}

impl Default for AisConfig {
    fn default() -> Self {
        Self {
            num_targets: 0,
            max_cog_offset_deg: AIS_COG_OFF,
            max_sog_offset_kn: AIS_SOG_OFF,
            distribution_radius_nm: AIS_RADIUS_NM,
        }
    }
}

/// Which sensor groups the codec should emit.
#[derive(Debug, Clone, Default)]
pub struct FeatureFlags {
    pub wind_enabled: bool,
    pub heading_enabled: bool,
    pub depth_enabled: bool,
    pub water_temp_enabled: bool,
    pub battery_enabled: bool,
    pub air_temp_enabled: bool,
    pub tanks_enabled: bool,
}

/// Full engine configuration (spec section 6, "Configuration record").
#[derive(Debug, Clone)]
pub struct SimConfig {
    // ── Publisher endpoints ───────────────────────────────────────────────
    pub udp_host: String,
    pub udp_port: u16,
    pub tcp_host: String,
    pub tcp_port: u16,

    // ── Timebase ──────────────────────────────────────────────────────────
    pub interval_s: f64,
    pub start_datetime: Option<chrono::DateTime<chrono::Utc>>,

    // ── Initial own-ship state ───────────────────────────────────────────
    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    pub magvar_deg: f64,

    // ── Wind ──────────────────────────────────────────────────────────────
    pub tws_kn: f64,
    pub twd_deg: f64,

    // ── Environmentals ────────────────────────────────────────────────────
    pub depth_m: f64,
    pub depth_offset_m: f64,
    pub water_temp_c: f64,
    pub battery_v: f64,
    pub air_temp_c: f64,
    pub tank_fresh_water: f64,
    pub tank_fuel: f64,
    pub tank_waste: f64,

    pub features: FeatureFlags,

    // ── AIS ───────────────────────────────────────────────────────────────
    pub ais: AisConfig,

    // ── GPX ───────────────────────────────────────────────────────────────
    pub gpx_track: Option<Track>,
    pub gpx_anchor: Option<GpxAnchor>,

    // ── RNG ───────────────────────────────────────────────────────────────
    /// Seed for the deterministic jitter RNG. `None` seeds from entropy.
    pub rng_seed: Option<u64>,

    // ── Process (ambient, mirrors the teacher's daemon fields) ───────────
    pub pid_file: Option<std::path::PathBuf>,
    pub log_syslog: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            udp_host: "127.0.0.1".to_string(),
            udp_port: UDP_PORT,
            tcp_host: "0.0.0.0".to_string(),
            tcp_port: TCP_PORT,
            interval_s: INTERVAL_S,
            start_datetime: None,
            lat: 0.0,
            lon: 0.0,
            sog_kn: 0.0,
            cog_deg: 0.0,
            magvar_deg: 0.0,
            tws_kn: 0.0,
            twd_deg: 0.0,
            depth_m: 10.0,
            depth_offset_m: 0.0,
            water_temp_c: 15.0,
            battery_v: 12.6,
            air_temp_c: 18.0,
            tank_fresh_water: 100.0,
            tank_fuel: 100.0,
            tank_waste: 0.0,
            features: FeatureFlags::default(),
            ais: AisConfig::default(),
            gpx_track: None,
            gpx_anchor: None,
            rng_seed: None,
            pid_file: None,
            log_syslog: false,
        }
    }
}

/// Parse `path` as a `key = value` configuration file.
///
/// `gpx_track_path`, if present, is read and parsed into a [`Track`]
/// immediately (the control plane normally hands over an already-parsed
/// track; this loader exists so the bundled CLI binary can exercise the
/// engine directly against a file on disk).
pub fn load_config(path: &Path) -> Result<SimConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| EngineError::ConfigInvalid(format!("cannot read {}: {e}", path.display())))?;
    let mut cfg = SimConfig::default();
    let mut gpx_track_path: Option<std::path::PathBuf> = None;
    let mut gpx_offset_s: Option<f64> = None;
    let mut gpx_start_fraction: Option<f64> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let key = match parts.next() {
            Some(k) => k.trim().to_ascii_lowercase(),
            None => continue,
        };
        let val = match parts.next() {
            Some(v) => v.trim().to_string(),
            None => continue,
        };
        if val.is_empty() {
            continue;
        }

        match key.as_str() {
            "udp_host" => cfg.udp_host = val,
            "udp_port" => cfg.udp_port = val.parse().unwrap_or(UDP_PORT),
            "tcp_host" => cfg.tcp_host = val,
            "tcp_port" => cfg.tcp_port = val.parse().unwrap_or(0),
            "interval_s" => cfg.interval_s = val.parse().unwrap_or(INTERVAL_S),
            "start_datetime" => cfg.start_datetime = parse_start_datetime(&val),
            "lat" => cfg.lat = val.parse().unwrap_or(0.0),
            "lon" => cfg.lon = val.parse().unwrap_or(0.0),
            "sog_kn" => cfg.sog_kn = val.parse().unwrap_or(0.0),
            "cog_deg" => cfg.cog_deg = val.parse().unwrap_or(0.0),
            "magvar_deg" => cfg.magvar_deg = val.parse().unwrap_or(0.0),
            "wind_enabled" => cfg.features.wind_enabled = is_truthy(&val),
            "tws_kn" => cfg.tws_kn = val.parse().unwrap_or(0.0),
            "twd_deg" => cfg.twd_deg = val.parse().unwrap_or(0.0),
            "heading_enabled" => cfg.features.heading_enabled = is_truthy(&val),
            "depth_enabled" => cfg.features.depth_enabled = is_truthy(&val),
            "depth_m" => cfg.depth_m = val.parse().unwrap_or(10.0),
            "depth_offset_m" => cfg.depth_offset_m = val.parse().unwrap_or(0.0),
            "water_temp_enabled" => cfg.features.water_temp_enabled = is_truthy(&val),
            "water_temp_c" => cfg.water_temp_c = val.parse().unwrap_or(15.0),
            "battery_enabled" => cfg.features.battery_enabled = is_truthy(&val),
            "battery_v" => cfg.battery_v = val.parse().unwrap_or(12.6),
            "air_temp_enabled" => cfg.features.air_temp_enabled = is_truthy(&val),
            "air_temp_c" => cfg.air_temp_c = val.parse().unwrap_or(18.0),
            "tanks_enabled" => cfg.features.tanks_enabled = is_truthy(&val),
            "tank_fresh_water" => cfg.tank_fresh_water = val.parse().unwrap_or(100.0),
            "tank_fuel" => cfg.tank_fuel = val.parse().unwrap_or(100.0),
            "tank_waste" => cfg.tank_waste = val.parse().unwrap_or(0.0),
            "ais_num_targets" => cfg.ais.num_targets = val.parse().unwrap_or(0),
            "ais_max_cog_offset" => cfg.ais.max_cog_offset_deg = val.parse().unwrap_or(AIS_COG_OFF),
            "ais_max_sog_offset" => cfg.ais.max_sog_offset_kn = val.parse().unwrap_or(AIS_SOG_OFF),
            "ais_distribution_radius_nm" => {
                cfg.ais.distribution_radius_nm = val.parse().unwrap_or(AIS_RADIUS_NM)
            }
            "gpx_track_path" => gpx_track_path = Some(std::path::PathBuf::from(&val)),
            "gpx_offset_s" => gpx_offset_s = val.parse().ok(),
            "gpx_start_fraction" => gpx_start_fraction = val.parse().ok(),
            "rng_seed" => cfg.rng_seed = val.parse().ok(),
            "pid_file" => cfg.pid_file = Some(std::path::PathBuf::from(&val)),
            "log_syslog" => cfg.log_syslog = is_truthy(&val),
            _ => {} // ignore unknown keys
        }
    }

    if let Some(track_path) = gpx_track_path {
        let bytes = fs::read(&track_path).map_err(|e| {
            EngineError::ConfigInvalid(format!("cannot read {}: {e}", track_path.display()))
        })?;
        let track = Track::parse(&bytes).map_err(|e| EngineError::GpxInvalid(e.to_string()))?;
        cfg.gpx_track = Some(track);
    }

    cfg.gpx_anchor = match (gpx_offset_s, gpx_start_fraction) {
        (Some(s), None) => Some(GpxAnchor::OffsetS(s)),
        (None, Some(f)) => Some(GpxAnchor::StartFraction(f)),
        (None, None) => None,
        (Some(_), Some(_)) => {
            return Err(EngineError::ConfigInvalid(
                "gpx_offset_s and gpx_start_fraction are mutually exclusive".into(),
            ))
        }
    };

    Ok(cfg)
}

fn is_truthy(v: &str) -> bool {
    matches!(v, "true" | "1" | "yes")
}

fn parse_start_datetime(val: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(val) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    // Bare "YYYY-MM-DDTHH:MM:SS" with no timezone: assume UTC.
    chrono::NaiveDateTime::parse_from_str(val, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
}

/// Validate a configuration record before it is handed to the engine.
/// Never mutates; only inspects.
pub fn validate_config(cfg: &SimConfig) -> Result<()> {
    if !(-90.0..=90.0).contains(&cfg.lat) {
        return Err(EngineError::ConfigInvalid(format!("lat {} out of range", cfg.lat)));
    }
    if !(-180.0..=180.0).contains(&cfg.lon) {
        return Err(EngineError::ConfigInvalid(format!("lon {} out of range", cfg.lon)));
    }
    if cfg.interval_s <= 0.0 {
        return Err(EngineError::ConfigInvalid("interval_s must be > 0".into()));
    }
    if cfg.gpx_anchor.is_some() && cfg.gpx_track.is_none() {
        return Err(EngineError::ConfigInvalid(
            "gpx_offset_s/gpx_start_fraction given without a gpx_track".into(),
        ));
    }
    if let (Some(track), Some(anchor)) = (&cfg.gpx_track, &cfg.gpx_anchor) {
        match anchor {
            GpxAnchor::OffsetS(_) if !track.has_time => {
                return Err(EngineError::ConfigInvalid(
                    "gpx_offset_s requires a timed GPX track".into(),
                ));
            }
            GpxAnchor::StartFraction(f) if !(0.0..=1.0).contains(f) => {
                return Err(EngineError::ConfigInvalid(
                    "gpx_start_fraction must be in [0, 1]".into(),
                ));
            }
            GpxAnchor::StartFraction(_) if track.has_time => {
                return Err(EngineError::ConfigInvalid(
                    "gpx_start_fraction requires an untimed GPX track".into(),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SimConfig::default();
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_bad_latitude() {
        let cfg = SimConfig { lat: 200.0, ..SimConfig::default() };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_bad_longitude() {
        let cfg = SimConfig { lon: 200.0, ..SimConfig::default() };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_zero_interval() {
        let cfg = SimConfig { interval_s: 0.0, ..SimConfig::default() };
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn parses_key_value_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("nmea-emulator-test-{}.conf", std::process::id()));
        std::fs::write(
            &path,
            "udp_port = 20000\nlat = 42.5\nwind_enabled = true\ntws_kn = 12\n",
        )
        .unwrap();
        let cfg = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.udp_port, 20000);
        assert_eq!(cfg.lat, 42.5);
        assert!(cfg.features.wind_enabled);
        assert_eq!(cfg.tws_kn, 12.0);
    }
}
