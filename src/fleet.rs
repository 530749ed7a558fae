//! AIS contact fleet (spec section 4.5).
//!
//! A fixed set of simulated vessels constructed at engine start/restart,
//! bound to the own-ship reference frame (or to the own-ship's GPX track)
//! and advanced one step per tick.

use rand::Rng;

use crate::config::{AisConfig, GpxAnchor, SimConfig};
use crate::geo::{dead_reckon, normalize_deg, LatLon};
use crate::gpx::Track;
use crate::ownship::OwnShip;

const MMSI_BASE: u32 = 999_000_000;
const TYPE24A_PERIOD_S: f64 = 60.0;

/// How a contact's position tracks the own-ship frame.
#[derive(Debug, Clone)]
enum Binding {
    Manual { bearing_offset_deg: f64, range_nm: f64 },
    GpxTime { track: Track, time_offset_s: f64, own_time_offset_s: f64 },
    GpxFraction { track: Track, index_offset_points: f64, fraction: f64 },
}

/// One simulated AIS target (spec section 3, "AIS contact").
#[derive(Debug, Clone)]
pub struct Contact {
    pub mmsi: u32,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    cog_offset_deg: f64,
    sog_offset_kn: f64,
    binding: Binding,
    seconds_since_24a: f64,
}

impl Contact {
    pub fn due_for_type24a(&self) -> bool {
        self.seconds_since_24a >= TYPE24A_PERIOD_S
    }

    pub fn mark_type24a_sent(&mut self) {
        self.seconds_since_24a = 0.0;
    }
}

/// The simulated fleet, constructed once per engine epoch (spec section
/// 4.5: "stable across ticks, re-seeded on restart").
#[derive(Debug, Clone)]
pub struct Fleet {
    pub contacts: Vec<Contact>,
}

impl Fleet {
    /// Build a fresh fleet from the AIS configuration block, binding each
    /// contact to the current own-ship pose.
    pub fn new<R: Rng>(cfg: &AisConfig, ship: &OwnShip, gpx: Option<(&Track, &GpxAnchor)>, name_pool: Option<&[String]>, rng: &mut R) -> Self {
        let mut contacts = Vec::with_capacity(cfg.num_targets as usize);
        for i in 0..cfg.num_targets {
            let mmsi = MMSI_BASE + i + 1;
            let name = name_pool
                .and_then(|pool| pool.get(i as usize % pool.len().max(1)))
                .cloned()
                .unwrap_or_else(|| format!("TARGET-{}", mmsi % 10_000));

            let cog_offset_deg = rng.gen_range(-cfg.max_cog_offset_deg..=cfg.max_cog_offset_deg);
            let sog_offset_kn = rng.gen_range(-cfg.max_sog_offset_kn..=cfg.max_sog_offset_kn);

            let binding = match gpx {
                Some((track, GpxAnchor::OffsetS(base_offset))) if track.has_time => {
                    let magnitude = rng.gen_range(30.0f64..=300.0);
                    let delta = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
                    Binding::GpxTime {
                        track: track.clone(),
                        time_offset_s: base_offset + delta,
                        own_time_offset_s: *base_offset,
                    }
                }
                Some((track, GpxAnchor::StartFraction(base_fraction))) => {
                    let n = track.points.len().max(1) as f64;
                    let delta_points = rng.gen_range(-50.0f64..=50.0);
                    let fraction = (base_fraction + delta_points / n).clamp(0.0, 1.0);
                    Binding::GpxFraction { track: track.clone(), index_offset_points: delta_points, fraction }
                }
                _ => {
                    let bearing_offset_deg = rng.gen_range(0.0..360.0);
                    let range_nm = rng.gen_range(0.0..=cfg.distribution_radius_nm);
                    Binding::Manual { bearing_offset_deg, range_nm }
                }
            };

            let (lat, lon, sog_kn, cog_deg) = Self::pose_from_binding(&binding, ship, cog_offset_deg, sog_offset_kn);

            contacts.push(Contact {
                mmsi,
                name,
                lat,
                lon,
                sog_kn,
                cog_deg,
                cog_offset_deg,
                sog_offset_kn,
                binding,
                seconds_since_24a: TYPE24A_PERIOD_S, // emit on first due check
            });
        }
        Self { contacts }
    }

    fn pose_from_binding(binding: &Binding, ship: &OwnShip, cog_offset_deg: f64, sog_offset_kn: f64) -> (f64, f64, f64, f64) {
        let cog_deg = normalize_deg(ship.cog_deg + cog_offset_deg);
        let sog_kn = (ship.sog_kn + sog_offset_kn).max(0.0);
        match binding {
            Binding::Manual { bearing_offset_deg, range_nm } => {
                let p = dead_reckon(LatLon { lat: ship.lat, lon: ship.lon }, *bearing_offset_deg, *range_nm);
                (p.lat, p.lon, sog_kn, cog_deg)
            }
            Binding::GpxTime { track, time_offset_s, .. } => {
                let p = track.position_at(*time_offset_s);
                let (sog, cog) = track.sog_cog_at(*time_offset_s);
                (p.lat, p.lon, sog, cog)
            }
            Binding::GpxFraction { track, fraction, .. } => {
                let p = track.position_at_fraction(*fraction);
                (p.lat, p.lon, sog_kn, track.cog_at_fraction(*fraction))
            }
        }
    }

    /// Advance every contact by `dt_s` seconds (spec section 4.5).
    pub fn tick(&mut self, dt_s: f64, ship: &OwnShip) {
        for c in &mut self.contacts {
            c.seconds_since_24a += dt_s;
            c.cog_deg = normalize_deg(ship.cog_deg + c.cog_offset_deg);
            c.sog_kn = (ship.sog_kn + c.sog_offset_kn).max(0.0);

            match &mut c.binding {
                Binding::Manual { .. } => {
                    let delta_nm = c.sog_kn * dt_s / 3600.0;
                    let p = dead_reckon(LatLon { lat: c.lat, lon: c.lon }, c.cog_deg, delta_nm);
                    c.lat = p.lat;
                    c.lon = p.lon;
                }
                Binding::GpxTime { track, time_offset_s, .. } => {
                    *time_offset_s += dt_s;
                    let p = track.position_at(*time_offset_s);
                    let (sog, cog) = track.sog_cog_at(*time_offset_s);
                    c.lat = p.lat;
                    c.lon = p.lon;
                    c.sog_kn = sog;
                    c.cog_deg = cog;
                }
                Binding::GpxFraction { track, fraction, .. } => {
                    let delta_nm = c.sog_kn * dt_s / 3600.0;
                    let delta_fraction = if track.length_nm > 0.0 { delta_nm / track.length_nm } else { 0.0 };
                    *fraction = (*fraction + delta_fraction).clamp(0.0, 1.0);
                    let p = track.position_at_fraction(*fraction);
                    c.lat = p.lat;
                    c.lon = p.lon;
                    c.cog_deg = track.cog_at_fraction(*fraction);
                }
            }
        }
    }
}

/// Build the own-ship-relative or GPX-relative binding inputs for
/// [`Fleet::new`] from a [`SimConfig`].
pub fn gpx_anchor_ref(cfg: &SimConfig) -> Option<(&Track, &GpxAnchor)> {
    match (&cfg.gpx_track, &cfg.gpx_anchor) {
        (Some(t), Some(a)) => Some((t, a)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ship() -> OwnShip {
        let cfg = SimConfig { lat: 42.0, lon: -16.0, sog_kn: 5.0, cog_deg: 90.0, ..SimConfig::default() };
        OwnShip::new(&cfg, chrono::Utc::now())
    }

    #[test]
    fn fleet_assigns_deterministic_sequential_mmsi() {
        let ais = AisConfig { num_targets: 3, ..AisConfig::default() };
        let mut rng = StdRng::seed_from_u64(7);
        let fleet = Fleet::new(&ais, &ship(), None, None, &mut rng);
        let mmsis: Vec<u32> = fleet.contacts.iter().map(|c| c.mmsi).collect();
        assert_eq!(mmsis, vec![999_000_001, 999_000_002, 999_000_003]);
    }

    #[test]
    fn fleet_names_fall_back_to_mmsi_suffix() {
        let ais = AisConfig { num_targets: 1, ..AisConfig::default() };
        let mut rng = StdRng::seed_from_u64(7);
        let fleet = Fleet::new(&ais, &ship(), None, None, &mut rng);
        assert!(fleet.contacts[0].name.starts_with("TARGET-"));
    }

    #[test]
    fn fleet_names_use_pool_when_provided() {
        let ais = AisConfig { num_targets: 2, ..AisConfig::default() };
        let pool = vec!["SEA BREEZE".to_string(), "NORTH STAR".to_string()];
        let mut rng = StdRng::seed_from_u64(7);
        let fleet = Fleet::new(&ais, &ship(), None, Some(&pool), &mut rng);
        assert_eq!(fleet.contacts[0].name, "SEA BREEZE");
        assert_eq!(fleet.contacts[1].name, "NORTH STAR");
    }

    #[test]
    fn contacts_become_due_for_type24a_after_sixty_seconds() {
        let ais = AisConfig { num_targets: 1, ..AisConfig::default() };
        let mut rng = StdRng::seed_from_u64(7);
        let mut fleet = Fleet::new(&ais, &ship(), None, None, &mut rng);
        assert!(fleet.contacts[0].due_for_type24a());
        fleet.contacts[0].mark_type24a_sent();
        assert!(!fleet.contacts[0].due_for_type24a());
        let s = ship();
        for _ in 0..59 {
            fleet.tick(1.0, &s);
        }
        assert!(!fleet.contacts[0].due_for_type24a());
        fleet.tick(1.0, &s);
        assert!(fleet.contacts[0].due_for_type24a());
    }

    #[test]
    fn contact_sog_never_negative() {
        let ais = AisConfig { num_targets: 5, max_sog_offset_kn: 100.0, ..AisConfig::default() };
        let mut rng = StdRng::seed_from_u64(7);
        let mut fleet = Fleet::new(&ais, &ship(), None, None, &mut rng);
        let s = ship();
        fleet.tick(1.0, &s);
        assert!(fleet.contacts.iter().all(|c| c.sog_kn >= 0.0));
    }
}
