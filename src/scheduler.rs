//! Tick scheduler (spec section 4.7).
//!
//! A dedicated worker that wakes on a monotonic cadence, advances own-ship
//! and fleet state, requests the ordered sentence batch from the codec, and
//! publishes it. Drift is handled by skipping ahead rather than bursting to
//! catch up.

use std::sync::Arc;
use std::time::Duration;

use log::warn;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use crate::codec::{ais, nmea};
use crate::fleet::Fleet;
use crate::gnss::{GnssSnapshot, GnssSynth};
use crate::ownship::OwnShip;
use crate::publisher::Publisher;
use crate::ring::StreamRing;

/// Drift tolerance before a late tick is logged: scheduling jitter under this
/// is normal OS-timer slop, not `SchedulerDrift` (spec section 7).
const DRIFT_WARN_THRESHOLD: Duration = Duration::from_millis(50);

/// The subset of engine state the scheduler mutates each tick, held behind
/// one short-lived lock (spec section 5, "shared-resource policy").
pub struct EngineState {
    pub ship: OwnShip,
    pub fleet: Fleet,
    pub gnss: GnssSynth,
    pub last_gnss: Option<GnssSnapshot>,
    pub ring: StreamRing,
    pub rng: StdRng,
    pub features: crate::config::FeatureFlags,
}

/// Build the ordered sentence batch for one tick (spec section 4.7, step 2).
fn build_batch(state: &mut EngineState) -> Vec<String> {
    let mut out = Vec::new();
    let ship = &state.ship;

    out.push(nmea::gprmc(&ship.clock, ship.lat, ship.lon, ship.sog_kn, ship.cog_deg, ship.magvar_deg));

    let snapshot = state.gnss.step(&mut state.rng);
    out.push(nmea::gpgga(
        &state.ship.clock,
        state.ship.lat,
        state.ship.lon,
        snapshot.used_count() as u32,
        snapshot.hdop,
        0.0,
        0.0,
    ));
    out.push(nmea::gpvtg(state.ship.cog_deg, state.ship.magvar_deg, state.ship.sog_kn));
    out.push(nmea::gpgsa(&snapshot));
    out.extend(nmea::gpgsv(&snapshot));
    state.last_gnss = Some(snapshot);

    if state.features.heading_enabled {
        out.push(nmea::hchdt(state.ship.cog_deg));
    }
    if state.features.wind_enabled {
        out.push(nmea::wimwd(state.ship.twd_deg, state.ship.magvar_deg, state.ship.tws_kn));
        let twa = crate::wind::relative_angle(state.ship.twd_deg, state.ship.cog_deg);
        out.push(nmea::wimwv(twa, state.ship.tws_kn, 'T'));
        let (aws, awa) =
            crate::wind::apparent_wind(state.ship.tws_kn, state.ship.twd_deg, state.ship.sog_kn, state.ship.cog_deg);
        out.push(nmea::wimwv(awa, aws, 'R'));
    }
    if state.features.depth_enabled {
        out.push(nmea::sddpt(state.ship.depth_m, state.ship.depth_offset_m));
        out.push(nmea::sddbt(state.ship.depth_m));
    }
    if state.features.water_temp_enabled {
        out.push(nmea::wimtw(state.ship.water_temp_c));
    }
    if state.features.battery_enabled {
        out.push(nmea::iixdr_voltage(state.ship.battery_v));
    }
    if state.features.air_temp_enabled {
        out.push(nmea::iixdr_air_temp(state.ship.air_temp_c));
    }
    if state.features.tanks_enabled {
        out.push(nmea::iixdr_tank(state.ship.tank_fresh_water, "FRESHWATER"));
        out.push(nmea::iixdr_tank(state.ship.tank_fuel, "FUEL"));
        out.push(nmea::iixdr_tank(state.ship.tank_waste, "WASTEWATER"));
    }

    for contact in &state.fleet.contacts {
        let bits = ais::pack_type18(
            contact.mmsi,
            contact.sog_kn,
            true,
            contact.lon,
            contact.lat,
            contact.cog_deg,
            None,
            (state.ship.clock.timestamp() % 60) as u8,
        );
        out.extend(ais::encode_bits(&bits, 'A', 0));
    }
    for contact in state.fleet.contacts.iter_mut().filter(|c| c.due_for_type24a()) {
        let bits = ais::pack_type24a(contact.mmsi, &contact.name);
        out.extend(ais::encode_bits(&bits, 'A', 0));
        contact.mark_type24a_sent();
    }

    out
}

/// Run the tick loop until `stop_rx` reports `true`. Exits after completing
/// whatever tick is in flight (spec section 5, "cancellation").
pub async fn run(
    state: Arc<Mutex<EngineState>>,
    publisher: Arc<Publisher>,
    interval_s: f64,
    mut stop_rx: tokio::sync::watch::Receiver<bool>,
) {
    let period = Duration::from_secs_f64(interval_s);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut expected_deadline = Instant::now() + period;

    loop {
        let deadline = interval.tick();
        tokio::select! {
            fired_at = deadline => {
                if fired_at > expected_deadline + DRIFT_WARN_THRESHOLD {
                    warn!(
                        "scheduler: tick fired {:?} behind schedule, skipping ahead",
                        fired_at - expected_deadline
                    );
                }
                expected_deadline = fired_at + period;
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    return;
                }
            }
        }
        if *stop_rx.borrow() {
            return;
        }

        let batch = {
            let mut guard = state.lock().await;
            let EngineState { ship, fleet, rng, .. } = &mut *guard;
            ship.tick(interval_s, rng);
            fleet.tick(interval_s, ship);
            build_batch(&mut guard)
        };

        publisher.publish(&batch).await;

        {
            let mut guard = state.lock().await;
            guard.ring.push_many(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ais::decode_type18;
    use rand::SeedableRng;

    fn base_state() -> EngineState {
        let cfg = crate::config::SimConfig {
            lat: 42.0,
            lon: -16.0,
            sog_kn: 5.0,
            cog_deg: 90.0,
            ..crate::config::SimConfig::default()
        };
        let ship = OwnShip::new(&cfg, chrono::Utc::now());
        let ais_cfg = crate::config::AisConfig { num_targets: 2, ..crate::config::AisConfig::default() };
        let mut rng = StdRng::seed_from_u64(9);
        let fleet = Fleet::new(&ais_cfg, &ship, None, None, &mut rng);
        EngineState {
            ship,
            fleet,
            gnss: GnssSynth::new(&mut rng),
            last_gnss: None,
            ring: StreamRing::default(),
            rng,
            features: crate::config::FeatureFlags {
                wind_enabled: true,
                heading_enabled: true,
                depth_enabled: true,
                water_temp_enabled: true,
                battery_enabled: true,
                air_temp_enabled: true,
                tanks_enabled: true,
            },
        }
    }

    #[test]
    fn build_batch_records_last_gnss_snapshot() {
        let mut state = base_state();
        assert!(state.last_gnss.is_none());
        build_batch(&mut state);
        assert!(state.last_gnss.is_some());
    }

    #[test]
    fn batch_begins_with_gprmc_and_includes_ais_for_every_contact() {
        let mut state = base_state();
        let batch = build_batch(&mut state);
        assert!(batch[0].starts_with("$GPRMC,"));
        let ais_lines: Vec<&String> = batch.iter().filter(|l| l.starts_with("!AIVDM")).collect();
        // 2 contacts -> at least 2 Type 18 lines (plus Type 24A on first due check).
        assert!(ais_lines.len() >= 2);
    }

    #[test]
    fn type18_lines_decode_to_plausible_fields() {
        let mut state = base_state();
        let batch = build_batch(&mut state);
        let mut decoded_any = false;
        for line in &batch {
            if !line.starts_with("!AIVDM") {
                continue;
            }
            let inner = &line[1..line.len() - 2];
            let fields: Vec<&str> = inner.split(',').collect();
            let payload = fields[5];
            let fill: u8 = fields[6].split('*').next().unwrap().parse().unwrap();
            if let Some(bits) = ais::decode_payload(payload, fill) {
                if let Some(f) = decode_type18(&bits) {
                    assert!(f.sog_kn >= 0.0);
                    decoded_any = true;
                }
            }
        }
        assert!(decoded_any);
    }
}
