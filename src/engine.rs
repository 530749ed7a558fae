//! The engine: single owning actor for the whole simulation (spec section
//! 9, design note "one owning actor").
//!
//! Generalizes the teacher's `Arc<ClientConfig>` + restart-loop-in-`main`
//! shape (see `examples/optim-enterprises-bv-ac-client/src/main.rs`) into
//! one value with lifecycle methods.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::{FeatureFlags, SimConfig};
use crate::error::{EngineError, Result};
use crate::fleet::{self, Fleet};
use crate::gnss::{GnssSnapshot, GnssSynth};
use crate::ownship::{GpxProgress, OwnShip};
use crate::publisher::{ClientInfo, Publisher};
use crate::ring::StreamRing;
use crate::scheduler::{self, EngineState};

/// Lifecycle phase (spec section 4.7: Idle → Starting → Running →
/// Stopping → Idle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
}

/// Immutable point-in-time view returned by `status()` and used as the
/// `{ok, snapshot}` payload for lifecycle transitions (spec section 6,
/// "status() contract").
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub phase: Phase,
    pub started_at: Option<DateTime<Utc>>,
    pub sim_time: Option<DateTime<Utc>>,

    pub udp_host: String,
    pub udp_port: u16,
    pub tcp_host: String,
    pub tcp_port: u16,

    pub lat: f64,
    pub lon: f64,
    pub sog_kn: f64,
    pub cog_deg: f64,
    pub magvar_deg: f64,
    pub tws_kn: f64,
    pub twd_deg: f64,

    pub depth_m: f64,
    pub water_temp_c: f64,
    pub air_temp_c: f64,
    pub battery_v: f64,
    pub tank_fresh_water: f64,
    pub tank_fuel: f64,
    pub tank_waste: f64,

    pub features: FeatureFlags,
    pub gnss: Option<GnssSnapshot>,

    pub num_contacts: usize,
    pub contact_mmsis: Vec<u32>,

    pub clients: Vec<ClientInfo>,
    pub ring_len: usize,
    pub interval_s: f64,
    pub gpx_progress: Option<GpxProgress>,
}

struct RunningHandle {
    state: Arc<Mutex<EngineState>>,
    publisher: Arc<Publisher>,
    stop_tx: watch::Sender<bool>,
    scheduler_task: JoinHandle<()>,
    interval_s: f64,
    started_at: DateTime<Utc>,
    udp_host: String,
    udp_port: u16,
    tcp_host: String,
    tcp_port: u16,
}

/// The single owning actor for a running (or stopped) simulation. Holds no
/// state directly while idle; `start`/`restart` build a fresh
/// [`EngineState`] and spawn the scheduler task.
pub struct Engine {
    running: Mutex<Option<RunningHandle>>,
    name_pool: Option<Vec<String>>,
}

impl Engine {
    pub fn new(name_pool: Option<Vec<String>>) -> Self {
        Self { running: Mutex::new(None), name_pool }
    }

    /// Transition Idle → Starting → Running. Errors with `AlreadyRunning`
    /// if a simulation is already active.
    pub async fn start(&self, cfg: SimConfig) -> Result<Snapshot> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        crate::config::validate_config(&cfg)?;

        let start_clock = cfg.start_datetime.unwrap_or_else(chrono::Utc::now);
        let mut rng = match cfg.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let ship = OwnShip::new(&cfg, start_clock);
        let gpx_ref = fleet::gpx_anchor_ref(&cfg);
        let name_pool_slice = self.name_pool.as_deref();
        let fleet = Fleet::new(&cfg.ais, &ship, gpx_ref, name_pool_slice, &mut rng);
        let gnss = GnssSynth::new(&mut rng);

        let publisher =
            Arc::new(Publisher::bind(&cfg.udp_host, cfg.udp_port, &cfg.tcp_host, cfg.tcp_port).await?);

        let state = Arc::new(Mutex::new(EngineState {
            ship,
            fleet,
            gnss,
            last_gnss: None,
            ring: StreamRing::default(),
            rng,
            features: cfg.features.clone(),
        }));

        let (stop_tx, stop_rx) = watch::channel(false);
        let interval_s = cfg.interval_s;
        let scheduler_task =
            tokio::spawn(scheduler::run(Arc::clone(&state), Arc::clone(&publisher), interval_s, stop_rx));

        info!("engine: started (interval={interval_s}s, targets={})", cfg.ais.num_targets);

        let started_at = Utc::now();
        let snapshot = Self::snapshot_of(
            &state,
            &publisher,
            Phase::Running,
            interval_s,
            Some(started_at),
            &cfg.udp_host,
            cfg.udp_port,
            &cfg.tcp_host,
            cfg.tcp_port,
        )
        .await;
        *running = Some(RunningHandle {
            state,
            publisher,
            stop_tx,
            scheduler_task,
            interval_s,
            started_at,
            udp_host: cfg.udp_host.clone(),
            udp_port: cfg.udp_port,
            tcp_host: cfg.tcp_host.clone(),
            tcp_port: cfg.tcp_port,
        });
        Ok(snapshot)
    }

    /// Transition Running → Stopping → Idle. The worker completes its
    /// in-flight tick before exiting.
    pub async fn stop(&self) -> Result<Snapshot> {
        let mut running = self.running.lock().await;
        let handle = running.take().ok_or(EngineError::NotRunning)?;

        let snapshot = Self::snapshot_of(
            &handle.state,
            &handle.publisher,
            Phase::Idle,
            handle.interval_s,
            Some(handle.started_at),
            &handle.udp_host,
            handle.udp_port,
            &handle.tcp_host,
            handle.tcp_port,
        )
        .await;
        let _ = handle.stop_tx.send(true);
        let _ = handle.scheduler_task.await;
        info!("engine: stopped");
        Ok(snapshot)
    }

    /// `stop()` then `start(config)`, atomic from the caller's perspective
    /// and idempotent against rapid repeats (spec section 5,
    /// "cancellation").
    pub async fn restart(&self, cfg: SimConfig) -> Result<Snapshot> {
        {
            let mut running = self.running.lock().await;
            if let Some(handle) = running.take() {
                let _ = handle.stop_tx.send(true);
                let _ = handle.scheduler_task.await;
            }
        }
        self.start(cfg).await
    }

    /// Current lifecycle snapshot. Takes a short lock, copies fields out,
    /// and returns (spec section 4.7: "never block the scheduler beyond a
    /// tick's slack").
    pub async fn status(&self) -> Snapshot {
        let running = self.running.lock().await;
        match running.as_ref() {
            Some(handle) => {
                Self::snapshot_of(
                    &handle.state,
                    &handle.publisher,
                    Phase::Running,
                    handle.interval_s,
                    Some(handle.started_at),
                    &handle.udp_host,
                    handle.udp_port,
                    &handle.tcp_host,
                    handle.tcp_port,
                )
                .await
            }
            None => Snapshot {
                phase: Phase::Idle,
                started_at: None,
                sim_time: None,
                udp_host: String::new(),
                udp_port: 0,
                tcp_host: String::new(),
                tcp_port: 0,
                lat: 0.0,
                lon: 0.0,
                sog_kn: 0.0,
                cog_deg: 0.0,
                magvar_deg: 0.0,
                tws_kn: 0.0,
                twd_deg: 0.0,
                depth_m: 0.0,
                water_temp_c: 0.0,
                air_temp_c: 0.0,
                battery_v: 0.0,
                tank_fresh_water: 0.0,
                tank_fuel: 0.0,
                tank_waste: 0.0,
                features: FeatureFlags::default(),
                gnss: None,
                num_contacts: 0,
                contact_mmsis: Vec::new(),
                clients: Vec::new(),
                ring_len: 0,
                interval_s: 0.0,
                gpx_progress: None,
            },
        }
    }

    /// The most recent `limit` emitted lines.
    pub async fn get_stream(&self, limit: usize) -> Vec<String> {
        let running = self.running.lock().await;
        match running.as_ref() {
            Some(handle) => handle.state.lock().await.ring.snapshot(limit),
            None => Vec::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn snapshot_of(
        state: &Arc<Mutex<EngineState>>,
        publisher: &Arc<Publisher>,
        phase: Phase,
        interval_s: f64,
        started_at: Option<DateTime<Utc>>,
        udp_host: &str,
        udp_port: u16,
        tcp_host: &str,
        tcp_port: u16,
    ) -> Snapshot {
        let guard = state.lock().await;
        Snapshot {
            phase,
            started_at,
            sim_time: Some(guard.ship.clock),
            udp_host: udp_host.to_string(),
            udp_port,
            tcp_host: tcp_host.to_string(),
            tcp_port,
            lat: guard.ship.lat,
            lon: guard.ship.lon,
            sog_kn: guard.ship.sog_kn,
            cog_deg: guard.ship.cog_deg,
            magvar_deg: guard.ship.magvar_deg,
            tws_kn: guard.ship.tws_kn,
            twd_deg: guard.ship.twd_deg,
            depth_m: guard.ship.depth_m,
            water_temp_c: guard.ship.water_temp_c,
            air_temp_c: guard.ship.air_temp_c,
            battery_v: guard.ship.battery_v,
            tank_fresh_water: guard.ship.tank_fresh_water,
            tank_fuel: guard.ship.tank_fuel,
            tank_waste: guard.ship.tank_waste,
            features: guard.features.clone(),
            gnss: guard.last_gnss.clone(),
            num_contacts: guard.fleet.contacts.len(),
            contact_mmsis: guard.fleet.contacts.iter().map(|c| c.mmsi).collect(),
            clients: publisher.client_snapshot(),
            ring_len: guard.ring.len(),
            interval_s,
            gpx_progress: guard.ship.gpx_progress(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_then_start_again_errors_already_running() {
        let engine = Engine::new(None);
        let cfg =
            SimConfig { udp_port: 21100, tcp_port: 0, rng_seed: Some(1), ..SimConfig::default() };
        let result = engine.start(cfg.clone()).await;
        assert!(result.is_ok());
        let second = engine.start(cfg).await;
        assert!(matches!(second, Err(EngineError::AlreadyRunning)));
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_start_errors_not_running() {
        let engine = Engine::new(None);
        assert!(matches!(engine.stop().await, Err(EngineError::NotRunning)));
    }

    #[tokio::test]
    async fn status_reports_idle_before_start() {
        let engine = Engine::new(None);
        let snap = engine.status().await;
        assert_eq!(snap.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn snapshot_surfaces_endpoints_and_started_at() {
        let engine = Engine::new(None);
        let cfg = SimConfig {
            udp_port: 21101,
            tcp_port: 0,
            udp_host: "192.168.1.5".to_string(),
            rng_seed: Some(1),
            ..SimConfig::default()
        };
        let snap = engine.start(cfg).await.unwrap();
        assert!(snap.started_at.is_some());
        assert!(snap.sim_time.is_some());
        assert_eq!(snap.udp_host, "192.168.1.5");
        assert_eq!(snap.udp_port, 21101);
        engine.stop().await.unwrap();
    }
}
