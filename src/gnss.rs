//! GNSS constellation synthesizer (spec section 4.6).
//!
//! Produces a plausible set of satellites in view, SNRs, DOPs, and the used
//! subset consistent with GPGGA/GSA/GSV, with PRNs that persist across
//! ticks and churn slowly so a consumer sees a believable sky, not random
//! noise every second.

use rand::Rng;

const MIN_PRN: u8 = 1;
const MAX_PRN: u8 = 32;
const MIN_IN_VIEW: usize = 8;
const MAX_IN_VIEW: usize = 14;
const MIN_USED: usize = 6;
const MAX_USED: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Satellite {
    pub prn: u8,
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub snr_db: f64,
    pub used: bool,
}

/// Everything GPGGA/GSA/GSV need for one tick (spec section 3, "GNSS
/// snapshot"). Derived fresh per tick; not persisted between ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct GnssSnapshot {
    pub satellites: Vec<Satellite>,
    pub pdop: f64,
    pub hdop: f64,
    pub vdop: f64,
    pub fix_quality: u8,
}

impl GnssSnapshot {
    pub fn used_count(&self) -> usize {
        self.satellites.iter().filter(|s| s.used).count()
    }
}

/// Stateful PRN churn so the constellation looks continuous tick-to-tick.
#[derive(Debug, Clone)]
pub struct GnssSynth {
    prns: Vec<u8>,
}

impl GnssSynth {
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let n = rng.gen_range(MIN_IN_VIEW..=MAX_IN_VIEW);
        let prns = sample_distinct_prns(rng, n, &[]);
        Self { prns }
    }

    /// Advance the constellation by one tick and return the snapshot.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> GnssSnapshot {
        self.churn(rng);

        let mut satellites: Vec<Satellite> = self
            .prns
            .iter()
            .map(|&prn| Satellite {
                prn,
                elevation_deg: rng.gen_range(5.0..=85.0),
                azimuth_deg: rng.gen_range(0.0..360.0),
                snr_db: rng.gen_range(20.0..=48.0),
                used: false,
            })
            .collect();

        let used_n = rng.gen_range(MIN_USED..=MAX_USED).min(satellites.len());
        let mut used_idx: Vec<usize> = (0..satellites.len()).collect();
        // Fisher-Yates partial shuffle to pick `used_n` distinct indices.
        for i in 0..used_n {
            let j = rng.gen_range(i..used_idx.len());
            used_idx.swap(i, j);
        }
        let used_set: std::collections::HashSet<usize> = used_idx[..used_n].iter().copied().collect();

        for (i, sat) in satellites.iter_mut().enumerate() {
            sat.used = used_set.contains(&i);
        }

        // HDOP in a typical range; PDOP^2 ~= HDOP^2 + VDOP^2 keeps the trio
        // mutually consistent per spec section 4.6.
        let hdop: f64 = rng.gen_range(0.6..=2.5);
        let vdop: f64 = hdop * rng.gen_range(0.9..=1.3);
        let pdop = (hdop * hdop + vdop * vdop).sqrt();

        GnssSnapshot {
            satellites,
            pdop,
            hdop,
            vdop,
            fix_quality: if used_n > 0 { 1 } else { 0 },
        }
    }

    fn churn<R: Rng>(&mut self, rng: &mut R) {
        // Occasionally drop a satellite below the horizon and bring up a
        // fresh one, keeping the in-view count in range.
        if rng.gen_bool(0.1) && self.prns.len() > MIN_IN_VIEW {
            let idx = rng.gen_range(0..self.prns.len());
            self.prns.remove(idx);
        }
        if rng.gen_bool(0.1) && self.prns.len() < MAX_IN_VIEW {
            let fresh = sample_distinct_prns(rng, 1, &self.prns);
            self.prns.extend(fresh);
        }
    }
}

fn sample_distinct_prns<R: Rng>(rng: &mut R, n: usize, exclude: &[u8]) -> Vec<u8> {
    let mut pool: Vec<u8> = (MIN_PRN..=MAX_PRN).filter(|p| !exclude.contains(p)).collect();
    let mut out = Vec::with_capacity(n);
    for _ in 0..n.min(pool.len()) {
        let idx = rng.gen_range(0..pool.len());
        out.push(pool.remove(idx));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn snapshot_counts_within_spec_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut synth = GnssSynth::new(&mut rng);
        for _ in 0..50 {
            let snap = synth.step(&mut rng);
            assert!(snap.satellites.len() >= MIN_IN_VIEW - 2 && snap.satellites.len() <= MAX_IN_VIEW + 2);
            assert!(snap.used_count() <= snap.satellites.len());
            assert!(snap.hdop >= 0.5 && snap.hdop <= 3.0);
            let expected_pdop = (snap.hdop * snap.hdop + snap.vdop * snap.vdop).sqrt();
            assert!((snap.pdop - expected_pdop).abs() < 1e-9);
        }
    }
}
