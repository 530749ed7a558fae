//! ASCII NMEA 0183 talker sentence builders (spec section 4.1 table).
//!
//! Every function returns a complete `$...*HH\r\n` line. Inputs are plain
//! numbers/timestamps; these functions hold no state of their own.

use chrono::{DateTime, Utc};

use super::{format_date, format_lat, format_lon, format_time, frame};
use crate::gnss::GnssSnapshot;

/// `$GPRMC` — Recommended Minimum Navigation Information.
pub fn gprmc(t: &DateTime<Utc>, lat: f64, lon: f64, sog_kn: f64, cog_deg: f64, magvar_deg: f64) -> String {
    let (lat_s, lat_h) = format_lat(lat);
    let (lon_s, lon_h) = format_lon(lon);
    let (mv, mv_h) = signed_to_magnitude_hemi(magvar_deg, 'E', 'W');
    let body = format!(
        "GPRMC,{},A,{lat_s},{lat_h},{lon_s},{lon_h},{sog_kn:.1},{cog_deg:.1},{},{mv:.1},{mv_h},A",
        format_time(t),
        format_date(t),
    );
    frame('$', &body)
}

/// `$GPGGA` — Global Positioning System Fix Data.
pub fn gpgga(
    t: &DateTime<Utc>,
    lat: f64,
    lon: f64,
    sats_used: u32,
    hdop: f64,
    altitude_m: f64,
    geoid_sep_m: f64,
) -> String {
    let (lat_s, lat_h) = format_lat(lat);
    let (lon_s, lon_h) = format_lon(lon);
    let body = format!(
        "GPGGA,{},{lat_s},{lat_h},{lon_s},{lon_h},1,{sats_used:02},{hdop:.1},{altitude_m:.1},M,{geoid_sep_m:.1},M,,",
        format_time(t),
    );
    frame('$', &body)
}

/// `$GPVTG` — Course and Speed over Ground.
pub fn gpvtg(cog_true: f64, magvar_deg: f64, sog_kn: f64) -> String {
    let cog_mag = crate::geo::normalize_deg(cog_true - magvar_deg);
    let sog_kmh = crate::geo::kn_to_kmh(sog_kn);
    let body = format!("GPVTG,{cog_true:.1},T,{cog_mag:.1},M,{sog_kn:.1},N,{sog_kmh:.1},K,A");
    frame('$', &body)
}

/// `$GPGSA` — GNSS DOP and Active Satellites.
pub fn gpgsa(snapshot: &GnssSnapshot) -> String {
    let mut prn_fields = String::new();
    let used: Vec<&u8> = snapshot
        .satellites
        .iter()
        .filter(|s| s.used)
        .map(|s| &s.prn)
        .collect();
    for i in 0..12 {
        prn_fields.push(',');
        if let Some(prn) = used.get(i) {
            prn_fields.push_str(&format!("{prn:02}"));
        }
    }
    let body = format!(
        "GPGSA,A,3{prn_fields},{:.1},{:.1},{:.1}",
        snapshot.pdop, snapshot.hdop, snapshot.vdop
    );
    frame('$', &body)
}

/// `$GPGSV` — GNSS Satellites in View. Returns one sentence per group of up
/// to 4 satellites.
pub fn gpgsv(snapshot: &GnssSnapshot) -> Vec<String> {
    let total = snapshot.satellites.len();
    let total_msgs = total.div_ceil(4).max(1);
    let mut out = Vec::with_capacity(total_msgs);

    for msg_idx in 0..total_msgs {
        let mut fields = String::new();
        for sat in snapshot.satellites.iter().skip(msg_idx * 4).take(4) {
            fields.push_str(&format!(
                ",{:02},{:02},{:03},{:02}",
                sat.prn, sat.elevation_deg.round() as i32, sat.azimuth_deg.round() as i32, sat.snr_db.round() as i32
            ));
        }
        let body = format!("GPGSV,{total_msgs},{},{total:02}{fields}", msg_idx + 1);
        out.push(frame('$', &body));
    }
    out
}

/// `$WIMWD` — Wind Direction and Speed (true + magnetic).
pub fn wimwd(twd_deg: f64, magvar_deg: f64, tws_kn: f64) -> String {
    let twd_mag = crate::geo::normalize_deg(twd_deg - magvar_deg);
    let tws_ms = crate::geo::kn_to_ms(tws_kn);
    let body = format!("WIMWD,{twd_deg:.1},T,{twd_mag:.1},M,{tws_kn:.1},N,{tws_ms:.1},M");
    frame('$', &body)
}

/// `$WIMWV` — Wind Speed and Angle. `reference` is `'R'` for
/// relative/apparent or `'T'` for true.
pub fn wimwv(angle_deg: f64, speed_kn: f64, reference: char) -> String {
    let body = format!("WIMWV,{angle_deg:.1},{reference},{speed_kn:.1},N,A");
    frame('$', &body)
}

/// `$HCHDT` — Heading, True.
pub fn hchdt(heading_deg: f64) -> String {
    frame('$', &format!("HCHDT,{heading_deg:.1},T"))
}

/// `$SDDPT` — Depth of Water.
pub fn sddpt(depth_m: f64, offset_m: f64) -> String {
    frame('$', &format!("SDDPT,{depth_m:.1},{offset_m:.1}"))
}

/// `$SDDBT` — Depth Below Transducer (feet, meters, fathoms).
pub fn sddbt(depth_m: f64) -> String {
    let ft = crate::geo::m_to_ft(depth_m);
    let fa = crate::geo::m_to_fathoms(depth_m);
    frame('$', &format!("SDDBT,{ft:.1},f,{depth_m:.1},M,{fa:.1},F"))
}

/// `$WIMTW` — Water Temperature.
pub fn wimtw(temp_c: f64) -> String {
    frame('$', &format!("WIMTW,{temp_c:.1},C"))
}

/// `$IIXDR` — Transducer Measurement: battery voltage.
pub fn iixdr_voltage(volts: f64) -> String {
    frame('$', &format!("IIXDR,U,{volts:.2},V,MAIN"))
}

/// `$IIXDR` — Transducer Measurement: air temperature.
pub fn iixdr_air_temp(temp_c: f64) -> String {
    frame('$', &format!("IIXDR,C,{temp_c:.1},C,AIR"))
}

/// `$IIXDR` — Transducer Measurement: a tank level (percent full).
pub fn iixdr_tank(level_pct: f64, id: &str) -> String {
    frame('$', &format!("IIXDR,V,{level_pct:.1},P,{id}"))
}

fn signed_to_magnitude_hemi(v: f64, pos: char, neg: char) -> (f64, char) {
    if v >= 0.0 {
        (v, pos)
    } else {
        (-v, neg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gnss::Satellite;

    fn sample_snapshot() -> GnssSnapshot {
        GnssSnapshot {
            satellites: (1..=6)
                .map(|prn| Satellite { prn, elevation_deg: 45.0, azimuth_deg: 90.0, snr_db: 40.0, used: true })
                .collect(),
            pdop: 1.5,
            hdop: 1.0,
            vdop: 1.1,
            fix_quality: 1,
        }
    }

    #[test]
    fn gprmc_well_formed() {
        let t = DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let line = gprmc(&t, 42.71577, -16.23217, 5.0, 185.0, 2.5);
        assert!(line.starts_with("$GPRMC,"));
        assert!(line.ends_with("\r\n"));
        assert!(line.contains(",S,")); // negative lat -> south
        assert!(line.contains(",W,")); // negative lon -> west
    }

    #[test]
    fn gpgsv_splits_into_groups_of_four() {
        let lines = gpgsv(&sample_snapshot());
        assert_eq!(lines.len(), 2); // 6 sats -> 2 sentences
        assert!(lines[0].contains("GPGSV,2,1,06"));
        assert!(lines[1].contains("GPGSV,2,2,06"));
    }

    #[test]
    fn gpgsa_lists_used_prns() {
        let line = gpgsa(&sample_snapshot());
        assert!(line.contains("A,3,01,02,03,04,05,06"));
    }

    #[test]
    fn checksum_valid_for_every_builder() {
        let t = Utc::now();
        let lines = vec![
            gprmc(&t, 1.0, 1.0, 1.0, 1.0, 1.0),
            gpgga(&t, 1.0, 1.0, 6, 1.0, 1.0, 1.0),
            gpvtg(1.0, 1.0, 1.0),
            gpgsa(&sample_snapshot()),
            wimwd(1.0, 1.0, 1.0),
            wimwv(1.0, 1.0, 'T'),
            hchdt(1.0),
            sddpt(1.0, 1.0),
            sddbt(1.0),
            wimtw(1.0),
            iixdr_voltage(12.0),
        ];
        for line in lines {
            let inner = &line[1..line.len() - 2];
            let star = inner.rfind('*').unwrap();
            let (body, hex) = (&inner[..star], &inner[star + 1..]);
            assert_eq!(super::super::checksum_hex(body), hex, "line={line}");
        }
    }
}
