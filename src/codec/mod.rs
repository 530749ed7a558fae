//! Sentence codec: pure functions producing ASCII NMEA sentences and
//! AIS AIVDM fragments from numeric inputs (spec section 4.1).

pub mod ais;
pub mod bits;
pub mod nmea;

use chrono::{DateTime, Utc};

/// XOR checksum of every byte between `$`/`!` and `*`, as two uppercase hex
/// digits.
pub fn checksum_hex(body: &str) -> String {
    let cs = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("{cs:02X}")
}

/// Wrap a sentence body (without the leading `$`/`!` or trailing
/// `*HH\r\n`) into a complete NMEA line.
pub fn frame(prefix: char, body: &str) -> String {
    format!("{prefix}{body}*{}\r\n", checksum_hex(body))
}

/// Format latitude as `DDMM.mmmm` + hemisphere letter.
pub fn format_lat(lat: f64) -> (String, char) {
    let hemi = if lat >= 0.0 { 'N' } else { 'S' };
    let lat = lat.abs();
    let deg = lat.trunc() as u32;
    let min = (lat.fract()) * 60.0;
    (format!("{deg:02}{min:07.4}"), hemi)
}

/// Format longitude as `DDDMM.mmmm` + hemisphere letter.
pub fn format_lon(lon: f64) -> (String, char) {
    let hemi = if lon >= 0.0 { 'E' } else { 'W' };
    let lon = lon.abs();
    let deg = lon.trunc() as u32;
    let min = (lon.fract()) * 60.0;
    (format!("{deg:03}{min:07.4}"), hemi)
}

/// Format a UTC instant as `HHMMSS.ss`.
pub fn format_time(t: &DateTime<Utc>) -> String {
    format!(
        "{:02}{:02}{:02}.{:02}",
        t.format("%H").to_string().parse::<u32>().unwrap_or(0),
        t.format("%M").to_string().parse::<u32>().unwrap_or(0),
        t.format("%S").to_string().parse::<u32>().unwrap_or(0),
        t.timestamp_subsec_millis() / 10,
    )
}

/// Format a UTC date as `DDMMYY` (GPRMC field).
pub fn format_date(t: &DateTime<Utc>) -> String {
    t.format("%d%m%y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn checksum_known_vector() {
        // $GPRMC,... *6A is a commonly cited textbook example.
        let body = "GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W";
        assert_eq!(checksum_hex(body), "6A");
    }

    #[test]
    fn frame_ends_with_crlf() {
        let line = frame('$', "GPRMC,x");
        assert!(line.ends_with("\r\n"));
        assert!(line.starts_with('$'));
    }

    #[test]
    fn lat_lon_formatting() {
        let (lat, h) = format_lat(-42.49461);
        assert_eq!(h, 'S');
        assert!(lat.starts_with("42"));
        let (lon, h2) = format_lon(16.139304);
        assert_eq!(h2, 'E');
        assert!(lon.starts_with("016"));
    }

    #[quickcheck]
    fn checksum_matches_self_reported(body: String) -> bool {
        let line = frame('$', &body.replace(['*', '\r', '\n'], ""));
        let inner = &line[1..line.len() - 2]; // strip '$' and trailing "\r\n"
        let star = inner.rfind('*').unwrap();
        let (between, hex) = (&inner[..star], &inner[star + 1..]);
        checksum_hex(between) == hex
    }
}
