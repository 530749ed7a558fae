//! AIS AIVDM encoder: Type 18 (Class-B Position Report) and Type 24 Part A
//! (static name), per ITU-R M.1371 (spec section 4.1).

use super::bits::{read_signed, read_unsigned, unarmour, BitWriter};
use super::frame;

const MAX_ARMOURED_CHARS: usize = 60;

/// Pack a Type 18 Class-B position report (168 bits).
///
/// `heading_deg` is `None` when unavailable (sentinel 511).
pub fn pack_type18(
    mmsi: u32,
    sog_kn: f64,
    accuracy: bool,
    lon: f64,
    lat: f64,
    cog_deg: f64,
    heading_deg: Option<f64>,
    timestamp_sec: u8,
) -> BitWriter {
    let mut w = BitWriter::new();
    w.push_unsigned(18, 6); // message type
    w.push_unsigned(0, 2); // repeat indicator
    w.push_unsigned(mmsi as u64, 30);
    w.push_unsigned(0, 8); // reserved
    let sog_units = ((sog_kn * 10.0).round() as i64).clamp(0, 1022) as u64;
    w.push_unsigned(sog_units, 10);
    w.push_unsigned(accuracy as u64, 1);
    let lon_units = (lon * 600_000.0).round().clamp(-180.0 * 600_000.0, 180.0 * 600_000.0) as i64;
    w.push_signed(lon_units, 28);
    let lat_units = (lat * 600_000.0).round().clamp(-90.0 * 600_000.0, 90.0 * 600_000.0) as i64;
    w.push_signed(lat_units, 27);
    let cog_units = ((cog_deg * 10.0).round() as i64).rem_euclid(3600) as u64;
    w.push_unsigned(cog_units, 12);
    let heading_units = heading_deg.map(|h| (h.round() as u64) % 360).unwrap_or(511);
    w.push_unsigned(heading_units, 9);
    w.push_unsigned(timestamp_sec as u64, 6);
    w.push_unsigned(0, 2); // reserved
    w.push_unsigned(1, 1); // class B unit flag
    w.push_unsigned(0, 6); // display/DSC/band/msg22/mode/RAIM flags
    w.push_unsigned(0, 20); // radio status
    w
}

/// Fields recovered from a decoded Type 18 payload (used by tests and any
/// consumer validating the encoder round-trips correctly).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Type18Fields {
    pub mmsi: u32,
    pub sog_kn: f64,
    pub lon: f64,
    pub lat: f64,
    pub cog_deg: f64,
    pub heading_deg: Option<f64>,
}

/// Decode a 168-bit Type 18 payload back into its fields.
pub fn decode_type18(bits: &[bool]) -> Option<Type18Fields> {
    if bits.len() < 168 {
        return None;
    }
    if read_unsigned(bits, 0, 6) != 18 {
        return None;
    }
    let mmsi = read_unsigned(bits, 8, 30) as u32;
    let sog_kn = read_unsigned(bits, 46, 10) as f64 / 10.0;
    let lon = read_signed(bits, 57, 28) as f64 / 600_000.0;
    let lat = read_signed(bits, 85, 27) as f64 / 600_000.0;
    let cog_deg = read_unsigned(bits, 112, 12) as f64 / 10.0;
    let heading_units = read_unsigned(bits, 124, 9);
    let heading_deg = if heading_units == 511 { None } else { Some(heading_units as f64) };
    Some(Type18Fields { mmsi, sog_kn, lon, lat, cog_deg, heading_deg })
}

/// Pack a Type 24 Part A static-name report (160 bits).
pub fn pack_type24a(mmsi: u32, name: &str) -> BitWriter {
    let mut w = BitWriter::new();
    w.push_unsigned(24, 6);
    w.push_unsigned(0, 2);
    w.push_unsigned(mmsi as u64, 30);
    w.push_unsigned(0, 2); // part number A
    for v in sixbit_name(name) {
        w.push_unsigned(v as u64, 6);
    }
    w
}

/// Encode `name` to exactly 20 six-bit content characters, padded with `@`.
fn sixbit_name(name: &str) -> [u8; 20] {
    let mut out = [0u8; 20]; // '@' == 0
    for (i, c) in name.chars().take(20).enumerate() {
        out[i] = content_sixbit(c);
    }
    out
}

/// ITU-R M.1371 Table 47 "6 bit ASCII" content encoding (distinct from the
/// AIVDM armouring alphabet in [`super::bits`]).
fn content_sixbit(c: char) -> u8 {
    let c = c.to_ascii_uppercase();
    let ascii = c as u32;
    if (64..=95).contains(&ascii) {
        (ascii - 64) as u8
    } else if (32..=63).contains(&ascii) {
        ascii as u8
    } else {
        0 // unencodable -> '@'
    }
}

/// Wrap an armoured, fill-bit-tagged payload into one or more `!AIVDM`
/// sentences, splitting deterministically at 60 armoured characters
/// (spec section 4.1).
pub fn assemble_aivdm(armoured: &str, fill_bits: u8, channel: char, seq_id: u8) -> Vec<String> {
    let chars: Vec<char> = armoured.chars().collect();
    let total_frags = chars.len().div_ceil(MAX_ARMOURED_CHARS).max(1);
    let mut out = Vec::with_capacity(total_frags);

    for i in 0..total_frags {
        let start = i * MAX_ARMOURED_CHARS;
        let end = (start + MAX_ARMOURED_CHARS).min(chars.len());
        let frag: String = chars[start..end].iter().collect();
        let is_last = i == total_frags - 1;
        let frag_fill = if is_last { fill_bits } else { 0 };
        let seq_field = if total_frags > 1 { seq_id.to_string() } else { String::new() };
        let body = format!("AIVDM,{total_frags},{},{seq_field},{channel},{frag},{frag_fill}", i + 1);
        out.push(frame('!', &body));
    }
    out
}

/// Armour `bits` and assemble into AIVDM sentence(s).
pub fn encode_bits(bits: &BitWriter, channel: char, seq_id: u8) -> Vec<String> {
    let (armoured, fill) = bits.armour();
    assemble_aivdm(&armoured, fill, channel, seq_id)
}

/// Extract the raw payload bits back out of a single `!AIVDM` sentence's
/// fields (used by tests). Not a full sentence parser.
pub fn decode_payload(payload: &str, fill_bits: u8) -> Option<Vec<bool>> {
    unarmour(payload, fill_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn type18_produces_exactly_one_fragment() {
        let bits = pack_type18(367123456, 5.2, true, -16.232, 42.716, 185.3, Some(184.0), 30);
        let lines = encode_bits(&bits, 'A', 0);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("!AIVDM,1,1,,A,"));
    }

    #[test]
    fn type18_round_trip() {
        let mmsi = 999000001;
        let sog = 12.3;
        let lon = -16.23217;
        let lat = 42.71577;
        let cog = 271.4;
        let bits = pack_type18(mmsi, sog, true, lon, lat, cog, Some(270.0), 15);
        let decoded = decode_type18(bits.as_bits()).unwrap();
        assert_eq!(decoded.mmsi, mmsi);
        assert!((decoded.sog_kn - sog).abs() < 0.1);
        assert!((decoded.lon - lon).abs() < 1.0 / 600_000.0 + 1e-9);
        assert!((decoded.lat - lat).abs() < 1.0 / 600_000.0 + 1e-9);
        assert!((decoded.cog_deg - cog).abs() < 0.1);
        assert_eq!(decoded.heading_deg, Some(270.0));
    }

    #[test]
    fn type18_unavailable_heading_round_trips_to_none() {
        let bits = pack_type18(999000002, 0.0, true, 0.0, 0.0, 0.0, None, 0);
        let decoded = decode_type18(bits.as_bits()).unwrap();
        assert_eq!(decoded.heading_deg, None);
    }

    #[test]
    fn type24a_name_padded_to_twenty_chars() {
        let bits = pack_type24a(999000001, "SEA BREEZE");
        assert_eq!(bits.len(), 6 + 2 + 30 + 2 + 120);
        let lines = encode_bits(&bits, 'A', 0);
        assert_eq!(lines.len(), 1);
    }

    #[quickcheck]
    fn armoured_fragments_never_exceed_sixty_chars(len: u16) -> bool {
        let len = (len as usize) % 400;
        let payload: String = "0".repeat(len);
        let frags = assemble_aivdm(&payload, 0, 'A', 0);
        frags.iter().all(|line| {
            let inner = &line[1..line.len() - 2];
            let fields: Vec<&str> = inner.split(',').collect();
            fields[5].len() <= MAX_ARMOURED_CHARS
        })
    }
}
