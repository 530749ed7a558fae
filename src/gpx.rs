//! GPX track parsing and timeline queries (spec section 4.3).
//!
//! Exposes a plain byte-buffer parser: the engine must not depend on an
//! HTTP stack, so reading the file off disk (or an upload) is the control
//! plane's job; this module only turns bytes into an immutable [`Track`].

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use thiserror::Error;

use crate::geo::{self, LatLon};

#[derive(Debug, Error)]
pub enum GpxError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("track has fewer than 2 points")]
    TooShort,
    #[error("malformed coordinate")]
    BadCoordinate,
}

pub type Result<T> = std::result::Result<T, GpxError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub time: Option<DateTime<Utc>>,
}

/// An immutable, validated GPX track (spec section 3, "GPX track").
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub points: Vec<TrackPoint>,
    /// Cumulative great-circle arc length at each point, nm. Same length as
    /// `points`; `cumulative_nm[0] == 0.0`.
    pub cumulative_nm: Vec<f64>,
    pub length_nm: f64,
    pub has_time: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_s: Option<f64>,
}

impl Track {
    /// Parse the first `<trk>`'s concatenated `<trkseg>` points out of a GPX
    /// document.
    pub fn parse(bytes: &[u8]) -> Result<Track> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut points = Vec::new();
        let mut buf = Vec::new();
        let mut in_trk = false;
        let mut in_first_trk_done = false;
        let mut in_trkpt = false;
        let mut cur_lat: Option<f64> = None;
        let mut cur_lon: Option<f64> = None;
        let mut cur_time: Option<DateTime<Utc>> = None;
        let mut in_time_tag = false;
        let mut time_text = String::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                Event::Start(e) | Event::Empty(e) => {
                    let local = e.local_name();
                    let name = local.as_ref();
                    if name == b"trk" {
                        if in_first_trk_done {
                            // Only the first track is used.
                            continue;
                        }
                        in_trk = true;
                    } else if in_trk && name == b"trkpt" {
                        in_trkpt = true;
                        cur_lat = None;
                        cur_lon = None;
                        cur_time = None;
                        for attr in e.attributes() {
                            let attr = attr?;
                            let key = attr.key.local_name();
                            let val = attr.unescape_value()?.to_string();
                            match key.as_ref() {
                                b"lat" => cur_lat = val.parse().ok(),
                                b"lon" => cur_lon = val.parse().ok(),
                                _ => {}
                            }
                        }
                    } else if in_trkpt && name == b"time" {
                        in_time_tag = true;
                        time_text.clear();
                    }
                }
                Event::Text(t) => {
                    if in_time_tag {
                        time_text.push_str(&t.unescape()?);
                    }
                }
                Event::End(e) => {
                    let local = e.local_name();
                    let name = local.as_ref();
                    if name == b"time" && in_time_tag {
                        in_time_tag = false;
                        cur_time = DateTime::parse_from_rfc3339(time_text.trim())
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc));
                    } else if name == b"trkpt" && in_trkpt {
                        in_trkpt = false;
                        if let (Some(lat), Some(lon)) = (cur_lat, cur_lon) {
                            points.push(TrackPoint { lat, lon, time: cur_time });
                        } else {
                            return Err(GpxError::BadCoordinate);
                        }
                    } else if name == b"trk" && in_trk {
                        in_trk = false;
                        in_first_trk_done = true;
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        if points.len() < 2 {
            return Err(GpxError::TooShort);
        }

        let has_time = points.iter().all(|p| p.time.is_some());

        let mut cumulative_nm = Vec::with_capacity(points.len());
        cumulative_nm.push(0.0);
        let mut total = 0.0;
        for w in points.windows(2) {
            let a = LatLon { lat: w[0].lat, lon: w[0].lon };
            let b = LatLon { lat: w[1].lat, lon: w[1].lon };
            total += geo::distance_nm(a, b);
            cumulative_nm.push(total);
        }

        let (start_time, end_time, duration_s) = if has_time {
            let start = points.first().and_then(|p| p.time).unwrap();
            let end = points.last().and_then(|p| p.time).unwrap();
            let dur = (end - start).num_milliseconds() as f64 / 1000.0;
            (Some(start), Some(end), Some(dur))
        } else {
            (None, None, None)
        };

        Ok(Track {
            points,
            cumulative_nm,
            length_nm: total,
            has_time,
            start_time,
            end_time,
            duration_s,
        })
    }

    /// Position at `offset_s` seconds into a timed track, linearly
    /// interpolated between the bracketing points. Offsets outside
    /// `[0, duration_s]` clamp to the nearest endpoint.
    pub fn position_at(&self, offset_s: f64) -> LatLon {
        debug_assert!(self.has_time);
        let start = self.start_time.expect("has_time implies start_time");
        let target = start + chrono::Duration::milliseconds((offset_s * 1000.0) as i64);

        if target <= start {
            let p = self.points[0];
            return LatLon { lat: p.lat, lon: p.lon };
        }
        let end = self.end_time.expect("has_time implies end_time");
        if target >= end {
            let p = *self.points.last().unwrap();
            return LatLon { lat: p.lat, lon: p.lon };
        }

        // Binary search for the bracketing segment.
        let idx = match self.points.binary_search_by(|p| p.time.unwrap().cmp(&target)) {
            Ok(i) => i,
            Err(i) => i,
        };
        if idx == 0 {
            let p = self.points[0];
            return LatLon { lat: p.lat, lon: p.lon };
        }
        let a = &self.points[idx - 1];
        let b = &self.points[idx];
        let ta = a.time.unwrap();
        let tb = b.time.unwrap();
        let span = (tb - ta).num_milliseconds() as f64;
        let f = if span > 0.0 {
            (target - ta).num_milliseconds() as f64 / span
        } else {
            0.0
        };
        lerp_latlon(a, b, f)
    }

    /// Position at fractional arc-length index `f` in `[0, 1]`, for untimed
    /// tracks. Clamps to the endpoints outside that range.
    pub fn position_at_fraction(&self, f: f64) -> LatLon {
        let f = f.clamp(0.0, 1.0);
        let target_nm = f * self.length_nm;
        let idx = match self
            .cumulative_nm
            .binary_search_by(|d| d.partial_cmp(&target_nm).unwrap())
        {
            Ok(i) => i,
            Err(i) => i,
        };
        if idx == 0 {
            let p = self.points[0];
            return LatLon { lat: p.lat, lon: p.lon };
        }
        if idx >= self.points.len() {
            let p = *self.points.last().unwrap();
            return LatLon { lat: p.lat, lon: p.lon };
        }
        let a = &self.points[idx - 1];
        let b = &self.points[idx];
        let span = self.cumulative_nm[idx] - self.cumulative_nm[idx - 1];
        let frac = if span > 0.0 {
            (target_nm - self.cumulative_nm[idx - 1]) / span
        } else {
            0.0
        };
        lerp_latlon(a, b, frac)
    }

    /// SOG/COG derived from the segment containing `offset_s` (timed
    /// tracks): distance/duration for SOG (clamped to 40 kn), initial
    /// bearing for COG.
    pub fn sog_cog_at(&self, offset_s: f64) -> (f64, f64) {
        let (a, b) = self.bracketing_segment_by_time(offset_s);
        let pa = LatLon { lat: a.lat, lon: a.lon };
        let pb = LatLon { lat: b.lat, lon: b.lon };
        let dist = geo::distance_nm(pa, pb);
        let dur_s = (b.time.unwrap() - a.time.unwrap()).num_milliseconds() as f64 / 1000.0;
        let sog = if dur_s > 0.0 { (dist / dur_s) * 3600.0 } else { 0.0 };
        let cog = geo::initial_bearing(pa, pb);
        (sog.min(40.0), cog)
    }

    /// COG derived from the segment enclosing fractional position `f`
    /// (untimed tracks).
    pub fn cog_at_fraction(&self, f: f64) -> f64 {
        let (a, b) = self.bracketing_segment_by_fraction(f);
        let pa = LatLon { lat: a.lat, lon: a.lon };
        let pb = LatLon { lat: b.lat, lon: b.lon };
        geo::initial_bearing(pa, pb)
    }

    fn bracketing_segment_by_time(&self, offset_s: f64) -> (TrackPoint, TrackPoint) {
        let start = self.start_time.expect("has_time implies start_time");
        let target = start + chrono::Duration::milliseconds((offset_s * 1000.0) as i64);
        let idx = match self.points.binary_search_by(|p| p.time.unwrap().cmp(&target)) {
            Ok(i) => i,
            Err(i) => i,
        };
        let idx = idx.clamp(1, self.points.len() - 1);
        (self.points[idx - 1], self.points[idx])
    }

    fn bracketing_segment_by_fraction(&self, f: f64) -> (TrackPoint, TrackPoint) {
        let f = f.clamp(0.0, 1.0);
        let target_nm = f * self.length_nm;
        let idx = match self
            .cumulative_nm
            .binary_search_by(|d| d.partial_cmp(&target_nm).unwrap())
        {
            Ok(i) => i,
            Err(i) => i,
        };
        let idx = idx.clamp(1, self.points.len() - 1);
        (self.points[idx - 1], self.points[idx])
    }
}

fn lerp_latlon(a: &TrackPoint, b: &TrackPoint, f: f64) -> LatLon {
    let f = f.clamp(0.0, 1.0);
    LatLon {
        lat: a.lat + (b.lat - a.lat) * f,
        lon: geo::normalize_lon(a.lon + (b.lon - a.lon) * f),
    }
}
