//! Raw EXIF access keyed by numeric tag id.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{Context, Exif, In, Value};

use super::gps::{Dms, GpsFix, Hemisphere};
use super::outcome::{Degradation, Outcome};

pub const TAG_DATE_TIME_ORIGINAL: u16 = 36867;
/// Pointer to the GPS sub-directory; its fields land in [`RawExif::gps`].
pub const TAG_GPS_INFO: u16 = 34853;

pub const GPS_LATITUDE_REF: u16 = 1;
pub const GPS_LATITUDE: u16 = 2;
pub const GPS_LONGITUDE_REF: u16 = 3;
pub const GPS_LONGITUDE: u16 = 4;

const CAPTURE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Primary-image EXIF fields, with the GPSInfo directory split out.
#[derive(Debug, Clone, Default)]
pub struct RawExif {
    pub tags: HashMap<u16, Value>,
    pub gps: HashMap<u16, Value>,
}

impl RawExif {
    pub fn from_exif(exif: &Exif) -> Self {
        let mut raw = RawExif::default();
        for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
            let target = match field.tag.context() {
                Context::Gps => &mut raw.gps,
                _ => &mut raw.tags,
            };
            target.insert(field.tag.number(), field.value.clone());
        }
        raw
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.gps.is_empty()
    }

    /// DateTimeOriginal, when present and well formed.
    pub fn capture_time(&self) -> Outcome<Option<NaiveDateTime>> {
        let Some(text) = self.tags.get(&TAG_DATE_TIME_ORIGINAL).and_then(ascii_text) else {
            return Outcome::complete(None);
        };

        match NaiveDateTime::parse_from_str(&text, CAPTURE_TIME_FORMAT) {
            Ok(parsed) => Outcome::complete(Some(parsed)),
            Err(_) => Outcome::degraded(None, Degradation::CaptureTimeMalformed(text)),
        }
    }

    /// The GPS position, `Ok(None)` when the image carries no GPS block.
    pub fn gps_fix(&self) -> Result<Option<GpsFix>, Degradation> {
        if self.gps.is_empty() {
            return Ok(None);
        }

        let lat_ref = self.reference(GPS_LATITUDE_REF, "latitude reference")?;
        let lat = self.dms(GPS_LATITUDE, "latitude")?;
        let lon_ref = self.reference(GPS_LONGITUDE_REF, "longitude reference")?;
        let lon = self.dms(GPS_LONGITUDE, "longitude")?;

        GpsFix::new(lat_ref, lat, lon_ref, lon).map(Some)
    }

    /// `"lat, lon"` location string when a complete fix is present.
    pub fn location(&self) -> Outcome<Option<String>> {
        match self.gps_fix() {
            Ok(fix) => Outcome::complete(fix.map(|f| f.to_location_string())),
            Err(reason) => Outcome::degraded(None, reason),
        }
    }

    fn reference(&self, tag: u16, name: &'static str) -> Result<Hemisphere, Degradation> {
        let value = self.gps.get(&tag).ok_or(Degradation::GpsIncomplete(name))?;
        let parsed = match value {
            Value::Ascii(parts) => parts.first().and_then(|p| Hemisphere::parse(p)),
            Value::Byte(bytes) | Value::Undefined(bytes, _) => Hemisphere::parse(bytes),
            _ => None,
        };
        parsed.ok_or(Degradation::GpsMalformed(name))
    }

    fn dms(&self, tag: u16, name: &'static str) -> Result<Dms, Degradation> {
        match self.gps.get(&tag).ok_or(Degradation::GpsIncomplete(name))? {
            Value::Rational(values) => Dms::from_rationals(values).ok_or(Degradation::GpsMalformed(name)),
            _ => Err(Degradation::GpsMalformed(name)),
        }
    }
}

fn ascii_text(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        }),
        _ => None,
    }
}

/// Reads EXIF from an image file. Never fails: a missing or unreadable
/// block yields an empty [`RawExif`] with the reason recorded.
pub fn read_exif(path: &Path) -> Outcome<RawExif> {
    match File::open(path) {
        Ok(file) => read_exif_from(&mut BufReader::new(file)),
        Err(e) => Outcome::degraded(RawExif::default(), Degradation::ExifCorrupt(e.to_string())),
    }
}

pub fn read_exif_from<R: BufRead + Seek>(reader: &mut R) -> Outcome<RawExif> {
    let mut skipped = Vec::new();
    let parsed = exif::Reader::new()
        .continue_on_error(true)
        .read_from_container(reader)
        .or_else(|e| e.distill_partial_result(|errors| skipped = errors));

    interpret(parsed, skipped)
}

/// Parses a bare TIFF-structured EXIF payload, as found after the
/// `Exif\0\0` marker of a JPEG APP1 segment.
pub fn parse_exif_bytes(data: Vec<u8>) -> Outcome<RawExif> {
    let mut skipped = Vec::new();
    let parsed = exif::Reader::new()
        .continue_on_error(true)
        .read_raw(data)
        .or_else(|e| e.distill_partial_result(|errors| skipped = errors));

    interpret(parsed, skipped)
}

fn interpret(parsed: Result<Exif, exif::Error>, skipped: Vec<exif::Error>) -> Outcome<RawExif> {
    for error in &skipped {
        tracing::debug!(%error, "skipping undecodable EXIF tag");
    }

    match parsed {
        Ok(exif) => Outcome::complete(RawExif::from_exif(&exif)),
        Err(exif::Error::NotFound(_)) => Outcome::degraded(RawExif::default(), Degradation::ExifMissing),
        Err(e) => Outcome::degraded(RawExif::default(), Degradation::ExifCorrupt(e.to_string())),
    }
}
