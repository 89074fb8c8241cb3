//! Asset classification: turning object-store entries into catalog events.
//!
//! Object names follow `camera/filename.ext`; the event is keyed by
//! `camera/stem` where the stem is the filename up to its first `.`, so a
//! clip's `.mp4`, `.avi` and `.jpg` variants all map to one event.

use crate::constants::{META_CAMERA, META_CAPTURED, META_DURATION};
use crate::services::catalog::Event;
use crate::services::storage::{ObjectMeta, UserMetadata};
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Fixed-width timestamp embedded in filename stems.
const FILENAME_TIME_FORMAT: &str = "%Y%m%d%H%M%S";
const FILENAME_TIME_WIDTH: usize = 14;

/// Zone used to interpret filename timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureZone {
    Named(Tz),
    Local,
}

impl CaptureZone {
    /// Resolve a zone name, falling back to the process zone if unknown.
    pub fn resolve(name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => Self::Named(tz),
            Err(e) => {
                tracing::warn!(zone = name, error = %e, "Unknown time zone, using local time");
                Self::Local
            },
        }
    }

    /// Interpret a wall-clock time in this zone.
    ///
    /// Ambiguous times take the earlier instant; times inside a DST gap are
    /// moved forward by the gap.
    pub fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        fn pick<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
            zone.from_local_datetime(&naive)
                .earliest()
                .or_else(|| {
                    zone.from_local_datetime(&(naive + TimeDelta::hours(1)))
                        .earliest()
                })
                .map(|t| t.with_timezone(&Utc))
        }
        match self {
            Self::Named(tz) => pick(tz, naive),
            Self::Local => pick(&Local, naive),
        }
    }

    /// Render an instant as wall-clock time in this zone.
    pub fn display(&self, t: DateTime<Utc>) -> String {
        const FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";
        match self {
            Self::Named(tz) => t.with_timezone(tz).format(FORMAT).to_string(),
            Self::Local => t.with_timezone(&Local).format(FORMAT).to_string(),
        }
    }
}

/// Why an object did not become an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Name is not `camera/filename`.
    BadPath,
    /// Camera segment is not in the directory.
    UnknownCamera,
    /// Neither `captured` metadata nor the filename yield a time.
    NoCaptureTime,
    /// `duration` metadata missing or unparseable; the asset is incomplete.
    NoDuration,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadPath => "bad_path",
            Self::UnknownCamera => "unknown_camera",
            Self::NoCaptureTime => "no_capture_time",
            Self::NoDuration => "no_duration",
        }
    }
}

/// Split `camera/filename` into its two segments.
///
/// Nested names and empty segments are rejected.
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    let (camera, filename) = path.split_once('/')?;
    if camera.is_empty() || filename.is_empty() || filename.contains('/') {
        return None;
    }
    Some((camera, filename))
}

/// Filename up to its first `.`.
pub fn stem(filename: &str) -> &str {
    filename.split_once('.').map_or(filename, |(stem, _)| stem)
}

/// Parse a duration written as `1h2m3.5s`, `12.345s`, `250ms`, ...
///
/// This is Go's `time.Duration.String` format, which uploaders write;
/// `humantime` rejects its fractional forms such as `4.5s`.
///
/// Accepts the units `h`, `m`, `s`, `ms`, `us`/`µs` and `ns`, each with an
/// optional decimal fraction. A bare `0` is zero. Negative values are
/// rejected.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.strip_prefix('+').unwrap_or(text);
    if text == "0" {
        return Some(Duration::ZERO);
    }
    if text.is_empty() || text.starts_with('-') {
        return None;
    }

    let mut total_nanos: u128 = 0;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return None;
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            _ => return None,
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if fraction.contains('.') {
            return None;
        }
        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        total_nanos = total_nanos.checked_add(whole.checked_mul(unit_nanos)?)?;

        let mut scale = unit_nanos;
        for digit in fraction.bytes() {
            scale /= 10;
            if scale == 0 {
                break;
            }
            total_nanos += u128::from(digit - b'0') * scale;
        }

        rest = tail;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).ok()?;
    let nanos = u32::try_from(total_nanos % 1_000_000_000).ok()?;
    Some(Duration::new(secs, nanos))
}

/// Render a duration the way [`parse_duration`] reads it back (`12.345s`).
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.subsec_nanos();
    if nanos == 0 {
        return format!("{}s", duration.as_secs());
    }
    let fraction = format!("{nanos:09}");
    format!("{}.{}s", duration.as_secs(), fraction.trim_end_matches('0'))
}

/// Metadata keys other than the reserved ones, in key order.
pub fn aux_metadata(metadata: &UserMetadata) -> Vec<(String, String)> {
    metadata
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "" | META_CAMERA | META_CAPTURED | META_DURATION))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Turns store entries into events.
#[derive(Debug, Clone)]
pub struct Classifier {
    zone: CaptureZone,
    recording_content_type: String,
}

impl Classifier {
    pub fn new(zone: CaptureZone, recording_content_type: impl Into<String>) -> Self {
        Self {
            zone,
            recording_content_type: recording_content_type.into(),
        }
    }

    pub fn zone(&self) -> CaptureZone {
        self.zone
    }

    /// Only completed recordings are indexed.
    pub fn is_recording(&self, object: &ObjectMeta) -> bool {
        object.content_type == self.recording_content_type
    }

    /// Capture time from `captured` metadata (RFC 3339), else from the
    /// filename stem interpreted in the configured zone.
    pub fn capture_time(&self, metadata: &UserMetadata, filename: &str) -> Option<DateTime<Utc>> {
        if let Some(captured) = metadata.get(META_CAPTURED)
            && let Ok(t) = DateTime::parse_from_rfc3339(captured)
        {
            return Some(t.with_timezone(&Utc));
        }

        let stem = stem(filename);
        if stem.len() != FILENAME_TIME_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let naive = NaiveDateTime::parse_from_str(stem, FILENAME_TIME_FORMAT).ok()?;
        self.zone.localize(naive)
    }

    /// Build the event for a recording whose camera segment is known.
    ///
    /// `known_camera` is consulted with the camera segment of the name.
    pub fn classify(
        &self,
        object: &ObjectMeta,
        known_camera: impl Fn(&str) -> bool,
    ) -> Result<Event, SkipReason> {
        let (camera, filename) = split_path(&object.path).ok_or(SkipReason::BadPath)?;
        if !known_camera(camera) {
            return Err(SkipReason::UnknownCamera);
        }
        let timestamp = self
            .capture_time(&object.metadata, filename)
            .ok_or(SkipReason::NoCaptureTime)?;
        let duration = object
            .metadata
            .get(META_DURATION)
            .and_then(|d| parse_duration(d))
            .ok_or(SkipReason::NoDuration)?;

        Ok(Event::new(camera, stem(filename), timestamp, duration)
            .with_metadata(aux_metadata(&object.metadata)))
    }
}
