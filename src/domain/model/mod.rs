// Domain models - Core data structures for replay builds

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Sub};
use std::path::{Path, PathBuf};

use crate::error::{ReplayError, ReplayResult};

const MICROS_PER_SECOND: i64 = 1_000_000;

/// Time position or length with microsecond resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSpec {
    micros: i64,
}

impl TimeSpec {
    pub const ZERO: TimeSpec = TimeSpec { micros: 0 };

    /// Create a new TimeSpec from whole microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Create a new TimeSpec from seconds, rounded to the nearest microsecond
    pub fn from_seconds(seconds: f64) -> Self {
        Self {
            micros: (seconds * MICROS_PER_SECOND as f64).round() as i64,
        }
    }

    pub fn as_micros(&self) -> i64 {
        self.micros
    }

    pub fn as_seconds(&self) -> f64 {
        self.micros as f64 / MICROS_PER_SECOND as f64
    }

    /// Parse `[[H:]M:]S[.fff]`. The right-most field is fractional seconds,
    /// every field to its left is a whole number scaled by 60. An empty
    /// string is zero.
    pub fn parse(text: &str) -> ReplayResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::ZERO);
        }

        let format_error = || ReplayError::Format {
            key: "timestamp".to_string(),
            value: text.to_string(),
        };

        let fields: Vec<&str> = trimmed.split(':').collect();
        if fields.len() > 3 {
            return Err(format_error());
        }

        let mut total = 0.0_f64;
        for (index, field) in fields.iter().rev().enumerate() {
            let field = field.trim();
            if index == 0 {
                let seconds: f64 = field.parse().map_err(|_| format_error())?;
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(format_error());
                }
                total += seconds;
            } else {
                let whole: u64 = field.parse().map_err(|_| format_error())?;
                total += whole as f64 * 60_f64.powi(index as i32);
            }
        }

        Ok(Self::from_seconds(total))
    }
}

impl fmt::Display for TimeSpec {
    /// `H:MM:SS` with a six digit fraction only when one is present
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.micros < 0 { "-" } else { "" };
        let micros = self.micros.unsigned_abs();
        let whole = micros / MICROS_PER_SECOND as u64;
        let fraction = micros % MICROS_PER_SECOND as u64;
        let (hours, minutes, seconds) = (whole / 3600, (whole / 60) % 60, whole % 60);
        write!(f, "{}{}:{:02}:{:02}", sign, hours, minutes, seconds)?;
        if fraction != 0 {
            write!(f, ".{:06}", fraction)?;
        }
        Ok(())
    }
}

impl Serialize for TimeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Add for TimeSpec {
    type Output = TimeSpec;

    fn add(self, rhs: TimeSpec) -> TimeSpec {
        TimeSpec::from_micros(self.micros + rhs.micros)
    }
}

impl Sub for TimeSpec {
    type Output = TimeSpec;

    fn sub(self, rhs: TimeSpec) -> TimeSpec {
        TimeSpec::from_micros(self.micros - rhs.micros)
    }
}

impl std::iter::Sum for TimeSpec {
    fn sum<I: Iterator<Item = TimeSpec>>(iter: I) -> TimeSpec {
        iter.fold(TimeSpec::ZERO, |acc, t| acc + t)
    }
}

/// Span of a source file to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: TimeSpec,
    pub end: TimeSpec,
}

impl TimeRange {
    /// Create a range, rejecting ranges that do not move forward
    pub fn new(start: TimeSpec, end: TimeSpec) -> ReplayResult<Self> {
        if end <= start {
            return Err(ReplayError::Order {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> TimeSpec {
        self.end - self.start
    }

    /// Inclusive on both ends
    pub fn contains(&self, time: TimeSpec) -> bool {
        self.start <= time && time <= self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Named point or span, in either an input's or the output's timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub name: String,
    pub start: TimeSpec,
    pub end: TimeSpec,
}

impl Marker {
    pub fn new(name: impl Into<String>, start: TimeSpec, end: TimeSpec) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Zero-length marker
    pub fn at(name: impl Into<String>, time: TimeSpec) -> Self {
        Self::new(name, time, time)
    }
}

/// Media properties reported by the prober
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MediaProbe {
    pub duration: TimeSpec,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Overall bitrate in bits per second
    pub bitrate: f64,
    /// File size in bytes
    pub size: u64,
}

impl MediaProbe {
    /// Pixels per second, zero when the prober did not report dimensions
    pub fn pixel_rate(&self) -> f64 {
        self.width as f64 * self.height as f64 * self.fps
    }
}

/// Which variant of the outputs a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Bitrate-targeted encode into the size window
    Encoded,
    /// Single pass with the raw command, no bitrate targeting
    Raw,
}

impl BuildMode {
    pub fn from_raw_flag(raw: bool) -> Self {
        if raw {
            BuildMode::Raw
        } else {
            BuildMode::Encoded
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, BuildMode::Raw)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            BuildMode::Encoded => "encoded",
            BuildMode::Raw => "raw",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One (input file, time range) pair slated for independent encoding
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub input_index: usize,
    pub range_index: usize,
    pub source: PathBuf,
    pub range: TimeRange,
    pub probe: MediaProbe,
}

impl Segment {
    /// Working file name, `<input>__<stem>__<range><ext>`
    pub fn file_name(&self, mode: BuildMode, ext: &str) -> String {
        let stem = file_stem(&self.source);
        let prefix = if mode.is_raw() { "raw_" } else { "" };
        format!(
            "{}{}__{}__{}{}",
            prefix, self.input_index, stem, self.range_index, ext
        )
    }
}

/// File stem as a lossy string, empty when the path has none
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extension including its dot, empty when the path has none
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
