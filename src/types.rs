//! Core types and error definitions for thermal_dataset.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type ThermalResult<T> = Result<T, ThermalError>;

#[derive(Debug, Error)]
pub enum ThermalError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image write error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("malformed frame at line {line}: expected {expected} samples, found {found}")]
    MalformedFrame {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("frame at line {line} has no timestamp marker")]
    MissingTimestamp { line: usize },
    #[error("invalid annotation at line {line}: {source}")]
    InvalidAnnotation {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("class index collision: \"{name}\" holds id {id} but id {id} resolves to \"{resolved}\"")]
    ClassIndexCollision {
        name: String,
        id: u32,
        resolved: String,
    },
}

/// Errors from the remote frame path. `NotFound` is not represented here:
/// an empty query window is a normal outcome and surfaces as `Ok(None)`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("remote store unreachable: {0}")]
    Connection(#[from] reqwest::Error),
    #[error("remote query failed (code {code}): {message}")]
    Query { code: i64, message: String },
    #[error("remote store out of disk space: {0}")]
    StorageExhausted(String),
    #[error("frame payload decode failed: {0}")]
    Payload(String),
}

/// What to do when a batch operation hits a malformed frame or record.
///
/// QA paths (overlay rendering) skip and keep going; training-data export
/// aborts so a bad input cannot silently shrink the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    Skip,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureUnit {
    /// Kelvin x 10, stored as an integer. The sensor wire format.
    DeciKelvin,
    Kelvin,
    Celsius,
}

/// Convert a single sample between units. Pure linear map; deciKelvin
/// results are rounded to the nearest integer to match the stored format.
pub fn convert_sample(value: f32, from: TemperatureUnit, to: TemperatureUnit) -> f32 {
    if from == to {
        return value;
    }
    let kelvin = match from {
        TemperatureUnit::DeciKelvin => value / 10.0,
        TemperatureUnit::Kelvin => value,
        TemperatureUnit::Celsius => value + 273.15,
    };
    match to {
        TemperatureUnit::DeciKelvin => (kelvin * 10.0).round(),
        TemperatureUnit::Kelvin => kelvin,
        TemperatureUnit::Celsius => kelvin - 273.15,
    }
}

/// One decoded thermal frame: a row-major grid of temperature samples plus
/// the epoch timestamp extracted alongside it. Immutable once decoded.
#[derive(Debug, Clone)]
pub struct Frame {
    samples: Vec<f32>,
    width: u32,
    height: u32,
    /// Epoch seconds, sub-millisecond precision.
    pub timestamp: f64,
    pub unit: TemperatureUnit,
}

impl Frame {
    /// Build a frame from row-major samples. `samples.len()` must equal
    /// `width * height`.
    pub fn from_samples(
        samples: Vec<f32>,
        width: u32,
        height: u32,
        timestamp: f64,
        unit: TemperatureUnit,
    ) -> Self {
        debug_assert_eq!(samples.len(), (width * height) as usize);
        Frame {
            samples,
            width,
            height,
            timestamp,
            unit,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn get(&self, row: u32, col: u32) -> f32 {
        self.samples[(row * self.width + col) as usize]
    }

    /// Frame timestamp in epoch milliseconds, truncated.
    pub fn timestamp_ms(&self) -> i64 {
        (self.timestamp * 1000.0) as i64
    }

    /// Return a copy of this frame converted to another unit.
    pub fn to_unit(&self, unit: TemperatureUnit) -> Frame {
        Frame {
            samples: self
                .samples
                .iter()
                .map(|&v| convert_sample(v, self.unit, unit))
                .collect(),
            width: self.width,
            height: self.height,
            timestamp: self.timestamp,
            unit,
        }
    }

    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut iter = self.samples.iter().copied().filter(|v| v.is_finite());
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Left-right flip to correct sensor orientation. Applied exactly once,
    /// by the decoders, before the frame is handed out.
    pub(crate) fn mirror_horizontal(&mut self) {
        for row in self.samples.chunks_mut(self.width as usize) {
            row.reverse();
        }
    }
}

/// One object annotation in YOLO format: `bbox` is
/// `[center_x, center_y, width, height]`, all normalized to [0, 1].
/// The box is center-based, not corner-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectAnnotation {
    pub bbox: [f64; 4],
    pub category: String,
    pub subcategory: String,
    /// Stable within one recording session, not globally unique.
    pub object_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obscured_percentage: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat_residual: Option<bool>,
}

/// One logical unit of ground truth for a single moment in time.
/// Object order is display order only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(rename = "data_id", deserialize_with = "string_or_number")]
    pub record_id: String,
    /// Epoch milliseconds.
    #[serde(rename = "data_time")]
    pub timestamp_ms: i64,
    #[serde(rename = "annotations", default)]
    pub objects: Vec<ObjectAnnotation>,
}

/// Record ids are opaque; some sources emit them as JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
