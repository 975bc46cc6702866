//! Fetching frames from a TDengine time-series store over its REST API.
//!
//! Each sensor writes to a table named after its MAC address; the frame
//! payload column holds a zlib-compressed sample grid, transported as hex
//! or base64 depending on the ingest path. Decoded frames are
//! indistinguishable from frames read out of a local text file: Celsius
//! samples, mirror correction applied.

use crate::source::FrameSource;
use crate::types::{AnnotationRecord, FetchError, Frame, TemperatureUnit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};
use flate2::read::ZlibDecoder;
use log::debug;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone)]
pub struct TdEngineConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for TdEngineConfig {
    fn default() -> Self {
        TdEngineConfig {
            host: "127.0.0.1".to_string(),
            port: 6041,
            user: "root".to_string(),
            password: "taosdata".to_string(),
            database: "thermal_sensors".to_string(),
            frame_width: 60,
            frame_height: 40,
        }
    }
}

pub struct TdEngineClient {
    http: reqwest::blocking::Client,
    config: TdEngineConfig,
}

/// REST response envelope. On success `data` holds rows of column values;
/// on failure `code` is non-zero and `desc` explains.
#[derive(Debug, Deserialize)]
struct RestResponse {
    code: i64,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}

impl TdEngineClient {
    pub fn new(config: TdEngineConfig) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(TdEngineClient { http, config })
    }

    /// Per-sensor table name: colons in the MAC are not valid identifier
    /// characters and become underscores.
    pub fn table_name(mac: &str) -> String {
        format!("sensor_{}", mac.replace(':', "_"))
    }

    /// Frame closest to `timestamp_ms` within the `[ts - tol, ts + tol]`
    /// window. `Ok(None)` when the window is empty.
    pub fn fetch_frame(
        &self,
        mac: &str,
        timestamp_ms: i64,
        tolerance_ms: i64,
    ) -> Result<Option<Frame>, FetchError> {
        let rows = self.window_rows(mac, timestamp_ms - tolerance_ms, timestamp_ms + tolerance_ms)?;
        let closest = rows
            .iter()
            .min_by_key(|(row_ts, _)| (row_ts - timestamp_ms).abs());
        match closest {
            Some((row_ts, payload)) => Ok(Some(self.decode_payload(payload, *row_ts)?)),
            None => Ok(None),
        }
    }

    /// Fetch many timestamps in one round trip: a single window query over
    /// the full span, then each requested timestamp maps to its closest row.
    pub fn fetch_frames(
        &self,
        mac: &str,
        timestamps_ms: &[i64],
        tolerance_ms: i64,
    ) -> Result<Vec<Option<Frame>>, FetchError> {
        let (Some(&lo), Some(&hi)) = (timestamps_ms.iter().min(), timestamps_ms.iter().max())
        else {
            return Ok(Vec::new());
        };
        let rows = self.window_rows(mac, lo - tolerance_ms, hi + tolerance_ms)?;

        let mut frames = Vec::with_capacity(timestamps_ms.len());
        for &ts in timestamps_ms {
            let closest = rows
                .iter()
                .min_by_key(|(row_ts, _)| (row_ts - ts).abs())
                .filter(|(row_ts, _)| (row_ts - ts).abs() <= tolerance_ms);
            frames.push(match closest {
                Some((row_ts, payload)) => Some(self.decode_payload(payload, *row_ts)?),
                None => None,
            });
        }
        Ok(frames)
    }

    fn window_rows(
        &self,
        mac: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<(i64, String)>, FetchError> {
        let sql = format!(
            "SELECT ts, frame_data FROM {} WHERE ts >= '{}' AND ts <= '{}' ORDER BY ts ASC",
            Self::table_name(mac),
            format_ts_ms(start_ms),
            format_ts_ms(end_ms),
        );
        self.query(&sql)
    }

    fn query(&self, sql: &str) -> Result<Vec<(i64, String)>, FetchError> {
        debug!("tdengine query: {sql}");
        let url = format!(
            "http://{}:{}/rest/sql/{}",
            self.config.host, self.config.port, self.config.database
        );
        let response = self
            .http
            .post(url)
            .basic_auth(&self.config.user, Some(&self.config.password))
            .body(sql.to_string())
            .send()?;
        let body: RestResponse = response.json()?;
        if body.code != 0 {
            let message = body.desc.unwrap_or_else(|| "no error description".to_string());
            // A full data disk needs operator action, not a different query.
            return Err(if message.to_ascii_lowercase().contains("disk space") {
                FetchError::StorageExhausted(message)
            } else {
                FetchError::Query {
                    code: body.code,
                    message,
                }
            });
        }
        body.data.into_iter().map(parse_row).collect()
    }

    /// Unwrap a payload column value into a frame. Transport encoding is
    /// detected (hex first, base64 otherwise), then zlib, then the sample
    /// width decides the numeric format.
    fn decode_payload(&self, payload: &str, timestamp_ms: i64) -> Result<Frame, FetchError> {
        let text = payload.trim();
        let compressed = if text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
            hex::decode(text).map_err(|e| FetchError::Payload(e.to_string()))?
        } else {
            BASE64
                .decode(text)
                .map_err(|e| FetchError::Payload(e.to_string()))?
        };
        let mut bytes = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Payload(format!("zlib inflate failed: {e}")))?;

        let (width, height) = (self.config.frame_width, self.config.frame_height);
        let expected = (width * height) as usize;
        let samples: Vec<f32> = if bytes.len() == expected * 2 {
            // i16 little-endian deciKelvin
            bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 10.0 - 273.15)
                .collect()
        } else if bytes.len() == expected * 4 {
            // f32 little-endian Celsius
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        } else {
            return Err(FetchError::Payload(format!(
                "payload is {} bytes; expected {} or {} for a {}x{} frame",
                bytes.len(),
                expected * 2,
                expected * 4,
                width,
                height
            )));
        };

        let mut frame = Frame::from_samples(
            samples,
            width,
            height,
            timestamp_ms as f64 / 1000.0,
            TemperatureUnit::Celsius,
        );
        frame.mirror_horizontal();
        Ok(frame)
    }
}

fn parse_row(row: Vec<serde_json::Value>) -> Result<(i64, String), FetchError> {
    let mut values = row.into_iter();
    let ts = match values.next() {
        Some(serde_json::Value::String(text)) => parse_row_ts(&text)?,
        Some(serde_json::Value::Number(n)) if n.is_i64() => n.as_i64().unwrap_or_default(),
        other => {
            return Err(FetchError::Payload(format!(
                "unexpected timestamp column: {other:?}"
            )))
        }
    };
    match values.next() {
        Some(serde_json::Value::String(payload)) => Ok((ts, payload)),
        other => Err(FetchError::Payload(format!(
            "unexpected payload column: {other:?}"
        ))),
    }
}

/// Epoch milliseconds to the timestamp literal TDengine expects, UTC.
fn format_ts_ms(ms: i64) -> String {
    let dt = DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH);
    dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Row timestamps come back as text; the separator varies by server
/// configuration, and some deployments return raw epoch milliseconds.
fn parse_row_ts(text: &str) -> Result<i64, FetchError> {
    let cleaned = text.replace('T', " ");
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(ms) = text.parse::<i64>() {
        return Ok(ms);
    }
    Err(FetchError::Payload(format!(
        "unparseable row timestamp {text:?}"
    )))
}

/// Timezones annotation operators enter time ranges in. Only US zones ship
/// sensors today; UTC is the passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Timezone {
    Utc,
    LosAngeles,
    NewYork,
}

impl Timezone {
    /// Interpret a naive local wall-clock time in this zone.
    pub fn to_utc(self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - Duration::seconds(self.utc_offset_secs(local) as i64)).and_utc()
    }

    fn utc_offset_secs(self, local: NaiveDateTime) -> i32 {
        let dst = is_us_dst(local);
        match self {
            Timezone::Utc => 0,
            Timezone::LosAngeles => {
                if dst {
                    -7 * 3600
                } else {
                    -8 * 3600
                }
            }
            Timezone::NewYork => {
                if dst {
                    -4 * 3600
                } else {
                    -5 * 3600
                }
            }
        }
    }
}

/// US daylight saving: second Sunday of March 02:00 local through first
/// Sunday of November 02:00 local.
fn is_us_dst(local: NaiveDateTime) -> bool {
    let year = local.year();
    let start = NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2)
        .and_then(|d| d.and_hms_opt(2, 0, 0));
    let end = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1)
        .and_then(|d| d.and_hms_opt(2, 0, 0));
    match (start, end) {
        (Some(start), Some(end)) => local >= start && local < end,
        _ => false,
    }
}

/// Millisecond fetch window covering every record, padded by `buffer_secs`
/// on each end. `None` when there are no records.
pub fn time_range_for_records(
    records: &[AnnotationRecord],
    buffer_secs: i64,
) -> Option<(i64, i64)> {
    let lo = records.iter().map(|r| r.timestamp_ms).min()?;
    let hi = records.iter().map(|r| r.timestamp_ms).max()?;
    Some((lo - buffer_secs * 1000, hi + buffer_secs * 1000))
}

/// A sensor table viewed as a frame source.
pub struct RemoteFrameSource {
    client: TdEngineClient,
    mac: String,
}

impl RemoteFrameSource {
    pub fn new(client: TdEngineClient, mac: impl Into<String>) -> Self {
        RemoteFrameSource {
            client,
            mac: mac.into(),
        }
    }
}

impl FrameSource for RemoteFrameSource {
    fn frame_at(
        &mut self,
        timestamp_ms: i64,
        tolerance_ms: i64,
    ) -> Result<Option<Frame>, FetchError> {
        self.client.fetch_frame(&self.mac, timestamp_ms, tolerance_ms)
    }
}
