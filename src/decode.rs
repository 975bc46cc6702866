//! Decoding fixed-width thermal frame text files.
//!
//! The wire format is one header line identifying the format version, then
//! one line per frame: `rows*cols` 5-digit deciKelvin integers separated by
//! spaces, terminated by a ` t: <epoch-seconds>` marker.

use crate::types::{Frame, MalformedPolicy, TemperatureUnit, ThermalError, ThermalResult};
use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    pub width: u32,
    pub height: u32,
    /// Unit the decoded samples are converted to.
    pub unit: TemperatureUnit,
    pub policy: MalformedPolicy,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            width: 60,
            height: 40,
            unit: TemperatureUnit::Celsius,
            policy: MalformedPolicy::Abort,
        }
    }
}

/// All frames decoded from one input file, in file order. Owned by the
/// session and read-only for the remainder of the run.
#[derive(Debug)]
pub struct ThermalSession {
    pub frames: Vec<Frame>,
    /// Lines dropped under `MalformedPolicy::Skip`.
    pub skipped: usize,
}

impl ThermalSession {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Min/max over every sample in the session, ignoring non-finite values.
    pub fn temperature_range(&self) -> Option<(f32, f32)> {
        self.frames
            .iter()
            .filter_map(Frame::min_max)
            .reduce(|(lo, hi), (min, max)| (lo.min(min), hi.max(max)))
    }

    /// Wall-clock span covered by the session, in seconds.
    pub fn duration_secs(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}

pub fn decode_file(path: &Path, opts: &DecodeOptions) -> ThermalResult<ThermalSession> {
    let file = File::open(path).map_err(|e| ThermalError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("loading thermal data from {}", path.display());
    let session = decode_reader(BufReader::new(file), opts)?;
    info!(
        "loaded {} frames ({} skipped) from {}",
        session.len(),
        session.skipped,
        path.display()
    );
    if let Some((lo, hi)) = session.temperature_range() {
        info!("temperature range: {lo:.1} to {hi:.1} ({:?})", opts.unit);
    }
    Ok(session)
}

/// Decode frames from any line-oriented reader. The first line is the
/// format header and carries no samples.
pub fn decode_reader<R: BufRead>(reader: R, opts: &DecodeOptions) -> ThermalResult<ThermalSession> {
    let mut frames = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ThermalError::Io {
            path: "<reader>".into(),
            source: e,
        })?;
        // 1-based, matching editors; line 1 is the header.
        let line_no = idx + 1;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }
        match decode_line(&line, line_no, opts) {
            Ok(frame) => frames.push(frame),
            Err(err) => match opts.policy {
                MalformedPolicy::Abort => return Err(err),
                MalformedPolicy::Skip => {
                    warn!("skipping frame: {err}");
                    skipped += 1;
                }
            },
        }
    }

    Ok(ThermalSession { frames, skipped })
}

/// Decode a single frame line. Samples are 5-digit deciKelvin tokens; any
/// non-digit byte acts as a separator. Extra trailing samples are ignored,
/// too few is a `MalformedFrame`.
pub fn decode_line(line: &str, line_no: usize, opts: &DecodeOptions) -> ThermalResult<Frame> {
    let (data, ts) = match line.rfind("t:") {
        Some(pos) => (&line[..pos], &line[pos + 2..]),
        None => return Err(ThermalError::MissingTimestamp { line: line_no }),
    };
    let timestamp: f64 = ts
        .trim()
        .parse()
        .map_err(|_| ThermalError::MissingTimestamp { line: line_no })?;

    let expected = (opts.width * opts.height) as usize;
    let mut samples = Vec::with_capacity(expected);
    for token in data.split(|c: char| !c.is_ascii_digit()) {
        if token.len() != 5 {
            continue;
        }
        if let Ok(raw) = token.parse::<u32>() {
            samples.push(crate::types::convert_sample(
                raw as f32,
                TemperatureUnit::DeciKelvin,
                opts.unit,
            ));
            if samples.len() == expected {
                break;
            }
        }
    }
    if samples.len() < expected {
        return Err(ThermalError::MalformedFrame {
            line: line_no,
            expected,
            found: samples.len(),
        });
    }

    let mut frame = Frame::from_samples(samples, opts.width, opts.height, timestamp, opts.unit);
    frame.mirror_horizontal();
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn opts(width: u32, height: u32) -> DecodeOptions {
        DecodeOptions {
            width,
            height,
            ..DecodeOptions::default()
        }
    }

    fn frame_line(values: &[u32], ts: f64) -> String {
        let mut line = values
            .iter()
            .map(|v| format!("{v:05}"))
            .collect::<Vec<_>>()
            .join(" ");
        line.push_str(&format!(" t: {ts}"));
        line
    }

    #[test]
    fn decodes_deci_kelvin_line_to_celsius() {
        let line = frame_line(&[2881, 2882, 2883, 2884, 2885, 2886], 1760639220.331);
        let frame = decode_line(&line, 2, &opts(3, 2)).unwrap();
        assert_eq!(frame.timestamp, 1760639220.331);
        // First stored sample is 2881 -> 14.95 C, mirrored to column 2.
        assert!((frame.get(0, 2) - 14.95).abs() < 1e-4);
        assert!((frame.get(0, 0) - 15.15).abs() < 1e-4);
    }

    #[test]
    fn short_line_is_malformed() {
        let line = frame_line(&[2881, 2882], 10.0);
        let err = decode_line(&line, 7, &opts(3, 2)).unwrap_err();
        match err {
            ThermalError::MalformedFrame {
                line,
                expected,
                found,
            } => {
                assert_eq!((line, expected, found), (7, 6, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_timestamp_is_an_error() {
        let err = decode_line("02881 02882", 3, &opts(1, 2)).unwrap_err();
        assert!(matches!(err, ThermalError::MissingTimestamp { line: 3 }));
    }

    #[test]
    fn skip_policy_keeps_going_and_counts() {
        let good = frame_line(&[2881, 2882], 5.0);
        let bad = frame_line(&[2881], 6.0);
        let input = format!("header v1\n{good}\n{bad}\n{good}\n");
        let mut o = opts(2, 1);
        o.policy = MalformedPolicy::Skip;
        let session = decode_reader(Cursor::new(input), &o).unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(session.skipped, 1);
    }

    #[test]
    fn abort_policy_stops_on_first_malformed_line() {
        let good = frame_line(&[2881, 2882], 5.0);
        let bad = frame_line(&[2881], 6.0);
        let input = format!("header v1\n{good}\n{bad}\n");
        let err = decode_reader(Cursor::new(input), &opts(2, 1)).unwrap_err();
        assert!(matches!(err, ThermalError::MalformedFrame { line: 3, .. }));
    }

    #[test]
    fn extra_samples_are_ignored() {
        let line = frame_line(&[2881, 2882, 2883], 5.0);
        let frame = decode_line(&line, 2, &opts(2, 1)).unwrap();
        assert_eq!(frame.samples().len(), 2);
    }

    #[test]
    fn non_sample_tokens_are_skipped() {
        // 4- and 6-digit runs are not samples; punctuation separates tokens.
        let line = "0288,02881 028811 02882 t: 5.0";
        let frame = decode_line(line, 2, &opts(2, 1)).unwrap();
        assert!((frame.get(0, 1) - 14.95).abs() < 1e-4);
    }
}
