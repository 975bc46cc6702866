//! Matching frames to annotation records by timestamp.

use crate::types::AnnotationRecord;

pub const DEFAULT_TOLERANCE_MS: i64 = 100;

/// Frame timestamps are epoch seconds; records carry epoch milliseconds.
pub fn frame_ts_to_ms(timestamp_secs: f64) -> i64 {
    (timestamp_secs * 1000.0) as i64
}

/// Find the record closest in time to a frame, within `tolerance_ms`.
///
/// Linear scan: record counts are small (tens to low thousands) and the
/// strict `<` improvement makes the first record in source order win ties.
/// Returns `None` when no record is close enough or the list is empty;
/// neither is an error.
pub fn match_record<'a>(
    frame_timestamp_secs: f64,
    records: &'a [AnnotationRecord],
    tolerance_ms: i64,
) -> Option<&'a AnnotationRecord> {
    let frame_ms = frame_ts_to_ms(frame_timestamp_secs);
    let mut best: Option<(&AnnotationRecord, i64)> = None;
    for record in records {
        let diff = (record.timestamp_ms - frame_ms).abs();
        if best.map_or(true, |(_, best_diff)| diff < best_diff) {
            best = Some((record, diff));
        }
    }
    match best {
        Some((record, diff)) if diff <= tolerance_ms => Some(record),
        _ => None,
    }
}
