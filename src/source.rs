//! Uniform timestamp-based frame access over local or remote storage.
//!
//! Matching and export code asks a `FrameSource` for "the frame nearest this
//! millisecond timestamp" and never learns whether it came from a decoded
//! text file or a TDengine query.

use crate::decode::ThermalSession;
use crate::types::{FetchError, Frame};

pub trait FrameSource {
    /// Frame closest to `timestamp_ms`, if any lies within `tolerance_ms`.
    /// `Ok(None)` means nothing close enough; it is not an error.
    fn frame_at(
        &mut self,
        timestamp_ms: i64,
        tolerance_ms: i64,
    ) -> Result<Option<Frame>, FetchError>;
}

/// A decoded session viewed as a frame source. Lookup is a linear scan;
/// sessions are at most a few thousand frames.
pub struct LocalFrameSource {
    session: ThermalSession,
}

impl LocalFrameSource {
    pub fn new(session: ThermalSession) -> Self {
        LocalFrameSource { session }
    }

    pub fn session(&self) -> &ThermalSession {
        &self.session
    }
}

impl FrameSource for LocalFrameSource {
    fn frame_at(
        &mut self,
        timestamp_ms: i64,
        tolerance_ms: i64,
    ) -> Result<Option<Frame>, FetchError> {
        let mut best: Option<(&Frame, i64)> = None;
        for frame in &self.session.frames {
            let diff = (frame.timestamp_ms() - timestamp_ms).abs();
            if best.map_or(true, |(_, best_diff)| diff < best_diff) {
                best = Some((frame, diff));
            }
        }
        Ok(match best {
            Some((frame, diff)) if diff <= tolerance_ms => Some(frame.clone()),
            _ => None,
        })
    }
}
