//! QA and dataset-preparation toolkit for thermal-sensor object detection.
//!
//! Decodes fixed-width thermal frame recordings, pairs frames with
//! timestamped annotation records, renders QA overlay images, and exports
//! YOLO training datasets. Frames can also be pulled from a TDengine
//! time-series store through the same `FrameSource` seam.

pub mod annotations;
pub mod bbox;
pub mod decode;
pub mod export;
pub mod font;
pub mod matching;
pub mod render;
pub mod source;
pub mod tdengine;
pub mod types;

pub use annotations::{read_records_file, CategoryIndex};
pub use decode::{decode_file, DecodeOptions, ThermalSession};
pub use export::{export_dataset, write_summary_report, ExportOptions, ExportSummary};
pub use matching::{match_record, DEFAULT_TOLERANCE_MS};
pub use render::{display_range, render_frame, DisplayRange, RenderOptions};
pub use source::{FrameSource, LocalFrameSource};
pub use tdengine::{RemoteFrameSource, TdEngineClient, TdEngineConfig, Timezone};
pub use types::{
    AnnotationRecord, FetchError, Frame, MalformedPolicy, ObjectAnnotation, TemperatureUnit,
    ThermalError, ThermalResult,
};
