//! YOLO dataset export: label files, class list, manifest, summary report.
//!
//! Output layout under the chosen directory:
//!
//! ```text
//! labels/<record_id>_frame_<idx>.txt   one line per object
//! images/frame_<idx>.png               optional grayscale frames
//! classes.txt                          class names in id order
//! dataset.yaml                         YOLO manifest
//! ```
//!
//! Export is deterministic: the same session and records produce
//! byte-identical labels and class list on every run.

use crate::annotations::CategoryIndex;
use crate::decode::ThermalSession;
use crate::matching::{match_record, DEFAULT_TOLERANCE_MS};
use crate::render::{display_range, normalize_to_gray};
use crate::types::{AnnotationRecord, ThermalError, ThermalResult};
use log::info;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Write a label file for every frame with a matched record.
    pub write_labels: bool,
    /// Write every frame as a normalized grayscale PNG, matched or not.
    pub export_images: bool,
    pub tolerance_ms: i64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            write_labels: true,
            export_images: false,
            tolerance_ms: DEFAULT_TOLERANCE_MS,
        }
    }
}

/// Counters from one export run, for logging and the summary report.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExportSummary {
    pub matched_frames: usize,
    pub unmatched_frames: usize,
    pub labels_written: usize,
    pub images_written: usize,
    pub objects_written: usize,
}

/// Export a decoded session against its annotation records.
///
/// The caller owns the `CategoryIndex` and threads the same instance through
/// every export that must share class ids.
pub fn export_dataset(
    session: &ThermalSession,
    records: &[AnnotationRecord],
    index: &mut CategoryIndex,
    output_dir: &Path,
    opts: &ExportOptions,
) -> ThermalResult<ExportSummary> {
    let labels_dir = output_dir.join("labels");
    let images_dir = output_dir.join("images");
    if opts.write_labels {
        create_dir(&labels_dir)?;
    }
    if opts.export_images {
        create_dir(&images_dir)?;
    }

    let range = opts.export_images.then(|| display_range(&session.frames));
    let mut summary = ExportSummary::default();

    for (idx, frame) in session.frames.iter().enumerate() {
        let matched = match_record(frame.timestamp, records, opts.tolerance_ms);
        match matched {
            Some(_) => summary.matched_frames += 1,
            None => summary.unmatched_frames += 1,
        }

        if opts.write_labels {
            if let Some(record) = matched {
                let mut contents = String::new();
                for obj in &record.objects {
                    let class_id = index.get_or_create_id(&obj.category, &obj.subcategory);
                    let [cx, cy, w, h] = obj.bbox;
                    let _ = writeln!(contents, "{class_id} {cx:.6} {cy:.6} {w:.6} {h:.6}");
                    summary.objects_written += 1;
                }
                let name = format!("{}_frame_{idx:04}.txt", record.record_id);
                write_file(&labels_dir.join(name), &contents)?;
                summary.labels_written += 1;
            }
        }

        if let Some(range) = range.as_ref() {
            let gray = normalize_to_gray(frame, range);
            let path = images_dir.join(format!("frame_{idx:04}.png"));
            gray.save(&path).map_err(|e| ThermalError::Image {
                path: path.clone(),
                source: e,
            })?;
            summary.images_written += 1;
        }
    }

    index.verify()?;
    write_class_list(index, &output_dir.join("classes.txt"))?;
    write_manifest(index, output_dir)?;

    info!(
        "exported {} label files ({} objects), {} images; {} frames unmatched",
        summary.labels_written, summary.objects_written, summary.images_written,
        summary.unmatched_frames
    );
    for (id, name) in index.names().iter().enumerate() {
        info!("class {id}: {name}");
    }
    Ok(summary)
}

/// `classes.txt`: one `category/subcategory` per line, line number = id.
fn write_class_list(index: &CategoryIndex, path: &Path) -> ThermalResult<()> {
    let mut contents = String::new();
    for name in index.names() {
        contents.push_str(name);
        contents.push('\n');
    }
    write_file(path, &contents)
}

/// `dataset.yaml` in the layout Ultralytics-style trainers expect. Train and
/// val both point at the single exported split; re-splitting is up to the
/// training pipeline.
fn write_manifest(index: &CategoryIndex, output_dir: &Path) -> ThermalResult<()> {
    let mut contents = String::new();
    let _ = writeln!(contents, "path: {}", output_dir.display());
    contents.push_str("train: images\nval: images\n");
    let _ = writeln!(contents, "nc: {}", index.len());
    contents.push_str("names:\n");
    for (id, name) in index.names().iter().enumerate() {
        let _ = writeln!(contents, "  {id}: {name}");
    }
    write_file(&output_dir.join("dataset.yaml"), &contents)
}

/// Human-readable run report written next to the exported data.
pub fn write_summary_report(
    path: &Path,
    session: &ThermalSession,
    records: &[AnnotationRecord],
    index: &CategoryIndex,
    summary: &ExportSummary,
) -> ThermalResult<()> {
    let mut out = String::new();
    let _ = writeln!(out, "frames: {}", session.len());
    let _ = writeln!(out, "frames skipped during decode: {}", session.skipped);
    let _ = writeln!(out, "session duration: {:.3}s", session.duration_secs());
    if let Some((lo, hi)) = session.temperature_range() {
        let _ = writeln!(out, "temperature range: {lo:.2} to {hi:.2}");
    }
    let _ = writeln!(out, "annotation records: {}", records.len());
    let _ = writeln!(out, "matched frames: {}", summary.matched_frames);
    let _ = writeln!(out, "unmatched frames: {}", summary.unmatched_frames);
    let _ = writeln!(out, "objects written: {}", summary.objects_written);
    let _ = writeln!(out, "classes:");
    for (id, name) in index.names().iter().enumerate() {
        let count = records
            .iter()
            .flat_map(|r| r.objects.iter())
            .filter(|o| CategoryIndex::full_name(&o.category, &o.subcategory) == *name)
            .count();
        let _ = writeln!(out, "  {id}: {name} ({count} instances)");
    }
    write_file(path, &out)
}

fn create_dir(path: &Path) -> ThermalResult<()> {
    fs::create_dir_all(path).map_err(|e| ThermalError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_file(path: &Path, contents: &str) -> ThermalResult<()> {
    fs::write(path, contents).map_err(|e| ThermalError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
