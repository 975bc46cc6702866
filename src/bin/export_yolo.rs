use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use thermal_dataset::{
    decode_file, export_dataset, read_records_file, CategoryIndex, DecodeOptions, ExportOptions,
    MalformedPolicy, DEFAULT_TOLERANCE_MS,
};

#[derive(Parser, Debug)]
#[command(
    name = "export_yolo",
    about = "Export a thermal recording and its annotations as a YOLO training dataset"
)]
struct Args {
    /// Thermal recording text file.
    #[arg(long)]
    data: PathBuf,
    /// Annotation records, JSON lines or a JSON array.
    #[arg(long)]
    annotations: PathBuf,
    #[arg(long, default_value = "dataset")]
    output_dir: PathBuf,
    /// Also write every frame as a normalized grayscale PNG.
    #[arg(long)]
    export_images: bool,
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_MS)]
    tolerance_ms: i64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Training path: malformed input aborts rather than silently shrinking
    // the dataset.
    let session = decode_file(&args.data, &DecodeOptions::default())
        .with_context(|| format!("decoding {}", args.data.display()))?;
    let records = read_records_file(&args.annotations, MalformedPolicy::Abort)
        .with_context(|| format!("reading {}", args.annotations.display()))?;

    let mut index = CategoryIndex::new();
    let opts = ExportOptions {
        export_images: args.export_images,
        tolerance_ms: args.tolerance_ms,
        ..ExportOptions::default()
    };
    let summary = export_dataset(&session, &records, &mut index, &args.output_dir, &opts)
        .with_context(|| format!("exporting to {}", args.output_dir.display()))?;

    log::info!(
        "dataset written to {}: {} labels, {} classes",
        args.output_dir.display(),
        summary.labels_written,
        index.len()
    );
    Ok(())
}
