use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use thermal_dataset::{
    decode_file, display_range, match_record, read_records_file, render_frame, write_summary_report,
    CategoryIndex, DecodeOptions, ExportSummary, MalformedPolicy, RenderOptions,
    DEFAULT_TOLERANCE_MS,
};

#[derive(Parser, Debug)]
#[command(
    name = "render_overlays",
    about = "Render annotated QA overlay images from a thermal recording"
)]
struct Args {
    /// Thermal recording text file.
    #[arg(long)]
    data: PathBuf,
    /// Annotation records, JSON lines or a JSON array.
    #[arg(long)]
    annotations: PathBuf,
    #[arg(long, default_value = "overlays")]
    output_dir: PathBuf,
    /// Nearest-neighbor upscale factor for the output images.
    #[arg(long, default_value_t = 8)]
    scale: u32,
    #[arg(long, default_value_t = 0)]
    start_frame: usize,
    /// Number of frames to render; all remaining frames by default.
    #[arg(long)]
    num_frames: Option<usize>,
    #[arg(long, default_value_t = DEFAULT_TOLERANCE_MS)]
    tolerance_ms: i64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // QA path: a bad line loses one frame, not the whole review session.
    let decode_opts = DecodeOptions {
        policy: MalformedPolicy::Skip,
        ..DecodeOptions::default()
    };
    let session = decode_file(&args.data, &decode_opts)
        .with_context(|| format!("decoding {}", args.data.display()))?;
    let records = read_records_file(&args.annotations, MalformedPolicy::Skip)
        .with_context(|| format!("reading {}", args.annotations.display()))?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let range = display_range(&session.frames);
    let render_opts = RenderOptions {
        scale_factor: args.scale,
        ..RenderOptions::default()
    };

    let end = args
        .num_frames
        .map_or(session.len(), |n| (args.start_frame + n).min(session.len()));
    let mut matched = 0usize;
    for idx in args.start_frame..end {
        let frame = &session.frames[idx];
        let record = match_record(frame.timestamp, &records, args.tolerance_ms);
        if record.is_some() {
            matched += 1;
        }
        let img = render_frame(frame, record, idx, &range, &render_opts);
        let path = args.output_dir.join(format!("frame_{idx:04}.png"));
        img.save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let mut index = CategoryIndex::new();
    for record in &records {
        for obj in &record.objects {
            index.get_or_create_id(&obj.category, &obj.subcategory);
        }
    }
    let rendered = end.saturating_sub(args.start_frame);
    let summary = ExportSummary {
        matched_frames: matched,
        unmatched_frames: rendered - matched,
        ..ExportSummary::default()
    };
    write_summary_report(
        &args.output_dir.join("summary.txt"),
        &session,
        &records,
        &index,
        &summary,
    )?;

    log::info!(
        "rendered {rendered} overlays ({matched} with annotations) to {}",
        args.output_dir.display()
    );
    Ok(())
}
