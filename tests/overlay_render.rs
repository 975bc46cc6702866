//! Renderer integration: session-wide normalization, overlay placement,
//! determinism of the rendered rasters.

use image::Rgb;
use std::io::Cursor;
use thermal_dataset::{
    decode::decode_reader, display_range, match_record, read_records_file, render_frame,
    DecodeOptions, MalformedPolicy, RenderOptions, ThermalSession, DEFAULT_TOLERANCE_MS,
};

const WIDTH: u32 = 6;
const HEIGHT: u32 = 4;

fn session() -> ThermalSession {
    // Two frames, constant 2881 deciKelvin (14.95 C), 0.5s apart.
    let mut text = String::from("thermal v1\n");
    for ts in [10.0, 10.5] {
        let samples = vec!["02881"; (WIDTH * HEIGHT) as usize].join(" ");
        text.push_str(&format!("{samples} t: {ts}\n"));
    }
    let opts = DecodeOptions {
        width: WIDTH,
        height: HEIGHT,
        ..DecodeOptions::default()
    };
    decode_reader(Cursor::new(text), &opts).unwrap()
}

#[test]
fn overlay_dimensions_follow_scale_factor() {
    let session = session();
    let range = display_range(&session.frames);
    let opts = RenderOptions {
        scale_factor: 8,
        ..RenderOptions::default()
    };
    let img = render_frame(&session.frames[0], None, 0, &range, &opts);
    assert_eq!(img.dimensions(), (WIDTH * 8, HEIGHT * 8));
}

#[test]
fn matched_record_draws_category_colored_box() {
    let dir = tempfile::tempdir().unwrap();
    let ann = dir.path().join("annotations.json");
    std::fs::write(
        &ann,
        r#"{"data_id":"r1","data_time":10000,"annotations":[{"bbox":[0.5,0.5,0.5,0.5],"category":"person","subcategory":"adult","object_id":1}]}"#,
    )
    .unwrap();
    let records = read_records_file(&ann, MalformedPolicy::Abort).unwrap();

    let session = session();
    let range = display_range(&session.frames);
    let opts = RenderOptions {
        scale_factor: 8,
        text_scale: 1,
        ..RenderOptions::default()
    };
    let frame = &session.frames[0];
    let record = match_record(frame.timestamp, &records, DEFAULT_TOLERANCE_MS);
    assert!(record.is_some());

    let img = render_frame(frame, record, 0, &range, &opts);
    // Box corner (0.25, 0.25) on a 48x32 canvas: the bottom edge runs
    // along y=24, clear of the label strip.
    assert_eq!(img.get_pixel(20, 24), &Rgb([255, 0, 0]));
}

#[test]
fn rendering_is_deterministic() {
    let session = session();
    let range = display_range(&session.frames);
    let opts = RenderOptions::default();
    let a = render_frame(&session.frames[1], None, 1, &range, &opts);
    let b = render_frame(&session.frames[1], None, 1, &range, &opts);
    assert_eq!(a.as_raw(), b.as_raw());
}

#[test]
fn display_range_is_shared_across_the_session() {
    let session = session();
    let range = display_range(&session.frames);
    // Constant-temperature session: percentiles collapse to the sample
    // value and the margin is zero.
    assert!((range.min - 14.95).abs() < 1e-3);
    assert!((range.max - 14.95).abs() < 1e-3);
}
