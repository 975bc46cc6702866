//! End-to-end export: decode a synthetic recording, pair it with annotation
//! records, and check the YOLO output on disk.

use std::fs;
use std::path::Path;
use thermal_dataset::{
    decode_file, export_dataset, read_records_file, CategoryIndex, DecodeOptions, ExportOptions,
    MalformedPolicy, ThermalError,
};

const WIDTH: u32 = 3;
const HEIGHT: u32 = 2;

fn frame_line(base: u32, ts: f64) -> String {
    let samples: Vec<String> = (0..WIDTH * HEIGHT)
        .map(|i| format!("{:05}", base + i))
        .collect();
    format!("{} t: {ts}", samples.join(" "))
}

fn write_recording(path: &Path, lines: &[String]) {
    let mut text = String::from("thermal v1\n");
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

fn write_annotations(path: &Path) {
    let records = r#"{"data_id":"SL18_R1","data_time":5000,"annotations":[{"bbox":[0.5,0.5,0.4,0.4],"category":"person","subcategory":"adult","object_id":1},{"bbox":[0.2,0.2,0.1,0.1],"category":"furniture","subcategory":"chair","object_id":2}]}
{"data_id":"SL18_R2","data_time":7000,"annotations":[{"bbox":[0.6,0.6,0.2,0.2],"category":"person","subcategory":"adult","object_id":1}]}
"#;
    fs::write(path, records).unwrap();
}

fn decode_opts() -> DecodeOptions {
    DecodeOptions {
        width: WIDTH,
        height: HEIGHT,
        ..DecodeOptions::default()
    }
}

#[test]
fn export_produces_labels_classes_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("recording.txt");
    let ann = dir.path().join("annotations.json");
    write_recording(
        &data,
        &[frame_line(2881, 5.0), frame_line(2881, 6.0), frame_line(2881, 7.02)],
    );
    write_annotations(&ann);

    let session = decode_file(&data, &decode_opts()).unwrap();
    let records = read_records_file(&ann, MalformedPolicy::Abort).unwrap();
    let mut index = CategoryIndex::new();
    let out = dir.path().join("dataset");
    let summary = export_dataset(
        &session,
        &records,
        &mut index,
        &out,
        &ExportOptions::default(),
    )
    .unwrap();

    // Frames at 5.0s and 7.02s match records; 6.0s has none.
    assert_eq!(summary.matched_frames, 2);
    assert_eq!(summary.unmatched_frames, 1);
    assert_eq!(summary.labels_written, 2);
    assert_eq!(summary.objects_written, 3);

    let first = fs::read_to_string(out.join("labels/SL18_R1_frame_0000.txt")).unwrap();
    assert_eq!(
        first,
        "0 0.500000 0.500000 0.400000 0.400000\n1 0.200000 0.200000 0.100000 0.100000\n"
    );
    let second = fs::read_to_string(out.join("labels/SL18_R2_frame_0002.txt")).unwrap();
    assert_eq!(second, "0 0.600000 0.600000 0.200000 0.200000\n");

    let classes = fs::read_to_string(out.join("classes.txt")).unwrap();
    assert_eq!(classes, "person/adult\nfurniture/chair\n");

    let manifest = fs::read_to_string(out.join("dataset.yaml")).unwrap();
    assert!(manifest.contains("nc: 2"));
    assert!(manifest.contains("  0: person/adult"));
}

#[test]
fn exporting_twice_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("recording.txt");
    let ann = dir.path().join("annotations.json");
    write_recording(&data, &[frame_line(2881, 5.0), frame_line(2950, 7.02)]);
    write_annotations(&ann);

    let run = |out: &Path| {
        let session = decode_file(&data, &decode_opts()).unwrap();
        let records = read_records_file(&ann, MalformedPolicy::Abort).unwrap();
        let mut index = CategoryIndex::new();
        export_dataset(
            &session,
            &records,
            &mut index,
            out,
            &ExportOptions::default(),
        )
        .unwrap();
    };
    let out_a = dir.path().join("a");
    let out_b = dir.path().join("b");
    run(&out_a);
    run(&out_b);

    for name in [
        "labels/SL18_R1_frame_0000.txt",
        "labels/SL18_R2_frame_0001.txt",
        "classes.txt",
    ] {
        let a = fs::read(out_a.join(name)).unwrap();
        let b = fs::read(out_b.join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between runs");
    }
}

#[test]
fn training_decode_aborts_on_malformed_line() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("recording.txt");
    write_recording(&data, &[frame_line(2881, 5.0), "02881 02882 t: 6.0".to_string()]);

    let err = decode_file(&data, &decode_opts()).unwrap_err();
    assert!(matches!(
        err,
        ThermalError::MalformedFrame {
            line: 3,
            expected: 6,
            found: 2
        }
    ));
}

#[test]
fn qa_decode_skips_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("recording.txt");
    write_recording(&data, &[frame_line(2881, 5.0), "02881 02882 t: 6.0".to_string()]);

    let opts = DecodeOptions {
        policy: MalformedPolicy::Skip,
        ..decode_opts()
    };
    let session = decode_file(&data, &opts).unwrap();
    assert_eq!(session.len(), 1);
    assert_eq!(session.skipped, 1);
}
