use clap::Parser;
use lenia_app::{Cli, execute};
use lenia_core::{Classification, FrameRecord, Generation};
use lenia_storage::{SUMMARY_FILE, frame_path, read_frame, read_run_summary};
use std::{
    fs,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_path(tag: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_micros();
    std::env::temp_dir().join(format!(
        "lenia_app_{tag}_{}_{}",
        std::process::id(),
        timestamp
    ))
}

#[test]
fn empty_seed_run_writes_frame_and_summary() {
    let dir = temp_path("empty");
    let dir_arg = dir.to_str().expect("utf8 path");
    let cli = Cli::try_parse_from([
        "lenia-run",
        "--dimension",
        "3",
        "--kernel-radius",
        "5",
        "--starting-area-size",
        "0",
        "--output-dir",
        dir_arg,
    ])
    .expect("parse");
    let report = execute(&cli).expect("run");
    assert_eq!(report.result.classification, Classification::Died);
    assert_eq!(report.result.actual_frame_count, 1);

    let frame: FrameRecord<3> = read_frame(frame_path(&dir, Generation(0))).expect("frame");
    assert!(frame.is_empty());
    let summary = read_run_summary(dir.join(SUMMARY_FILE)).expect("summary");
    assert_eq!(summary.dimension, 3);
    assert_eq!(summary.result, report.result);
    assert_eq!(summary.parameters.starting_area_size, 0);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn config_file_is_merged_with_flags() {
    let dir = temp_path("config");
    fs::create_dir_all(&dir).expect("dir");
    let config = dir.join("params.json");
    fs::write(
        &config,
        r#"{"kernel_radius": 2, "kernel_sigma_multiplier": 0.5, "growth_sigma_multiplier": 0.05,
            "starting_area_size": 3, "num_frames": 50, "rng_seed": 11}"#,
    )
    .expect("write config");
    let cli = Cli::try_parse_from([
        "lenia-run",
        "-d",
        "2",
        "--config",
        config.to_str().expect("utf8 path"),
        "--num-frames",
        "4",
        "--async-sink",
        "--output-dir",
        dir.join("frames").to_str().expect("utf8 path"),
    ])
    .expect("parse");
    let params = cli.parameters().expect("params");
    assert_eq!(params.kernel_radius, 2);
    assert_eq!(params.num_frames, 4);
    assert_eq!(params.rng_seed, Some(11));

    let report = execute(&cli).expect("run");
    assert!(report.result.actual_frame_count <= 4);
    for generation in 0..report.result.actual_frame_count {
        assert!(frame_path(&dir.join("frames"), Generation(generation)).exists());
    }
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unsupported_dimension_fails() {
    let cli = Cli::try_parse_from(["lenia-run", "--dimension", "5"]).expect("parse");
    let err = execute(&cli).expect_err("5d");
    assert!(err.to_string().contains("dimension"), "{err}");
}

#[test]
fn invalid_parameters_fail_before_running() {
    let cli = Cli::try_parse_from([
        "lenia-run",
        "--min-initial-value",
        "0.9",
        "--max-initial-value",
        "0.1",
    ])
    .expect("parse");
    let err = execute(&cli).expect_err("invalid");
    assert!(err.to_string().contains("invalid parameter"), "{err}");
}

#[test]
fn report_serializes_flat_result() {
    let cli = Cli::try_parse_from([
        "lenia-run",
        "-d",
        "2",
        "--kernel-radius",
        "2",
        "--num-frames",
        "2",
        "--seed",
        "3",
    ])
    .expect("parse");
    let report = execute(&cli).expect("run");
    let json = serde_json::to_value(&report).expect("json");
    assert!(json.get("classification").is_some());
    assert!(json.get("actual_frame_count").is_some());
    assert_eq!(json["dimension"], 2);
}
