use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use assert_cmd::Command;
use nalgebra::{Matrix3, Vector3};
use predicates::prelude::*;
use procam::core::{CameraModel, ImageSize, Pose};
use procam::MarkerRegistry;
use serde_json::Value;

fn procam() -> Command {
    Command::cargo_bin("procam").unwrap()
}

/// Camera one metre above the z = 0 plane, looking straight at it.
fn overhead() -> CameraModel {
    CameraModel::from_parts(
        Some(ImageSize::new(480, 640)),
        Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0),
        None,
        vec![Pose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0))],
    )
}

fn json_stdout(cmd: &mut Command) -> Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

fn write_session(dir: &Path) -> std::path::PathBuf {
    overhead().write(dir.join("camera.yaml")).unwrap();
    let path = dir.join("session.json");
    fs::write(
        &path,
        r#"{
            "screen": 1,
            "camera": "P2",
            "camera-calibration": "camera.yaml",
            "write": "projector.yaml",
            "omit": [10, 11],
            "surfaces": [[[0, 0, 0], [400, 0, 0], [400, 300, 0], [0, 300, 0]],
                         [[0, 0, 0], [0, 300, 0], [0, 300, 300], [0, 0, 300]]]
        }"#,
    )
    .unwrap();
    path
}

#[test]
fn markers_writes_canvas_and_registry() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("canvas.png");
    let registry = dir.path().join("registry.json");

    procam()
        .args(["markers", "--width", "800", "--height", "600", "--omit", "12,13"])
        .arg("--out")
        .arg(&png)
        .arg("--registry")
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::contains("on a 800x600 canvas"));

    let bytes = fs::read(&png).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

    let registry = MarkerRegistry::load_json(&registry).unwrap();
    assert!(registry.len() > 10);
    assert!(registry.contains(10));
    assert!(!registry.contains(12));
    assert!(!registry.contains(13));
}

#[test]
fn markers_rejects_an_empty_canvas() {
    let dir = tempfile::tempdir().unwrap();
    procam()
        .args(["markers", "--width", "0", "--height", "600"])
        .arg("--out")
        .arg(dir.path().join("canvas.png"))
        .assert()
        .failure();
}

#[test]
fn project_and_unproject_pinhole_model() {
    let dir = tempfile::tempdir().unwrap();
    let calib = dir.path().join("camera.yaml");
    overhead().write(&calib).unwrap();

    let v = json_stdout(
        procam()
            .args(["project", "--calibration"])
            .arg(&calib)
            .args(["--point", "0.1", "-0.05", "0"]),
    );
    assert_eq!(v["model"], "pinhole");
    assert_abs_diff_eq!(v["pixel"][0].as_f64().unwrap(), 400.0, epsilon = 1e-6);
    assert_abs_diff_eq!(v["pixel"][1].as_f64().unwrap(), 200.0, epsilon = 1e-6);

    let v = json_stdout(
        procam()
            .args(["unproject", "--calibration"])
            .arg(&calib)
            .args(["--pixel", "400", "200", "--z", "0"]),
    );
    assert_abs_diff_eq!(v["point"][0].as_f64().unwrap(), 0.1, epsilon = 1e-6);
    assert_abs_diff_eq!(v["point"][1].as_f64().unwrap(), -0.05, epsilon = 1e-6);
    assert_abs_diff_eq!(v["origin"][2].as_f64().unwrap(), -1.0, epsilon = 1e-9);
}

#[test]
fn project_homography_model() {
    let dir = tempfile::tempdir().unwrap();
    let calib = dir.path().join("projector.yaml");
    let h = Matrix3::new(1000.0, 0.0, 100.0, 0.0, 1000.0, 50.0, 0.0, 0.0, 1.0);
    CameraModel::homography(Some(ImageSize::new(600, 800)), h)
        .write(&calib)
        .unwrap();

    let v = json_stdout(
        procam()
            .args(["project", "--calibration"])
            .arg(&calib)
            .args(["--point", "0.2", "0.3", "5"]),
    );
    assert_eq!(v["model"], "homography");
    assert_abs_diff_eq!(v["pixel"][0].as_f64().unwrap(), 300.0, epsilon = 1e-6);
    assert_abs_diff_eq!(v["pixel"][1].as_f64().unwrap(), 350.0, epsilon = 1e-6);
}

#[test]
fn project_missing_calibration_fails() {
    let dir = tempfile::tempdir().unwrap();
    procam()
        .args(["project", "--calibration"])
        .arg(dir.path().join("missing.yaml"))
        .args(["--point", "0", "0", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn inspect_reports_surfaces_and_markers() {
    let dir = tempfile::tempdir().unwrap();
    let session = write_session(dir.path());

    let v = json_stdout(
        procam()
            .args(["inspect", "--canvas", "800x600", "--config"])
            .arg(&session),
    );
    assert_eq!(v["screen"], 1);
    assert_eq!(v["camera"], "P2");
    assert_eq!(v["camera_size"], serde_json::json!([640, 480]));
    assert!(v["markers"].as_u64().unwrap() > 0);

    let surfaces = v["surfaces"].as_array().unwrap();
    assert_eq!(surfaces.len(), 2);
    assert_eq!(surfaces[0]["normal"], serde_json::json!([0.0, 0.0, 1.0]));
    assert_eq!(surfaces[1]["normal"], serde_json::json!([1.0, 0.0, 0.0]));
    assert_eq!(
        surfaces[0]["outline"],
        serde_json::json!([[320.0, 240.0], [640.0, 240.0], [640.0, 480.0], [320.0, 480.0]])
    );
}

#[test]
fn inspect_rejects_colinear_surface() {
    let dir = tempfile::tempdir().unwrap();
    overhead().write(dir.path().join("camera.yaml")).unwrap();
    let session = dir.path().join("session.json");
    fs::write(
        &session,
        r#"{
            "screen": 1,
            "camera": 1,
            "camera-calibration": "camera.yaml",
            "write": "projector.yaml",
            "surfaces": [[[0, 0, 0], [100, 0, 0], [200, 0, 0]]]
        }"#,
    )
    .unwrap();

    procam()
        .args(["inspect", "--config"])
        .arg(&session)
        .assert()
        .failure()
        .stderr(predicate::str::contains("surface 0"));
}
