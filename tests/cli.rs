use assert_cmd::prelude::*;
use once_cell::sync::Lazy;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Binary glTF with a single triangle.
static TRIANGLE_GLB: Lazy<Vec<u8>> = Lazy::new(|| {
    let json = r#"{"asset":{"version":"2.0"},"scene":0,"scenes":[{"nodes":[0]}],"nodes":[{"mesh":0}],"meshes":[{"primitives":[{"attributes":{"POSITION":0}}]}],"accessors":[{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]}],"bufferViews":[{"buffer":0,"byteLength":36}],"buffers":[{"byteLength":36}]}"#;
    let mut json_bytes = json.as_bytes().to_vec();
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    let mut bin = Vec::new();
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    let total = 12 + 8 + json_bytes.len() + 8 + bin.len();

    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json_bytes);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
});

fn landmark(name: &str, position: &str) -> String {
    format!(
        "<landmark><name>{name}</name><model>model/{name}.glb</model><position>{position}</position><info>{name} description</info></landmark>"
    )
}

/// Writes a scene document plus one model per landmark; the globe texture is left out.
fn write_scene(dir: &Path, preset: &str) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("model")).expect("model dir");
    for name in ["Front", "Back"] {
        fs::write(dir.join(format!("model/{name}.glb")), TRIANGLE_GLB.as_slice()).expect("write model");
    }
    let scene = format!(
        "<viewer><preset>{preset}</preset>{}{}</viewer>",
        landmark("Front", "0 0 5.1"),
        landmark("Back", "0 0 -5.1")
    );
    let path = dir.join("scene.xml");
    fs::write(&path, scene).expect("write scene");
    path
}

#[test]
fn summary_reports_landmark_visibility() {
    let dir = TempDir::new().expect("temp dir");
    let scene = write_scene(dir.path(), "labels");
    let mut cmd = Command::cargo_bin("globe-landmarks").expect("binary exists");
    cmd.arg(&scene).arg("--summary-only").arg("--frames").arg("3");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 2 landmark(s)"))
        .stdout(contains(" - Front: visible at (640, 360)"))
        .stdout(contains(" - Back: hidden"))
        .stdout(contains("Info:").not());
}

#[test]
fn summary_shows_nearby_landmark_info() {
    let dir = TempDir::new().expect("temp dir");
    let scene = write_scene(dir.path(), "proximity");
    let mut cmd = Command::cargo_bin("globe-landmarks").expect("binary exists");
    cmd.arg(&scene).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Info: Front description"));
}

#[test]
fn missing_models_leave_landmarks_out() {
    let dir = TempDir::new().expect("temp dir");
    let scene = write_scene(dir.path(), "labels");
    fs::remove_file(dir.path().join("model/Back.glb")).expect("remove model");
    let mut cmd = Command::cargo_bin("globe-landmarks").expect("binary exists");
    cmd.arg(&scene).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 1 landmark(s)"))
        .stdout(contains("Back").not());
}

#[test]
fn rejects_bad_invocations() {
    Command::cargo_bin("globe-landmarks")
        .expect("binary exists")
        .assert()
        .failure()
        .stderr(contains("Usage: globe-landmarks"));

    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("scene.xml");
    fs::write(&path, "<viewer><camera><position>0 12</position></camera></viewer>").expect("write");
    Command::cargo_bin("globe-landmarks")
        .expect("binary exists")
        .arg(&path)
        .arg("--summary-only")
        .assert()
        .failure()
        .stderr(contains("failed to parse scene"));
}
