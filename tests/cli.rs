use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::cargo_bin("mr-pipeline").unwrap()
}

#[test]
fn test_missing_dir_exits_with_usage() {
    cmd()
        .args(["-m", "2"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_zero_map_workers_rejected() {
    let input = TempDir::new().unwrap();
    cmd()
        .arg("-d")
        .arg(input.path())
        .args(["-m", "0"])
        .assert()
        .code(1);
}

#[test]
fn test_nonexistent_dir_fails() {
    let tmp = TempDir::new().unwrap();
    cmd()
        .arg("-d")
        .arg(tmp.path().join("nope"))
        .arg("-o")
        .arg(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not a directory"));
}

#[test]
fn test_run_writes_artifacts_and_combined_output() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::write(input.path().join("a.txt"), "hello hello").unwrap();
    fs::write(input.path().join("b.txt"), "hello world").unwrap();
    let combined = output.path().join("combined.txt");

    cmd()
        .arg("-d")
        .arg(input.path())
        .args(["-m", "2", "-r", "3"])
        .arg("-o")
        .arg(output.path())
        .arg("--combine")
        .arg(&combined)
        .assert()
        .success();

    for i in 0..3 {
        assert!(output.path().join(format!("reduce-{i}.out")).exists());
    }
    assert_eq!(
        fs::read_to_string(combined).unwrap(),
        "hello 3\nworld 1\n"
    );
}

#[test]
fn test_sequential_mode() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    fs::write(input.path().join("a.txt"), "one two two").unwrap();

    cmd()
        .arg("-d")
        .arg(input.path())
        .args(["-r", "1", "--sequential"])
        .arg("-o")
        .arg(output.path())
        .assert()
        .success();

    let bytes = fs::read(output.path().join("reduce-0.out")).unwrap();
    assert_eq!(bytes.len(), 2 * mr_pipeline::protocol::RECORD_LEN);
}
