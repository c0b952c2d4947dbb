//! Integration tests for `fjgate bound` and `fjgate md`.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn fjgate() -> Command {
    Command::cargo_bin("fjgate").expect("failed to find fjgate binary")
}

const REPORT: &str = r#"{
  "schema": "fjgate.report.v1",
  "tool": { "name": "fjgate", "version": "0.3.0" },
  "run": {
    "id": "6a1f",
    "started_at": "2024-01-01T00:00:00Z",
    "ended_at": "2024-01-01T00:00:02Z",
    "host": { "os": "linux", "arch": "x86_64" }
  },
  "settings": {
    "executable": "/work/PmergeMe",
    "ranges": [ { "start": 0, "end": 21 }, { "start": 0, "end": 3 } ],
    "times": 10,
    "jobs": 4
  },
  "classes": [
    {
      "size_class": { "start": 0, "end": 21 },
      "bound": 66,
      "trials": 10,
      "successes": 10,
      "worst": 66,
      "best": 60,
      "average": 63.3,
      "exceeded_bound": false,
      "fatal": false
    },
    {
      "size_class": { "start": 0, "end": 3 },
      "bound": 3,
      "trials": 10,
      "successes": 10,
      "worst": 4,
      "best": 2,
      "average": 2.5,
      "exceeded_bound": true,
      "fatal": false,
      "exceeded_inputs": [ ["2", "1", "0"], ["1", "2", "0"] ]
    }
  ],
  "all_passed": false
}"#;

#[test]
fn bound_prints_each_value() {
    fjgate()
        .args(["bound", "0", "9", "21", "100"])
        .assert()
        .success()
        .stdout("F(0) = 0\nF(9) = 19\nF(21) = 66\nF(100) = 534\n");
}

#[test]
fn bound_requires_an_argument() {
    fjgate().arg("bound").assert().code(2);
}

#[test]
fn md_renders_saved_report_to_stdout() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("report.json");
    fs::write(&report, REPORT).unwrap();

    fjgate()
        .arg("md")
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("❌ fjgate: fail"))
        .stdout(predicate::str::contains("| `0-21` | 21 | 66 | 66 | 60 | 63.3 | ✅ |"))
        .stdout(predicate::str::contains("2 of 10 trials exceeded F(3) = 3"));
}

#[test]
fn md_writes_to_file() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("report.json");
    let out = dir.path().join("summary.md");
    fs::write(&report, REPORT).unwrap();

    fjgate()
        .arg("md")
        .arg("--report")
        .arg(&report)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let md = fs::read_to_string(&out).unwrap();
    assert!(md.contains("**Executable:** `/work/PmergeMe` (10 trials per range)"));
}

#[test]
fn md_reports_unreadable_json() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("report.json");
    fs::write(&report, "{ not json").unwrap();

    fjgate()
        .arg("md")
        .arg("--report")
        .arg(&report)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("parse json"));
}

#[test]
fn md_rejects_report_with_empty_range() {
    let dir = tempdir().unwrap();
    let report = dir.path().join("report.json");
    let broken = REPORT.replacen(r#""start": 0, "end": 21"#, r#""start": 21, "end": 0"#, 1);
    fs::write(&report, broken).unwrap();

    fjgate()
        .arg("md")
        .arg("--report")
        .arg(&report)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("parse json"))
        .stderr(predicate::str::contains("range 21-0 is empty"));
}
