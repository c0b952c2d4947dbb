//! BDD test runner using cucumber for the fjgate CLI.
//!
//! Feature files live in `features/`. Stub executables are `/bin/sh`
//! scripts, so scenarios that run one are tagged `@unix`.

use assert_cmd::Command;
use cucumber::{World, given, then, when};
use fjgate_domain::max_comparisons;
use fjgate_types::{OutcomeKind, REPORT_SCHEMA_V1, RunReport};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, World)]
pub struct FjgateWorld {
    temp_dir: Option<TempDir>,
    executable: Option<PathBuf>,
    report_path: Option<PathBuf>,
    last_exit_code: Option<i32>,
    last_stdout: String,
    last_stderr: String,
}

impl FjgateWorld {
    fn ensure_temp_dir(&mut self) {
        if self.temp_dir.is_none() {
            self.temp_dir = Some(TempDir::new().expect("Failed to create temp directory"));
        }
    }

    fn temp_path(&self) -> PathBuf {
        self.temp_dir
            .as_ref()
            .expect("Temp dir not initialized")
            .path()
            .to_path_buf()
    }

    #[cfg(unix)]
    fn write_stub(&mut self, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        self.ensure_temp_dir();
        let path = self.temp_path().join("PmergeMe");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write stub");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod stub");
        self.executable = Some(path);
    }

    #[cfg(not(unix))]
    fn write_stub(&mut self, _body: &str) {
        panic!("stub executables need a unix shell");
    }

    fn record(&mut self, output: std::process::Output) {
        self.last_exit_code = Some(output.status.code().unwrap_or(-1));
        self.last_stdout = String::from_utf8_lossy(&output.stdout).to_string();
        self.last_stderr = String::from_utf8_lossy(&output.stderr).to_string();
    }

    fn report(&self) -> RunReport {
        let path = self.report_path.as_ref().expect("Report path not set");
        let text = fs::read_to_string(path).expect("Failed to read report");
        serde_json::from_str(&text).expect("Report should be valid JSON")
    }
}

#[allow(deprecated)]
fn fjgate_cmd() -> Command {
    let mut cmd = Command::cargo_bin("fjgate").expect("Failed to find fjgate binary");
    cmd.env_remove("FJGATE_LOG");
    cmd
}

// ============================================================================
// GIVEN STEPS
// ============================================================================

#[given(expr = "a stub executable that reports {int} comparisons")]
async fn given_constant_stub(world: &mut FjgateWorld, count: u64) {
    world.write_stub(&format!("echo 'Number of comparisons: {count}'"));
}

#[given(expr = "a stub executable that exits with code {int}")]
async fn given_failing_stub(world: &mut FjgateWorld, code: i32) {
    world.write_stub(&format!("exit {code}"));
}

#[given("a stub executable that does not report comparisons")]
async fn given_silent_stub(world: &mut FjgateWorld) {
    world.write_stub("echo \"$@\"");
}

#[given(expr = "a stub executable that reports {int} comparisons for up to {int} numbers and {int} otherwise")]
async fn given_size_dependent_stub(world: &mut FjgateWorld, small: u64, limit: u64, large: u64) {
    world.write_stub(&format!(
        "if [ \"$#\" -le {limit} ]; then\n  echo 'Number of comparisons: {small}'\nelse\n  echo 'Number of comparisons: {large}'\nfi"
    ));
}

// ============================================================================
// WHEN STEPS
// ============================================================================

#[when(expr = "I run fjgate with ranges {string} and times {int}")]
async fn when_run(world: &mut FjgateWorld, ranges: String, times: u32) {
    world.ensure_temp_dir();
    let executable = world.executable.clone().expect("Stub executable not set");
    let report_path = world.temp_path().join("fjgate-report.json");

    let output = fjgate_cmd()
        .current_dir(world.temp_path())
        .arg("run")
        .arg("--executable")
        .arg(&executable)
        .arg("--ranges")
        .arg(&ranges)
        .arg("--times")
        .arg(times.to_string())
        .arg("--color")
        .arg("never")
        .arg("--out")
        .arg(&report_path)
        .output()
        .expect("Failed to execute fjgate run");

    world.record(output);
    world.report_path = Some(report_path);
}

#[when(expr = "I ask fjgate for the bound of {int} numbers")]
async fn when_bound(world: &mut FjgateWorld, n: u64) {
    let output = fjgate_cmd()
        .arg("bound")
        .arg(n.to_string())
        .output()
        .expect("Failed to execute fjgate bound");
    world.record(output);
}

// ============================================================================
// THEN STEPS
// ============================================================================

#[then(expr = "the exit code should be {int}")]
async fn then_exit_code(world: &mut FjgateWorld, expected: i32) {
    assert_eq!(
        world.last_exit_code,
        Some(expected),
        "stdout:\n{}\nstderr:\n{}",
        world.last_stdout,
        world.last_stderr
    );
}

#[then(expr = "stdout should contain {string}")]
async fn then_stdout_contains(world: &mut FjgateWorld, needle: String) {
    assert!(
        world.last_stdout.contains(&needle),
        "expected stdout to contain {needle:?}, got:\n{}",
        world.last_stdout
    );
}

#[then(expr = "stdout should not contain {string}")]
async fn then_stdout_not_contains(world: &mut FjgateWorld, needle: String) {
    assert!(
        !world.last_stdout.contains(&needle),
        "expected stdout not to contain {needle:?}, got:\n{}",
        world.last_stdout
    );
}

#[then(expr = "stderr should contain {string}")]
async fn then_stderr_contains(world: &mut FjgateWorld, needle: String) {
    assert!(
        world.last_stderr.contains(&needle),
        "expected stderr to contain {needle:?}, got:\n{}",
        world.last_stderr
    );
}

#[then(expr = "every result line for the set of {int} numbers should be tagged {word}")]
async fn then_result_tags(world: &mut FjgateWorld, n: u64, tag: String) {
    let header = format!("Testing set of {n} numbers:");
    let block: Vec<&str> = world
        .last_stdout
        .split("\n\n")
        .find(|block| block.starts_with(&header))
        .unwrap_or_else(|| panic!("no block for {n} numbers in:\n{}", world.last_stdout))
        .lines()
        .collect();

    let results = &block[2..5];
    for line in results {
        assert!(line.ends_with(&tag), "{line:?} should end with {tag}");
    }
}

#[then(expr = "the report should hold {int} class result(s)")]
async fn then_report_classes(world: &mut FjgateWorld, expected: usize) {
    let report = world.report();
    assert_eq!(report.schema, REPORT_SCHEMA_V1);
    assert_eq!(report.classes.len(), expected);
    for class in &report.classes {
        assert_eq!(class.bound, max_comparisons(class.size_class.count()));
    }
}

#[then(expr = "the report should record a process failure with code {int}")]
async fn then_report_process_failure(world: &mut FjgateWorld, code: i32) {
    let report = world.report();
    assert!(!report.all_passed);
    let fatal = report.fatal.expect("Report should record the fatal trial");
    assert_eq!(fatal.outcome.kind, OutcomeKind::ProcessFailure { exit_code: code });
}

#[then("the report should record a parse failure")]
async fn then_report_parse_failure(world: &mut FjgateWorld) {
    let report = world.report();
    let fatal = report.fatal.expect("Report should record the fatal trial");
    assert_eq!(fatal.outcome.kind, OutcomeKind::ParseFailure);
}

#[then(expr = "stdout should show F\\({int}\\) = {int}")]
async fn then_bound_line(world: &mut FjgateWorld, n: u64, bound: u64) {
    assert_eq!(world.last_stdout.trim_end(), format!("F({n}) = {bound}"));
}

// ============================================================================
// MAIN FUNCTION
// ============================================================================

#[tokio::main]
async fn main() {
    #[cfg(unix)]
    {
        FjgateWorld::run("features/").await;
    }

    #[cfg(not(unix))]
    {
        FjgateWorld::cucumber()
            .filter_run("features/", |_feature, _rule, scenario| {
                !scenario.tags.iter().any(|tag| tag.to_lowercase() == "unix")
            })
            .await;
    }
}
