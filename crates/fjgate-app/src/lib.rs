//! Application layer for fjgate.
//!
//! The app layer coordinates adapters and domain logic.
//! It does not parse CLI flags and it does not do filesystem I/O.

mod check;
pub mod render;
mod scheduler;

pub use check::{CheckRequest, CheckUseCase, ClassObserver, NoopObserver};
pub use scheduler::{ClassRun, TrialScheduler};

use anyhow::Context;
use fjgate_adapters::{CommandSpec, ProcessRunner};
use fjgate_domain::classify;
use fjgate_types::{TrialInput, TrialOutcome};
use std::path::Path;
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

/// Runs the executable under test once per input and classifies the result.
pub struct TrialRunner<R: ProcessRunner> {
    runner: R,
    executable: String,
    timeout: Option<Duration>,
    output_cap_bytes: usize,
}

impl<R: ProcessRunner> TrialRunner<R> {
    pub fn new(
        runner: R,
        executable: &Path,
        timeout: Option<Duration>,
        output_cap_bytes: usize,
    ) -> Self {
        Self {
            runner,
            executable: executable.to_string_lossy().into_owned(),
            timeout,
            output_cap_bytes,
        }
    }

    pub fn run(&self, input: TrialInput) -> anyhow::Result<TrialOutcome> {
        let mut argv = Vec::with_capacity(input.len() + 1);
        argv.push(self.executable.clone());
        argv.extend(input.tokens().iter().cloned());

        let spec = CommandSpec {
            argv,
            timeout: self.timeout,
            output_cap_bytes: self.output_cap_bytes,
        };

        let run = self
            .runner
            .run(&spec)
            .with_context(|| format!("failed to run {}", self.executable))?;

        let stdout = String::from_utf8_lossy(&run.stdout);
        let kind = classify(run.exit_code, run.timed_out, &stdout, run.stdout_truncated);
        tracing::debug!(
            wall_ms = run.wall_ms,
            stdout_truncated = run.stdout_truncated,
            ?kind,
            "trial finished"
        );

        Ok(TrialOutcome {
            input,
            kind,
            stderr: if run.stderr.is_empty() {
                None
            } else {
                Some(String::from_utf8_lossy(&run.stderr).into_owned())
            },
        })
    }
}
