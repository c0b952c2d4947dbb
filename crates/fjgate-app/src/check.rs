//! CheckUseCase - run every configured size class and build the report.
//!
//! 1. Builds the worker pool once for the whole run
//! 2. Schedules the trials of each class in configured order
//! 3. Aggregates each class against its bound
//! 4. Stops at the first fatal trial; bound violations only mark the run failed

use crate::{Clock, TrialRunner, TrialScheduler};
use anyhow::Context;
use fjgate_adapters::ProcessRunner;
use fjgate_domain::{aggregate_class, all_passed, max_comparisons};
use fjgate_types::{
    ClassResult, FatalTrial, HostInfo, REPORT_SCHEMA_V1, RunMeta, RunReport, RunSettings,
    SizeClass, ToolInfo,
};
use std::path::PathBuf;
use std::time::Duration;

/// Request for the check use case.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Already validated and absolute.
    pub executable: PathBuf,

    pub ranges: Vec<SizeClass>,

    /// Trials per size class.
    pub times: u32,

    /// Worker threads.
    pub jobs: usize,

    pub timeout: Option<Duration>,

    pub seed: Option<u64>,

    /// Max bytes captured from stdout/stderr per trial.
    pub output_cap_bytes: usize,
}

/// Progress callbacks, called on the orchestrating thread.
pub trait ClassObserver {
    fn class_started(&mut self, _size_class: &SizeClass, _bound: u64) {}

    /// Not called for the class that hit a fatal trial.
    fn class_finished(&mut self, _result: &ClassResult) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ClassObserver for NoopObserver {}

pub struct CheckUseCase<R: ProcessRunner + Clone, C: Clock> {
    runner: R,
    clock: C,
    tool: ToolInfo,
}

impl<R: ProcessRunner + Clone, C: Clock> CheckUseCase<R, C> {
    pub fn new(runner: R, clock: C, tool: ToolInfo) -> Self {
        Self {
            runner,
            clock,
            tool,
        }
    }

    pub fn execute(
        &self,
        req: CheckRequest,
        observer: &mut dyn ClassObserver,
    ) -> anyhow::Result<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = self.clock.now_rfc3339();

        let trial_runner = TrialRunner::new(
            self.runner.clone(),
            &req.executable,
            req.timeout,
            req.output_cap_bytes,
        );
        let scheduler = TrialScheduler::new(trial_runner, req.jobs, req.seed)?;
        tracing::info!(
            executable = %req.executable.display(),
            jobs = scheduler.jobs(),
            times = req.times,
            classes = req.ranges.len(),
            "starting run"
        );

        let mut classes: Vec<ClassResult> = Vec::with_capacity(req.ranges.len());
        let mut fatal: Option<FatalTrial> = None;

        for (index, &size_class) in req.ranges.iter().enumerate() {
            let bound = max_comparisons(size_class.count());
            observer.class_started(&size_class, bound);

            let run = scheduler.run_class(index, size_class, req.times)?;

            if let Some(outcome) = run.first_fatal {
                // Keep whatever succeeded before the abort for the report.
                if let Ok(partial) = aggregate_class(size_class, &run.outcomes) {
                    classes.push(partial);
                }
                fatal = Some(FatalTrial {
                    size_class,
                    outcome,
                });
                break;
            }

            let result = aggregate_class(size_class, &run.outcomes)
                .with_context(|| format!("aggregating range {size_class}"))?;
            if result.exceeded_bound {
                tracing::info!(
                    range = %size_class,
                    bound,
                    worst = result.worst,
                    offending = result.exceeded_inputs.len(),
                    "bound exceeded"
                );
            }
            observer.class_finished(&result);
            classes.push(result);
        }

        let all_passed = all_passed(&classes, fatal.as_ref());
        let ended_at = self.clock.now_rfc3339();

        Ok(RunReport {
            schema: REPORT_SCHEMA_V1.to_string(),
            tool: self.tool.clone(),
            run: RunMeta {
                id: run_id,
                started_at,
                ended_at,
                host: HostInfo {
                    os: std::env::consts::OS.to_string(),
                    arch: std::env::consts::ARCH.to_string(),
                },
            },
            settings: RunSettings {
                executable: req.executable.to_string_lossy().into_owned(),
                ranges: req.ranges,
                times: req.times,
                jobs: scheduler.jobs(),
                timeout_ms: req.timeout.map(|d| d.as_millis() as u64),
                seed: req.seed,
            },
            classes,
            fatal,
            all_passed,
        })
    }
}
