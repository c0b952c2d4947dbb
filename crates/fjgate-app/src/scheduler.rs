//! Concurrent fan-out of trials for one size class.
//!
//! Workers on a rayon pool each generate their own input, run the
//! executable and publish the outcome on a channel. The collector reads
//! outcomes in completion order and raises an abort flag on the first fatal
//! one: trials that have not started are skipped, running ones drain.

use crate::TrialRunner;
use anyhow::Context;
use fjgate_adapters::ProcessRunner;
use fjgate_domain::{generate_input, trial_rng};
use fjgate_types::{SizeClass, TrialOutcome};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything collected while running one size class.
#[derive(Debug, Clone)]
pub struct ClassRun {
    /// Completion order.
    pub outcomes: Vec<TrialOutcome>,

    /// First fatal outcome to arrive, if any.
    pub first_fatal: Option<TrialOutcome>,

    /// Trials never started because of an abort.
    pub skipped: u32,
}

pub struct TrialScheduler<R: ProcessRunner> {
    trial_runner: TrialRunner<R>,
    pool: ThreadPool,
    seed: Option<u64>,
}

impl<R: ProcessRunner> TrialScheduler<R> {
    pub fn new(trial_runner: TrialRunner<R>, jobs: usize, seed: Option<u64>) -> anyhow::Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("fjgate-worker-{i}"))
            .build()
            .context("failed to build worker pool")?;

        Ok(Self {
            trial_runner,
            pool,
            seed,
        })
    }

    pub fn jobs(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `times` trials of `size_class` and wait for all of them.
    ///
    /// `class_index` only feeds the per-trial seed derivation. An error is
    /// returned when a trial could not be run at all (spawn failure); fatal
    /// trial outcomes are reported through [`ClassRun::first_fatal`].
    pub fn run_class(
        &self,
        class_index: usize,
        size_class: SizeClass,
        times: u32,
    ) -> anyhow::Result<ClassRun> {
        let (tx, rx) = crossbeam_channel::unbounded::<anyhow::Result<TrialOutcome>>();
        let abort = AtomicBool::new(false);

        let mut outcomes = Vec::with_capacity(times as usize);
        let mut first_fatal: Option<TrialOutcome> = None;
        let mut first_error: Option<anyhow::Error> = None;

        std::thread::scope(|scope| {
            let abort = &abort;

            scope.spawn(move || {
                self.pool.scope(|s| {
                    for trial in 0..times {
                        let tx = tx.clone();
                        s.spawn(move |_| {
                            if abort.load(Ordering::Acquire) {
                                return;
                            }
                            let mut rng = trial_rng(self.seed, class_index, trial);
                            let input = generate_input(&size_class, &mut rng);
                            // The collector outlives every sender.
                            let _ = tx.send(self.trial_runner.run(input));
                        });
                    }
                });
                // Last sender dropped here; the collector loop below ends.
                drop(tx);
            });

            for result in rx.iter() {
                match result {
                    Ok(outcome) => {
                        if outcome.is_fatal() && first_fatal.is_none() {
                            abort.store(true, Ordering::Release);
                            tracing::info!(range = %size_class, kind = ?outcome.kind, "fatal trial, aborting class");
                            first_fatal = Some(outcome.clone());
                        }
                        outcomes.push(outcome);
                    }
                    Err(err) => {
                        abort.store(true, Ordering::Release);
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }
        });

        if let Some(err) = first_error {
            return Err(err.context(format!("trial for range {size_class} could not run")));
        }

        let skipped = times.saturating_sub(outcomes.len() as u32);
        tracing::debug!(
            range = %size_class,
            collected = outcomes.len(),
            skipped,
            "class finished"
        );

        Ok(ClassRun {
            outcomes,
            first_fatal,
            skipped,
        })
    }
}
