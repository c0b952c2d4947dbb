//! Domain logic for fjgate.
//!
//! This crate is intentionally I/O-free: it does math and policy.
//! The only impurity is seeding a trial RNG from OS entropy when no seed is
//! configured.

use fjgate_types::{ClassResult, FatalTrial, OutcomeKind, SizeClass, TrialInput, TrialOutcome};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("no comparison counts to summarize")]
    NoSamples,

    #[error("no successful trials for range {0}")]
    NoSuccessfulTrials(SizeClass),
}

/// Worst-case comparisons merge-insertion sort may use on `n` elements.
///
/// `F(n) = sum_{k=1..n} ceil(log2(3k/4))`, evaluated term by term in `f64`.
/// Terms are kept signed: the first term is `ceil(log2(0.75))`, which rounds
/// to zero rather than being clamped.
pub fn max_comparisons(n: u64) -> u64 {
    let sum: i64 = (1..=n).map(bound_term).sum();
    u64::try_from(sum).unwrap_or(0)
}

fn bound_term(k: u64) -> i64 {
    let value = (3.0 / 4.0) * k as f64;
    value.log2().ceil() as i64
}

/// Uniformly shuffled permutation of `class`, rendered as decimal tokens.
pub fn generate_input<R: rand::Rng + ?Sized>(class: &SizeClass, rng: &mut R) -> TrialInput {
    let mut values: Vec<u64> = class.values().collect();
    values.shuffle(rng);
    TrialInput::new(values.into_iter().map(|v| v.to_string()).collect())
}

/// Independent RNG for one trial.
///
/// With a seed, trial `trial` of class `class_index` always draws the same
/// permutation, whatever worker runs it and in whatever order.
pub fn trial_rng(seed: Option<u64>, class_index: usize, trial: u32) -> StdRng {
    match seed {
        Some(seed) => {
            let mixed = splitmix64(seed ^ splitmix64(((class_index as u64) << 32) | trial as u64));
            StdRng::seed_from_u64(mixed)
        }
        None => StdRng::from_entropy(),
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

static COMPARISONS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Number of comparisons: ([0-9]+)$").expect("comparisons pattern is valid")
});

/// Comparison count from the first `Number of comparisons: <n>` line.
///
/// The line must match exactly: no leading or trailing whitespace, no sign,
/// and the count must fit in a `u64`.
pub fn parse_comparison_count(stdout: &str) -> Option<u64> {
    let caps = COMPARISONS_LINE.captures(stdout)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Classify one finished run. Timeout beats exit code beats stdout.
///
/// When the capture of `stdout` was cut short, its last line may be a
/// prefix of what the executable printed, so only newline-terminated lines
/// are searched.
pub fn classify(
    exit_code: i32,
    timed_out: bool,
    stdout: &str,
    stdout_truncated: bool,
) -> OutcomeKind {
    if timed_out {
        return OutcomeKind::TimedOut;
    }
    if exit_code != 0 {
        return OutcomeKind::ProcessFailure { exit_code };
    }
    let complete = if stdout_truncated {
        stdout.rfind('\n').map_or("", |end| &stdout[..=end])
    } else {
        stdout
    };
    match parse_comparison_count(complete) {
        Some(comparisons) => OutcomeKind::Success { comparisons },
        None => OutcomeKind::ParseFailure,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonSummary {
    pub worst: u64,
    pub best: u64,
    pub average: f64,
}

pub fn summarize_comparisons(values: &[u64]) -> Result<ComparisonSummary, DomainError> {
    let (Some(&worst), Some(&best)) = (values.iter().max(), values.iter().min()) else {
        return Err(DomainError::NoSamples);
    };
    let total: u128 = values.iter().map(|&v| v as u128).sum();
    let average = total as f64 / values.len() as f64;
    Ok(ComparisonSummary {
        worst,
        best,
        average,
    })
}

/// Fold one class's outcomes into a [`ClassResult`].
///
/// Statistics only cover successes; a class where nothing succeeded is an
/// error rather than an empty summary.
pub fn aggregate_class(
    size_class: SizeClass,
    outcomes: &[TrialOutcome],
) -> Result<ClassResult, DomainError> {
    let bound = max_comparisons(size_class.count());

    let counts: Vec<u64> = outcomes.iter().filter_map(TrialOutcome::comparisons).collect();
    let summary = summarize_comparisons(&counts)
        .map_err(|_| DomainError::NoSuccessfulTrials(size_class))?;

    let exceeded_inputs: Vec<TrialInput> = outcomes
        .iter()
        .filter(|o| o.comparisons().is_some_and(|c| c > bound))
        .map(|o| o.input.clone())
        .collect();

    Ok(ClassResult {
        size_class,
        bound,
        trials: outcomes.len() as u32,
        successes: counts.len() as u32,
        worst: summary.worst,
        best: summary.best,
        average: summary.average,
        exceeded_bound: !exceeded_inputs.is_empty(),
        fatal: outcomes.iter().any(TrialOutcome::is_fatal),
        exceeded_inputs,
    })
}

/// True when every class is within bound and no trial was fatal.
pub fn all_passed(classes: &[ClassResult], fatal: Option<&FatalTrial>) -> bool {
    fatal.is_none() && classes.iter().all(ClassResult::passed)
}
