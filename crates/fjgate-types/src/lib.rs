//! Shared types for fjgate.
//!
//! Design goal: versioned, explicit, boring.
//! These structs are used for run reports, config files and the in-memory
//! trial pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const REPORT_SCHEMA_V1: &str = "fjgate.report.v1";

/// Line the target executable must print, minus the count.
pub const COMPARISONS_LINE_PREFIX: &str = "Number of comparisons: ";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunMeta {
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub host: HostInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("range {start}-{end} is empty (start must be below end)")]
pub struct EmptyRangeError {
    pub start: u64,
    pub end: u64,
}

/// Half-open range `[start, end)` of values permuted in one batch of trials.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(try_from = "RawSizeClass")]
pub struct SizeClass {
    start: u64,
    end: u64,
}

/// Wire shape of [`SizeClass`] before `start < end` is checked.
#[derive(Deserialize, JsonSchema)]
struct RawSizeClass {
    start: u64,
    end: u64,
}

impl TryFrom<RawSizeClass> for SizeClass {
    type Error = EmptyRangeError;

    fn try_from(raw: RawSizeClass) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl SizeClass {
    pub fn new(start: u64, end: u64) -> Result<Self, EmptyRangeError> {
        if start >= end {
            return Err(EmptyRangeError { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of distinct values in the class.
    pub fn count(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn values(&self) -> std::ops::Range<u64> {
        self.start..self.end
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One generated argv tail: decimal tokens in shuffled order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct TrialInput {
    tokens: Vec<String>,
}

impl TrialInput {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Space-separated tokens, ready to paste back onto a command line.
impl fmt::Display for TrialInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    Success { comparisons: u64 },

    /// The executable exited nonzero (`-1` when killed by a signal).
    ProcessFailure { exit_code: i32 },

    /// Exit code 0 but no `Number of comparisons: <n>` line on stdout.
    ParseFailure,

    /// Killed after exceeding the configured per-trial timeout.
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TrialOutcome {
    pub input: TrialInput,

    #[serde(flatten)]
    pub kind: OutcomeKind,

    /// Captured stderr (bytes interpreted as UTF-8 lossily).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl TrialOutcome {
    pub fn comparisons(&self) -> Option<u64> {
        match self.kind {
            OutcomeKind::Success { comparisons } => Some(comparisons),
            _ => None,
        }
    }

    /// Anything other than a success ends the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind, OutcomeKind::Success { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ClassResult {
    pub size_class: SizeClass,

    /// Worst-case comparisons allowed for `size_class.count()` elements.
    pub bound: u64,

    /// Outcomes collected (may be below the requested count after an abort).
    pub trials: u32,

    pub successes: u32,

    pub worst: u64,
    pub best: u64,
    pub average: f64,

    pub exceeded_bound: bool,
    pub fatal: bool,

    /// Inputs whose reported count was above `bound`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceeded_inputs: Vec<TrialInput>,
}

impl ClassResult {
    pub fn passed(&self) -> bool {
        !self.exceeded_bound && !self.fatal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FatalTrial {
    pub size_class: SizeClass,
    pub outcome: TrialOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunSettings {
    /// Absolute path of the executable under test.
    pub executable: String,

    pub ranges: Vec<SizeClass>,

    pub times: u32,

    pub jobs: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RunReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub run: RunMeta,
    pub settings: RunSettings,

    /// One entry per evaluated class, in configured order.
    pub classes: Vec<ClassResult>,

    /// First fatal trial in completion order; later classes were skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<FatalTrial>,

    pub all_passed: bool,
}

// ----------------------------
// Optional config file schema
// ----------------------------

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    /// Same grammar as `--ranges`, e.g. "0-10, 0-21".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranges: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub times: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Duration string parseable by humantime, e.g. "2s".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cap_bytes: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_class_rejects_empty_and_reversed_ranges() {
        assert_eq!(
            SizeClass::new(5, 5),
            Err(EmptyRangeError { start: 5, end: 5 })
        );
        assert!(SizeClass::new(10, 3).is_err());
    }

    #[test]
    fn size_class_count_is_end_minus_start() {
        let class = SizeClass::new(1, 10).unwrap();
        assert_eq!(class.count(), 9);
        assert_eq!(class.values().collect::<Vec<_>>().len(), 9);
        assert_eq!(class.to_string(), "1-10");
    }

    #[test]
    fn size_class_deserialization_checks_bounds() {
        let class: SizeClass = serde_json::from_str(r#"{"start":0,"end":21}"#).unwrap();
        assert_eq!(class.count(), 21);

        for bad in [r#"{"start":5,"end":5}"#, r#"{"start":21,"end":0}"#] {
            let err = serde_json::from_str::<SizeClass>(bad).unwrap_err();
            assert!(err.to_string().contains("is empty"), "{bad}: {err}");
        }
    }

    #[test]
    fn trial_input_displays_space_separated() {
        let input = TrialInput::new(vec!["3".into(), "1".into(), "2".into()]);
        assert_eq!(input.to_string(), "3 1 2");
        assert_eq!(input.len(), 3);
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let outcome = TrialOutcome {
            input: TrialInput::new(vec!["1".into(), "0".into()]),
            kind: OutcomeKind::ProcessFailure { exit_code: 2 },
            stderr: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "process_failure");
        assert_eq!(json["exit_code"], 2);
        assert_eq!(json["input"], serde_json::json!(["1", "0"]));

        let back: TrialOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn only_success_is_non_fatal() {
        let mk = |kind| TrialOutcome {
            input: TrialInput::default(),
            kind,
            stderr: None,
        };
        assert!(!mk(OutcomeKind::Success { comparisons: 3 }).is_fatal());
        assert!(mk(OutcomeKind::ParseFailure).is_fatal());
        assert!(mk(OutcomeKind::TimedOut).is_fatal());
        assert!(mk(OutcomeKind::ProcessFailure { exit_code: 1 }).is_fatal());
    }

    #[test]
    fn config_file_parses_defaults_table() {
        let cfg: ConfigFile = toml::from_str(
            r#"
            [defaults]
            executable = "./PmergeMe"
            ranges = "0-10, 0-21"
            times = 50
            color = "never"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.defaults.times, Some(50));
        assert_eq!(cfg.defaults.color, Some(ColorMode::Never));
        assert_eq!(cfg.defaults.ranges.as_deref(), Some("0-10, 0-21"));
    }

    #[test]
    fn empty_config_file_is_valid() {
        let cfg: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(cfg, ConfigFile::default());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn class_result_serialization_round_trip(
                start in 0u64..1000,
                len in 1u64..1000,
                bound in any::<u32>(),
                best in 0u64..1000,
                spread in 0u64..1000,
                fatal in any::<bool>(),
            ) {
                let worst = best + spread;
                let result = ClassResult {
                    size_class: SizeClass::new(start, start + len).unwrap(),
                    bound: bound as u64,
                    trials: 4,
                    successes: 4,
                    worst,
                    best,
                    average: (worst + best) as f64 / 2.0,
                    exceeded_bound: worst > bound as u64,
                    fatal,
                    exceeded_inputs: vec![],
                };
                let json = serde_json::to_string(&result).unwrap();
                let back: ClassResult = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(back, result);
            }
        }
    }
}
