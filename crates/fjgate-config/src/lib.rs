//! Configuration for fjgate.
//!
//! Settings come from three layers: command-line flags, an optional
//! `fjgate.toml` file, and built-in defaults. Flags win over the file, the
//! file wins over defaults. Everything here is validated before any trial
//! runs.

use fjgate_types::{ColorMode, ConfigFile, EmptyRangeError, SizeClass};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_EXECUTABLE: &str = "./PmergeMe";
pub const DEFAULT_RANGES: &str = "0-10, 0-15, 0-18, 0-19, 0-20, 0-21, 0-23, 0-25, 0-30, 0-50, 0-100";
pub const DEFAULT_TIMES: u32 = 1000;
pub const DEFAULT_OUTPUT_CAP_BYTES: usize = 8 * 1024 * 1024;

/// Largest argument block a single trial may need: half of the usual 2 MiB
/// Linux `ARG_MAX`, leaving the rest for the environment.
pub const MAX_ARGV_BYTES: u64 = 1024 * 1024;

const RANGE_FORMAT_HINT: &str = "Use non-negative numbers. Format: start-end[, ... start-end]";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("not a valid range: {input}. {}", RANGE_FORMAT_HINT)]
    InvalidRange { input: String },

    #[error("not a valid range: {input}. {source}")]
    EmptyRange {
        input: String,
        #[source]
        source: EmptyRangeError,
    },

    #[error(
        "not a valid range: {input}. {range} needs about {bytes} bytes of arguments per trial, \
         more than the {max} allowed",
        max = MAX_ARGV_BYTES
    )]
    RangeTooLarge {
        input: String,
        range: SizeClass,
        bytes: u64,
    },

    #[error("not a valid times argument: {0}. Please enter a positive number")]
    InvalidTimes(u32),

    #[error("jobs must be at least 1")]
    InvalidJobs,

    #[error("invalid timeout '{input}': {source}")]
    InvalidTimeout {
        input: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

static RANGES_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+-\d+(?:\s*,\s*\d+-\d+)*$").expect("ranges pattern is valid")
});

static RANGES_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("separator pattern is valid"));

/// Parse `start-end[, start-end]*` into size classes. `end` is exclusive.
pub fn parse_ranges(input: &str) -> Result<Vec<SizeClass>, ConfigError> {
    let trimmed = input.trim();
    if !RANGES_SYNTAX.is_match(trimmed) {
        return Err(ConfigError::InvalidRange {
            input: input.to_string(),
        });
    }

    RANGES_SEPARATOR
        .split(trimmed)
        .map(|part| parse_range(part, input))
        .collect()
}

fn parse_range(part: &str, input: &str) -> Result<SizeClass, ConfigError> {
    let invalid = || ConfigError::InvalidRange {
        input: input.to_string(),
    };
    let (start, end) = part.split_once('-').ok_or_else(invalid)?;
    // Digits-only by the syntax check; only overflow can fail here.
    let start: u64 = start.parse().map_err(|_| invalid())?;
    let end: u64 = end.parse().map_err(|_| invalid())?;
    let range = SizeClass::new(start, end).map_err(|source| ConfigError::EmptyRange {
        input: input.to_string(),
        source,
    })?;

    let bytes = argv_bytes(&range);
    if bytes > MAX_ARGV_BYTES {
        return Err(ConfigError::RangeTooLarge {
            input: input.to_string(),
            range,
            bytes,
        });
    }
    Ok(range)
}

/// Bytes the kernel needs to pass one shuffled permutation of `range` as
/// argv: each token, its NUL terminator and its pointer.
pub fn argv_bytes(range: &SizeClass) -> u64 {
    let (start, end) = (u128::from(range.start()), u128::from(range.end()));
    let pointer = std::mem::size_of::<usize>() as u128;

    let mut total = 0u128;
    let (mut lo, mut hi, mut digits) = (0u128, 10u128, 1u128);
    while lo < end {
        let from = start.max(lo);
        let to = end.min(hi);
        if from < to {
            total += (to - from) * (digits + 1 + pointer);
        }
        lo = hi;
        hi *= 10;
        digits += 1;
    }
    u64::try_from(total).unwrap_or(u64::MAX)
}

pub fn parse_timeout(input: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(input).map_err(|source| ConfigError::InvalidTimeout {
        input: input.to_string(),
        source,
    })
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub executable: Option<PathBuf>,
    pub ranges: Option<String>,
    pub times: Option<u32>,
    pub jobs: Option<usize>,
    pub timeout: Option<String>,
    pub seed: Option<u64>,
    pub output_cap_bytes: Option<usize>,
    pub color: Option<ColorMode>,
}

/// Fully merged and validated settings for one harness run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// As configured; existence and permissions are checked by the adapters.
    pub executable: PathBuf,
    pub ranges: Vec<SizeClass>,
    pub times: u32,
    /// `None` means one worker per available CPU.
    pub jobs: Option<usize>,
    pub timeout: Option<Duration>,
    pub seed: Option<u64>,
    pub output_cap_bytes: usize,
    pub color: ColorMode,
}

pub fn resolve(overrides: Overrides, file: &ConfigFile) -> Result<ResolvedConfig, ConfigError> {
    let defaults = &file.defaults;

    let executable = overrides
        .executable
        .or_else(|| defaults.executable.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXECUTABLE));

    let ranges_text = overrides
        .ranges
        .or_else(|| defaults.ranges.clone())
        .unwrap_or_else(|| DEFAULT_RANGES.to_string());
    let ranges = parse_ranges(&ranges_text)?;

    let times = overrides.times.or(defaults.times).unwrap_or(DEFAULT_TIMES);
    if times == 0 {
        return Err(ConfigError::InvalidTimes(times));
    }

    let jobs = overrides.jobs.or(defaults.jobs);
    if jobs == Some(0) {
        return Err(ConfigError::InvalidJobs);
    }

    let timeout = overrides
        .timeout
        .or_else(|| defaults.timeout.clone())
        .as_deref()
        .map(parse_timeout)
        .transpose()?;

    Ok(ResolvedConfig {
        executable,
        ranges,
        times,
        jobs,
        timeout,
        seed: overrides.seed.or(defaults.seed),
        output_cap_bytes: overrides
            .output_cap_bytes
            .or(defaults.output_cap_bytes)
            .unwrap_or(DEFAULT_OUTPUT_CAP_BYTES),
        color: overrides.color.or(defaults.color).unwrap_or_default(),
    })
}
