//! Text and Markdown renderers for harness results.
//!
//! Everything here is pure: callers decide which stream a string goes to and
//! which [`Palette`] to paint with.

use fjgate_types::{ClassResult, FatalTrial, OutcomeKind, RunReport, SizeClass, TrialInput};

/// Visible width a result line is padded to before its PASS/FAIL tag.
pub const ALIGN: usize = 50;

const LABEL_WIDTH: usize = 29;

pub const COMPARISONS_HINT: &str = "Please modify your executable to count the amount of comparisons \
     and print them in format: Number of comparisons: <count>";

/// Escape sequences used to style the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub highlight: &'static str,
    pub pass: &'static str,
    pub fail: &'static str,
    pub worst: &'static str,
    pub best: &'static str,
    pub average: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub const fn ansi() -> Self {
        Self {
            highlight: "\x1b[93m",
            pass: "\x1b[92m",
            fail: "\x1b[91m",
            worst: "\x1b[92m",
            best: "\x1b[94m",
            average: "\x1b[96m",
            reset: "\x1b[0m",
        }
    }

    pub const fn plain() -> Self {
        Self {
            highlight: "",
            pass: "",
            fail: "",
            worst: "",
            best: "",
            average: "",
            reset: "",
        }
    }

    fn paint(&self, style: &str, text: &str) -> String {
        if style.is_empty() {
            text.to_string()
        } else {
            format!("{style}{text}{}", self.reset)
        }
    }
}

pub fn render_class_header(size_class: &SizeClass) -> String {
    format!("Testing set of {} numbers:", size_class.count())
}

/// Bound line followed by the worst, best and average lines.
pub fn render_class_result(result: &ClassResult, palette: &Palette) -> String {
    let n = result.size_class.count();
    let bound = result.bound;

    let mut out = format!(
        "Maximal comparisons allowed: F({}) = {}\n",
        palette.paint(palette.highlight, &n.to_string()),
        palette.paint(palette.highlight, &bound.to_string()),
    );
    out.push_str(&stat_line(
        "Worst result:",
        &result.worst.to_string(),
        result.worst > bound,
        palette.worst,
        palette,
    ));
    out.push('\n');
    out.push_str(&stat_line(
        "Best result:",
        &result.best.to_string(),
        result.best > bound,
        palette.best,
        palette,
    ));
    out.push('\n');
    out.push_str(&stat_line(
        "Average result:",
        &format!("{:.1}", result.average),
        result.average > bound as f64,
        palette.average,
        palette,
    ));
    out
}

fn stat_line(label: &str, value: &str, over: bool, ok_style: &str, palette: &Palette) -> String {
    let label = format!("{label:<width$}", width = LABEL_WIDTH);
    let visible = label.len() + value.len();
    let padding = " ".repeat(ALIGN.saturating_sub(visible));

    let (value_style, tag) = if over {
        (palette.fail, palette.paint(palette.fail, "FAIL"))
    } else {
        (ok_style, palette.paint(palette.pass, "PASS"))
    };
    format!("{label}{}{padding}{tag}", palette.paint(value_style, value))
}

pub fn render_exceeded_warning(input: &TrialInput) -> String {
    format!("Maximal number of comparisons is exceeded on input:\n{input}")
}

/// Diagnostic for the trial that stopped the run.
pub fn render_fatal(fatal: &FatalTrial) -> String {
    let outcome = &fatal.outcome;
    let mut out = match outcome.kind {
        OutcomeKind::ProcessFailure { exit_code } => {
            format!("Executable failed with {exit_code} on input:\n{}", outcome.input)
        }
        OutcomeKind::ParseFailure => {
            format!("{COMPARISONS_HINT}\nFailed on input:\n{}", outcome.input)
        }
        OutcomeKind::TimedOut => {
            format!("Executable timed out on input:\n{}", outcome.input)
        }
        // Never constructed as fatal.
        OutcomeKind::Success { comparisons } => {
            format!("Executable reported {comparisons} comparisons on input:\n{}", outcome.input)
        }
    };

    if let Some(stderr) = outcome.stderr.as_deref().map(str::trim_end)
        && !stderr.is_empty()
    {
        out.push_str("\nstderr:\n");
        out.push_str(stderr);
    }
    out
}

pub fn render_verdict(all_passed: bool, palette: &Palette) -> String {
    if all_passed {
        palette.paint(palette.pass, "ALL OF THE TESTS PASSED")
    } else {
        palette.paint(palette.fail, "SOME OF THE TESTS FAILED")
    }
}

pub fn render_markdown(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str(if report.all_passed {
        "✅ fjgate: pass"
    } else {
        "❌ fjgate: fail"
    });
    out.push_str("\n\n");

    out.push_str(&format!(
        "**Executable:** `{}` ({} trials per range)\n\n",
        report.settings.executable, report.settings.times
    ));

    out.push_str("| range | n | bound | worst | best | average | status |\n");
    out.push_str("|---|---:|---:|---:|---:|---:|---|\n");

    for class in &report.classes {
        let status = if class.passed() { "✅" } else { "❌" };
        out.push_str(&format!(
            "| `{range}` | {n} | {bound} | {worst} | {best} | {avg:.1} | {status} |\n",
            range = class.size_class,
            n = class.size_class.count(),
            bound = class.bound,
            worst = class.worst,
            best = class.best,
            avg = class.average,
        ));
    }

    let mut notes = Vec::new();
    for class in report.classes.iter().filter(|c| c.exceeded_bound) {
        notes.push(format!(
            "`{}`: {} of {} trials exceeded F({}) = {}",
            class.size_class,
            class.exceeded_inputs.len(),
            class.trials,
            class.size_class.count(),
            class.bound
        ));
    }
    if let Some(fatal) = &report.fatal {
        let what = match fatal.outcome.kind {
            OutcomeKind::ProcessFailure { exit_code } => format!("exited with {exit_code}"),
            OutcomeKind::ParseFailure => "did not report its comparison count".to_string(),
            OutcomeKind::TimedOut => "timed out".to_string(),
            OutcomeKind::Success { .. } => "succeeded".to_string(),
        };
        notes.push(format!(
            "`{}`: executable {what}; remaining ranges were not run",
            fatal.size_class
        ));
    }

    if !notes.is_empty() {
        out.push_str("\n**Notes:**\n");
        for note in notes {
            out.push_str(&format!("- {note}\n"));
        }
    }

    out
}
