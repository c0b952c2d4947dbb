use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fjgate_adapters::{AdapterError, StdProcessRunner, available_parallelism, resolve_executable};
use fjgate_app::render::{
    Palette, render_class_header, render_class_result, render_exceeded_warning, render_fatal,
    render_markdown, render_verdict,
};
use fjgate_app::{CheckRequest, CheckUseCase, ClassObserver, SystemClock};
use fjgate_config::{Overrides, load_config, resolve};
use fjgate_domain::max_comparisons;
use fjgate_types::{ClassResult, ColorMode, ConfigFile, RunReport, SizeClass, ToolInfo};
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE_NAME: &str = "fjgate.toml";
const LOG_ENV: &str = "FJGATE_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "fjgate",
    version,
    about = "Checks that a Ford-Johnson sort stays within its comparison bound"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the executable on shuffled inputs and check its comparison counts.
    Run(RunArgs),

    /// Print the maximal number of comparisons F(N) for each N.
    Bound {
        #[arg(required = true)]
        n: Vec<u64>,
    },

    /// Render a Markdown summary from a saved report.
    Md {
        #[arg(long)]
        report: PathBuf,

        /// Output markdown path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Path to the executable to test [default: ./PmergeMe]
    #[arg(short = 'e', long)]
    executable: Option<PathBuf>,

    /// Ranges of non-negative numbers, end exclusive: start-end[, ... start-end]
    #[arg(short = 'r', long)]
    ranges: Option<String>,

    /// Trials per range [default: 1000]
    #[arg(short = 't', long)]
    times: Option<u32>,

    /// Worker threads [default: number of CPUs]
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Per-trial timeout (e.g. "2s")
    #[arg(long)]
    timeout: Option<String>,

    /// Seed for reproducible inputs
    #[arg(long)]
    seed: Option<u64>,

    /// Max bytes captured from stdout/stderr per trial
    #[arg(long)]
    output_cap_bytes: Option<usize>,

    #[arg(long, value_enum)]
    color: Option<ColorArg>,

    /// Config file [default: ./fjgate.toml when present]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the JSON report here
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for ColorMode {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => ColorMode::Auto,
            ColorArg::Always => ColorMode::Always,
            ColorArg::Never => ColorMode::Never,
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    match real_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn real_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Run(args) => run(args),

        Command::Bound { n } => {
            for n in n {
                println!("F({n}) = {}", max_comparisons(n));
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Md { report, out } => {
            let report: RunReport = read_json(&report)?;
            let md = render_markdown(&report);

            match out {
                Some(path) => {
                    fs::write(&path, md).with_context(|| format!("write {}", path.display()))?;
                }
                None => {
                    print!("{md}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let default = Path::new(CONFIG_FILE_NAME);
            if default.is_file() {
                load_config(default)?
            } else {
                ConfigFile::default()
            }
        }
    };

    let cfg = resolve(
        Overrides {
            executable: args.executable,
            ranges: args.ranges,
            times: args.times,
            jobs: args.jobs,
            timeout: args.timeout,
            seed: args.seed,
            output_cap_bytes: args.output_cap_bytes,
            color: args.color.map(ColorMode::from),
        },
        &file,
    )?;

    if cfg.timeout.is_some() && !cfg!(unix) {
        return Err(AdapterError::TimeoutUnsupported.into());
    }

    let executable = resolve_executable(&cfg.executable)?;
    let jobs = cfg.jobs.unwrap_or_else(available_parallelism);
    tracing::debug!(executable = %executable.display(), jobs, "resolved configuration");

    let palette = palette_for(cfg.color);
    let mut observer = TerminalObserver::new(palette);

    let usecase = CheckUseCase::new(StdProcessRunner, SystemClock, tool_info());
    let report = usecase.execute(
        CheckRequest {
            executable,
            ranges: cfg.ranges,
            times: cfg.times,
            jobs,
            timeout: cfg.timeout,
            seed: cfg.seed,
            output_cap_bytes: cfg.output_cap_bytes,
        },
        &mut observer,
    )?;

    if let Some(out) = &args.out {
        write_json(out, &report, args.pretty)?;
    }

    if let Some(fatal) = &report.fatal {
        eprintln!("{}", render_fatal(fatal));
        return Ok(ExitCode::from(1));
    }

    let verdict = render_verdict(report.all_passed, &palette);
    if report.all_passed {
        println!("\n{verdict}");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("\n{verdict}");
        Ok(ExitCode::from(1))
    }
}

/// Prints each class as it runs: header to stdout, exceeded inputs to
/// stderr, then the statistics.
struct TerminalObserver {
    palette: Palette,
    classes_seen: usize,
}

impl TerminalObserver {
    fn new(palette: Palette) -> Self {
        Self {
            palette,
            classes_seen: 0,
        }
    }
}

impl ClassObserver for TerminalObserver {
    fn class_started(&mut self, size_class: &SizeClass, bound: u64) {
        if self.classes_seen > 0 {
            println!();
        }
        self.classes_seen += 1;
        tracing::debug!(range = %size_class, bound, "class started");
        println!("{}", render_class_header(size_class));
    }

    fn class_finished(&mut self, result: &ClassResult) {
        for input in &result.exceeded_inputs {
            eprintln!("{}\n", render_exceeded_warning(input));
        }
        println!("{}", render_class_result(result, &self.palette));
    }
}

fn palette_for(mode: ColorMode) -> Palette {
    let colored = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
            !no_color && std::io::stdout().is_terminal()
        }
    };
    if colored {
        Palette::ansi()
    } else {
        Palette::plain()
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "fjgate".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let v =
        serde_json::from_slice(&bytes).with_context(|| format!("parse json {}", path.display()))?;
    Ok(v)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }

    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    atomic_write(path, &bytes)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = parent.to_path_buf();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
