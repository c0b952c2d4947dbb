use anyhow::Context;
use clap::{Parser, Subcommand};
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Repo automation for fjgate")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write JSON Schemas for the run report and the config file.
    Schema {
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,

        /// Fail instead of writing when a schema on disk is stale.
        #[arg(long)]
        check: bool,
    },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().cmd {
        Command::Schema { out_dir, check } => {
            let schemas = schemas()?;
            if check {
                check_schemas(&out_dir, &schemas)
            } else {
                write_schemas(&out_dir, &schemas)
            }
        }
    }
}

/// File name and pretty JSON for every published schema.
fn schemas() -> anyhow::Result<Vec<(&'static str, String)>> {
    Ok(vec![
        (
            "fjgate.report.v1.schema.json",
            serde_json::to_string_pretty(&schema_for!(fjgate_types::RunReport))?,
        ),
        (
            "fjgate.config.v1.schema.json",
            serde_json::to_string_pretty(&schema_for!(fjgate_types::ConfigFile))?,
        ),
    ])
}

fn write_schemas(out_dir: &Path, schemas: &[(&str, String)]) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create dir {}", out_dir.display()))?;
    for (name, json) in schemas {
        let path = out_dir.join(name);
        fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    }
    Ok(())
}

fn check_schemas(out_dir: &Path, schemas: &[(&str, String)]) -> anyhow::Result<()> {
    let stale: Vec<&str> = schemas
        .iter()
        .filter(|(name, json)| {
            !fs::read_to_string(out_dir.join(name)).is_ok_and(|on_disk| on_disk == *json)
        })
        .map(|(name, _)| *name)
        .collect();

    if !stale.is_empty() {
        anyhow::bail!(
            "stale schemas in {}: {} (run `cargo run -p xtask -- schema`)",
            out_dir.display(),
            stale.join(", ")
        );
    }
    Ok(())
}
