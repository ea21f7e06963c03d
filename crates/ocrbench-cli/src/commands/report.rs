//! Report command - summarize an existing results file.

use std::path::PathBuf;

use clap::Args;

use ocrbench_core::models::record::flatten_reports;
use ocrbench_core::output::load_reports;
use ocrbench_core::summarize;

use crate::display::{ReportFormat, render};

/// Arguments for the report command.
#[derive(Args)]
pub struct ReportArgs {
    /// Results file written by `ocrbench bench`
    results: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "console")]
    format: ReportFormat,

    /// Write the rendered report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: ReportArgs) -> anyhow::Result<()> {
    if !args.results.exists() {
        anyhow::bail!("Results file not found: {}", args.results.display());
    }

    let reports = load_reports(&args.results)?;
    let summary = summarize(&flatten_reports(&reports));
    let rendered = render(&summary, args.format)?;

    match args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, rendered)?;
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
