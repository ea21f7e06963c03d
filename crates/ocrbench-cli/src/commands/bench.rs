//! Bench command - run engines over a document or dataset.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use clap::{ArgGroup, Args};
use console::style;
use tracing::{info, warn};

use ocrbench_core::output::{default_output_path, summary_path, write_json};
use ocrbench_core::{BenchmarkRunner, EngineKind, RunInput, RunOptions};

use crate::display::{ProgressObserver, ReportFormat, render};

/// Arguments for the bench command.
#[derive(Args)]
#[command(group(ArgGroup::new("input").required(true).args(["image", "dataset"])))]
pub struct BenchArgs {
    /// Single document to process
    #[arg(long)]
    image: Option<PathBuf>,

    /// Directory of documents to process
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Engines to run, in order (default: all)
    #[arg(
        short,
        long = "models",
        visible_alias = "extractors",
        num_args = 1..,
        value_delimiter = ',',
        value_parser = |s: &str| s.parse::<EngineKind>()
    )]
    models: Vec<EngineKind>,

    /// Process at most this many documents from the dataset
    #[arg(long)]
    max_images: Option<usize>,

    /// Results file (default: <results_dir>/benchmark_<timestamp>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write an aggregate summary next to the results
    #[arg(long)]
    report: bool,

    /// Format of the summary printed at the end
    #[arg(short, long, value_enum, default_value = "console")]
    format: ReportFormat,

    /// Requested batch size, used to choose the execution device
    #[arg(long)]
    batch_size: Option<usize>,
}

pub async fn run(args: BenchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;

    let input = match (args.image, args.dataset) {
        (Some(image), _) => RunInput::Document(image),
        (None, Some(dataset)) => RunInput::Dataset(dataset),
        (None, None) => anyhow::bail!("Either --image or --dataset is required"),
    };
    if !input.path().exists() {
        anyhow::bail!("Input path does not exist: {}", input.path().display());
    }

    let engines: Vec<String> = if args.models.is_empty() {
        EngineKind::ALL.iter().map(|k| k.as_str().to_string()).collect()
    } else {
        args.models.iter().map(|k| k.as_str().to_string()).collect()
    };

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&config.run.results_dir, Utc::now()));

    let options = RunOptions {
        engines,
        max_documents: args.max_images,
        batch_size: args.batch_size.unwrap_or(config.run.batch_size),
        output: Some(output_path.clone()),
    };

    let mut runner = BenchmarkRunner::new(config);
    let documents = runner.resolve_documents(&input, options.max_documents)?;
    if documents.is_empty() {
        warn!("No documents matched in {}", input.path().display());
    }

    eprintln!(
        "{} Benchmarking {} documents with {}",
        style("ℹ").blue(),
        documents.len(),
        options.engines.join(", ")
    );

    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match on_interrupt(&cancel) {
                Interrupt::Cancel => eprintln!(
                    "{} Finishing the current document, press Ctrl-C again to abort",
                    style("!").yellow()
                ),
                Interrupt::Abort => std::process::exit(130),
            }
        }
    });

    let mut observer = ProgressObserver::new(options.engines.len());
    let outcome = runner.run(&input, &options, &mut observer).await?;
    observer.finish();

    let reports = outcome.reports();
    match (input.is_single(), reports.first()) {
        (true, Some(report)) => write_json(report, &output_path)?,
        _ => write_json(&reports, &output_path)?,
    }
    info!("Wrote {} records to {}", outcome.records.len(), output_path.display());

    if args.report {
        let path = summary_path(&output_path);
        write_json(&outcome.summary, &path)?;
        eprintln!("{} Summary written to {}", style("✓").green(), path.display());
    }

    println!("{}", render(&outcome.summary, args.format)?);

    if outcome.cancelled {
        eprintln!(
            "{} Cancelled after {} of {} documents",
            style("!").yellow(),
            outcome.documents.len(),
            outcome.planned
        );
    }

    let failed = outcome.records.iter().filter(|r| !r.is_success()).count();
    eprintln!(
        "{} Processed {} documents in {:?} ({} successful runs, {} failed)",
        style("✓").green(),
        outcome.documents.len(),
        start.elapsed(),
        style(outcome.records.len() - failed).green(),
        style(failed).red()
    );
    eprintln!("{} Results written to {}", style("✓").green(), output_path.display());

    Ok(())
}

/// What a Ctrl-C does at this point of the run.
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Stop after the current document.
    Cancel,
    /// Exit now; a helper may be hung.
    Abort,
}

fn on_interrupt(cancel: &AtomicBool) -> Interrupt {
    if cancel.swap(true, Ordering::SeqCst) {
        Interrupt::Abort
    } else {
        Interrupt::Cancel
    }
}
