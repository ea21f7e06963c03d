//! Console rendering and live progress.

use std::path::Path;

use clap::ValueEnum;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use ocrbench_core::report::{render_csv, render_json, render_markdown};
use ocrbench_core::{BatchSummary, BenchmarkRecord, EngineOutcome, FieldName, QualityTier, RunObserver};

/// Summary output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored table for the terminal
    Console,
    /// Markdown tables
    Markdown,
    /// JSON document
    Json,
    /// One CSV row per engine
    Csv,
}

pub fn render(summary: &BatchSummary, format: ReportFormat) -> anyhow::Result<String> {
    Ok(match format {
        ReportFormat::Console => render_console(summary),
        ReportFormat::Markdown => render_markdown(summary),
        ReportFormat::Json => render_json(summary)?,
        ReportFormat::Csv => render_csv(summary)?,
    })
}

fn render_console(summary: &BatchSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} {} documents, {} records\n",
        style("Benchmark summary:").bold(),
        summary.total_documents,
        summary.total_records
    ));

    for engine in summary.engines.values() {
        let rate = engine.success_rate * 100.0;
        let rate_styled = if engine.successful == engine.total_tests && engine.total_tests > 0 {
            style(format!("{:.1}%", rate)).green()
        } else if engine.successful == 0 {
            style(format!("{:.1}%", rate)).red()
        } else {
            style(format!("{:.1}%", rate)).yellow()
        };

        out.push('\n');
        out.push_str(&format!("{}\n", style(&engine.engine).cyan().bold()));
        out.push_str(&format!(
            "  success    {}/{} ({})\n",
            engine.successful, engine.total_tests, rate_styled
        ));

        if engine.successful == 0 {
            continue;
        }

        out.push_str(&format!(
            "  time       avg {:.3}s  median {:.3}s  min {:.3}s  max {:.3}s\n",
            engine.timing.avg, engine.timing.median, engine.timing.min, engine.timing.max
        ));
        out.push_str(&format!(
            "  confidence avg {:.1}  min {:.1}  max {:.1}  ({} samples)\n",
            engine.confidence.avg, engine.confidence.min, engine.confidence.max, engine.confidence.samples
        ));

        let tiers: Vec<String> = QualityTier::ALL
            .iter()
            .map(|t| format!("{} {}", t.as_str(), engine.tiers.get(t).copied().unwrap_or(0)))
            .collect();
        out.push_str(&format!("  tiers      {}\n", tiers.join("  ")));

        let fields: Vec<String> = FieldName::ALL
            .iter()
            .map(|f| format!("{} {:.0}%", f, engine.field_rates.get(f).copied().unwrap_or(0.0) * 100.0))
            .collect();
        out.push_str(&format!("  fields     {}\n", fields.join("  ")));
    }

    out
}

/// One status line per engine and document.
pub fn record_line(record: &BenchmarkRecord) -> String {
    let name = record
        .document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| record.document.display().to_string());

    match &record.outcome {
        EngineOutcome::Success(success) => format!(
            "{} {} [{}] {:.2}s conf {:.1} ({})",
            style("✓").green(),
            name,
            record.engine,
            success.processing_time,
            success.confidence,
            success.quality.tier.as_str()
        ),
        EngineOutcome::Failure(failure) => format!(
            "{} {} [{}] {}",
            style("✗").red(),
            name,
            record.engine,
            failure.error
        ),
    }
}

/// Progress bar over engine runs plus a line per record.
pub struct ProgressObserver {
    bar: ProgressBar,
    engines: usize,
}

impl ProgressObserver {
    pub fn new(engines: usize) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} runs {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self { bar, engines }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn println(&self, line: String) {
        if self.bar.is_hidden() {
            eprintln!("{}", line);
        } else {
            self.bar.println(line);
        }
    }
}

impl RunObserver for ProgressObserver {
    fn on_document_start(&mut self, index: usize, total: usize, document: &Path) {
        if index == 0 {
            self.bar.set_length((total * self.engines) as u64);
        }
        let name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_message(name);
    }

    fn on_record(&mut self, record: &BenchmarkRecord) {
        self.println(record_line(record));
        self.bar.inc(1);
    }

    fn on_snapshot(&mut self, path: &Path) {
        self.println(format!("{} Interim snapshot {}", style("ℹ").blue(), path.display()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocrbench_core::{EngineError, EngineFailure};

    #[test]
    fn test_failure_line() {
        console::set_colors_enabled(false);
        let error = EngineError::Unavailable("no command configured".to_string());
        let record = BenchmarkRecord::new(
            Path::new("/data/doc.png"),
            "doctr",
            EngineOutcome::Failure(EngineFailure::new(&error, 0.0)),
        );
        assert_eq!(
            record_line(&record),
            "✗ doc.png [doctr] engine unavailable: no command configured"
        );
    }

    #[test]
    fn test_console_render_lists_engines() {
        console::set_colors_enabled(false);
        let error = EngineError::Unavailable("x".to_string());
        let records = vec![BenchmarkRecord::new(
            Path::new("a.png"),
            "smolvlm",
            EngineOutcome::Failure(EngineFailure::new(&error, 0.0)),
        )];
        let out = render(&ocrbench_core::summarize(&records), ReportFormat::Console).unwrap();
        assert!(out.contains("smolvlm"));
        assert!(out.contains("success    0/1 (0.0%)"));
    }
}
