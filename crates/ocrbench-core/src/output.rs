//! Result file persistence.
//!
//! A run writes one results file (a JSON array of document entries, or a
//! single entry in single-document mode), optional interim snapshots next
//! to it, and optionally a `_summary.json` companion.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::models::record::DocumentReport;

/// Write any serializable value as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;
    fs::write(output_path, json)?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResultsFile {
    Batch(Vec<DocumentReport>),
    Single(DocumentReport),
}

/// Load a results file written by a batch or single-document run.
pub fn load_reports(path: &Path) -> Result<Vec<DocumentReport>> {
    let content = fs::read_to_string(path)?;
    let parsed: ResultsFile = serde_json::from_str(&content)
        .map_err(|e| BenchError::Config(format!("{} is not a results file: {}", path.display(), e)))?;

    Ok(match parsed {
        ResultsFile::Batch(reports) => reports,
        ResultsFile::Single(report) => vec![report],
    })
}

/// `<dir>/<stem>_summary.json` for a results file.
pub fn summary_path(output_path: &Path) -> PathBuf {
    sibling(output_path, "summary")
}

/// `<dir>/<stem>_interim_<n>.json` for the snapshot after `n` documents.
pub fn snapshot_path(output_path: &Path, documents_done: usize) -> PathBuf {
    sibling(output_path, &format!("interim_{}", documents_done))
}

/// `<results_dir>/benchmark_<YYYYmmdd_HHMMSS>.json`
pub fn default_output_path(results_dir: &Path, at: DateTime<Utc>) -> PathBuf {
    results_dir.join(format!("benchmark_{}.json", at.format("%Y%m%d_%H%M%S")))
}

fn sibling(output_path: &Path, suffix: &str) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "benchmark".to_string());
    output_path.with_file_name(format!("{}_{}.json", stem, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::record::group_by_document;
    use crate::models::record::tests::{failure, success};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_write_json_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("subdir/results.json");

        write_json(&Vec::<DocumentReport>::new(), &output_path).unwrap();
        assert_eq!(fs::read_to_string(&output_path).unwrap(), "[]");
    }

    #[test]
    fn test_load_batch_and_single() {
        let temp_dir = TempDir::new().unwrap();
        let reports = group_by_document(&[
            success("a.png", "paddleocr", "hola", 90.0, 1.0),
            failure("b.png", "doctr", EngineError::Unavailable("missing".into())),
        ]);

        let batch = temp_dir.path().join("batch.json");
        write_json(&reports, &batch).unwrap();
        assert_eq!(load_reports(&batch).unwrap(), reports);

        let single = temp_dir.path().join("single.json");
        write_json(&reports[0], &single).unwrap();
        assert_eq!(load_reports(&single).unwrap(), vec![reports[0].clone()]);
    }

    #[test]
    fn test_load_rejects_other_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"scoring": {}}"#).unwrap();
        assert!(matches!(load_reports(&path), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_companion_paths() {
        let output = Path::new("results/run.json");
        assert_eq!(summary_path(output), PathBuf::from("results/run_summary.json"));
        assert_eq!(snapshot_path(output, 20), PathBuf::from("results/run_interim_20.json"));

        let at = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 5).unwrap();
        assert_eq!(
            default_output_path(Path::new("results"), at),
            PathBuf::from("results/benchmark_20240115_093005.json")
        );
    }
}
