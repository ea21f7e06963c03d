//! Text renderings of a batch summary.

use super::summary::BatchSummary;
use crate::error::{BenchError, Result};
use crate::fields::FieldName;

/// Pretty JSON.
pub fn render_json(summary: &BatchSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Markdown with an engine table and a field extraction table.
pub fn render_markdown(summary: &BatchSummary) -> String {
    let mut out = String::new();

    out.push_str("# OCR Benchmark Summary\n\n");
    out.push_str(&format!(
        "Generated {} over {} documents ({} records).\n\n",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.total_documents,
        summary.total_records
    ));

    if summary.engines.is_empty() {
        out.push_str("_No records._\n");
        return out;
    }

    out.push_str("## Engines\n\n");
    out.push_str(
        "| Engine | Tests | Successful | Success rate | Avg time (s) | Median (s) | Min (s) | Max (s) | Avg conf | Min conf | Max conf | Review |\n",
    );
    out.push_str("|---|---:|---:|---:|---:|---:|---:|---:|---:|---:|---:|---:|\n");
    for engine in summary.engines.values() {
        out.push_str(&format!(
            "| {} | {} | {} | {:.1}% | {:.3} | {:.3} | {:.3} | {:.3} | {:.1} | {:.1} | {:.1} | {} |\n",
            engine.engine,
            engine.total_tests,
            engine.successful,
            engine.success_rate * 100.0,
            engine.timing.avg,
            engine.timing.median,
            engine.timing.min,
            engine.timing.max,
            engine.confidence.avg,
            engine.confidence.min,
            engine.confidence.max,
            engine.review_required,
        ));
    }

    out.push_str("\n## Field extraction rate\n\n");

    let header: Vec<&str> = FieldName::ALL.iter().map(|f| f.as_str()).collect();
    out.push_str(&format!("| Engine | {} |\n", header.join(" | ")));
    out.push_str(&format!("|---|{}\n", "---:|".repeat(header.len())));
    for engine in summary.engines.values() {
        let rates: Vec<String> = FieldName::ALL
            .iter()
            .map(|f| format!("{:.1}%", engine.field_rates.get(f).copied().unwrap_or(0.0) * 100.0))
            .collect();
        out.push_str(&format!("| {} | {} |\n", engine.engine, rates.join(" | ")));
    }

    out
}

/// One CSV row per engine.
pub fn render_csv(summary: &BatchSummary) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = [
        "engine",
        "total_tests",
        "successful",
        "failed",
        "success_rate",
        "avg_time",
        "median_time",
        "min_time",
        "max_time",
        "avg_confidence",
        "min_confidence",
        "max_confidence",
        "confidence_samples",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    header.extend(FieldName::ALL.iter().map(|f| format!("rate_{}", f)));
    wtr.write_record(&header)?;

    for engine in summary.engines.values() {
        let mut row = vec![
            engine.engine.clone(),
            engine.total_tests.to_string(),
            engine.successful.to_string(),
            engine.failed.to_string(),
            format!("{:.4}", engine.success_rate),
            format!("{:.4}", engine.timing.avg),
            format!("{:.4}", engine.timing.median),
            format!("{:.4}", engine.timing.min),
            format!("{:.4}", engine.timing.max),
            format!("{:.2}", engine.confidence.avg),
            format!("{:.2}", engine.confidence.min),
            format!("{:.2}", engine.confidence.max),
            engine.confidence.samples.to_string(),
        ];
        row.extend(
            FieldName::ALL
                .iter()
                .map(|f| format!("{:.4}", engine.field_rates.get(f).copied().unwrap_or(0.0))),
        );
        wtr.write_record(&row)?;
    }

    let bytes = wtr.into_inner().map_err(|e| BenchError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| BenchError::Config(format!("CSV output is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::record::tests::{failure, success};
    use crate::report::summarize;

    fn summary() -> BatchSummary {
        summarize(&[
            success("a.png", "paddleocr", "FECHA: 2024-01-15", 85.0, 1.25),
            failure("a.png", "doctr", EngineError::Unavailable("no command".into())),
        ])
    }

    #[test]
    fn test_markdown_rows() {
        let md = render_markdown(&summary());
        assert!(md.contains("| paddleocr | 1 | 1 | 100.0% | 1.250 |"));
        assert!(md.contains("| doctr | 1 | 0 | 0.0% |"));
        assert!(md.contains("| Engine | fecha | autoridadEmisora |"));
        assert!(md.contains("| paddleocr | 100.0% | 0.0% |"));
    }

    #[test]
    fn test_markdown_empty() {
        assert!(render_markdown(&summarize(&[])).contains("_No records._"));
    }

    #[test]
    fn test_csv_rows() {
        let csv = render_csv(&summary()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("engine,total_tests,successful,failed,success_rate"));
        assert!(lines[0].ends_with("rate_tipoRequerimiento,rate_rfc"));
        assert!(lines[1].starts_with("paddleocr,1,1,0,1.0000,1.2500"));
        assert!(lines[2].starts_with("doctr,1,0,1,0.0000"));
    }

    #[test]
    fn test_json_parses_back() {
        let summary = summary();
        let parsed: BatchSummary = serde_json::from_str(&render_json(&summary).unwrap()).unwrap();
        assert_eq!(parsed, summary);
    }
}
