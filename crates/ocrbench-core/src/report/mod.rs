//! Aggregate reporting over benchmark records.

mod render;
mod summary;

pub use render::{render_csv, render_json, render_markdown};
pub use summary::{BatchSummary, ConfidenceStats, EngineSummary, TimingStats, summarize};
