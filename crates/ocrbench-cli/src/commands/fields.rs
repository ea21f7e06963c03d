//! Fields command - run the field extractor and scorer on plain text.

use std::io::Read;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use ocrbench_core::{FieldExtractor, QualityScore, QualityScorer, StructuredFields};

/// Arguments for the fields command.
#[derive(Args)]
pub struct FieldsArgs {
    /// Text file to read, or `-` for stdin
    input: PathBuf,
}

#[derive(Serialize)]
struct FieldsOutput {
    fields: StructuredFields,
    quality: QualityScore,
}

pub fn run(args: FieldsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    let text = if args.input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        if !args.input.exists() {
            anyhow::bail!("Input file not found: {}", args.input.display());
        }
        std::fs::read_to_string(&args.input)?
    };

    let output = FieldsOutput {
        fields: FieldExtractor::new().extract(&text),
        quality: QualityScorer::new(config.scoring).score(&text),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
