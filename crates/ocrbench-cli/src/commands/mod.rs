//! CLI subcommands.

pub mod bench;
pub mod config;
pub mod fields;
pub mod report;

use std::path::Path;

use tracing::debug;

use ocrbench_core::BenchConfig;

/// Effective configuration: `--config` if given, else the default file if
/// it exists, else defaults; environment overrides on top.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<BenchConfig> {
    let mut config = match config_path {
        Some(path) => {
            let path = Path::new(path);
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            BenchConfig::from_file(path)?
        }
        None => {
            let default_path = config::default_config_path();
            if default_path.exists() {
                debug!("Using config from {}", default_path.display());
                BenchConfig::from_file(&default_path)?
            } else {
                BenchConfig::default()
            }
        }
    };

    config.apply_env_overrides()?;
    Ok(config)
}
