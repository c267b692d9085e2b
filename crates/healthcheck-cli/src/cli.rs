//! Command line arguments

use crate::config::{Config, OutputFormat};
use clap::Parser;
use std::path::PathBuf;

/// Periodically probe HTTP endpoints and report their health
#[derive(Parser, Debug)]
#[command(name = "healthcheck-cli", version)]
pub struct Cli {
    /// YAML file listing the endpoints to check
    #[arg(short = 'f', long = "filepath", value_name = "FILE")]
    pub filepath: PathBuf,

    /// Log level, overrides the configuration file
    #[arg(long, env = "HEALTHCHECK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Event output format, overrides the configuration file
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Report every verdict instead of only state changes
    #[arg(long)]
    pub every_tick: bool,
}

impl Cli {
    /// Apply command line overrides on top of the file's settings
    pub fn apply(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = self.format {
            config.reporting.format = format;
        }
        if self.every_tick {
            config.reporting.every_tick = true;
        }
    }
}
