//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::LayerId;
use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;

/// Mapboard - restore a dashboard view from a share link and report on it
///
/// Reads the layer, area, year and viewport state from a share link (or
/// individual flags), loads the active datasets and writes the legend,
/// admin-area value range, statistics table and time series.
///
/// Examples:
///   mapboard --link "?layers=t1,v3&province=SHEFA&year=2023"
///   mapboard --layers t4 --province TAFEA --monthly --format json
///   mapboard --layers t1 --observations ./ecce.json
///   mapboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Share link or bare query string to restore
    ///
    /// Example: "https://dashboard.example/?layers=t1,r2&year=2023" or "?layers=t1"
    #[arg(short, long, value_name = "LINK")]
    pub link: Option<String>,

    /// Active layers, comma-separated (replaces the link's layers)
    #[arg(long, value_name = "LAYERS")]
    pub layers: Option<String>,

    /// Layers to toggle after restoring, in order (repeatable)
    #[arg(short, long, value_name = "LAYER")]
    pub toggle: Vec<LayerId>,

    /// Province to select (clears the area council)
    #[arg(short, long, value_name = "NAME")]
    pub province: Option<String>,

    /// Area council to select
    #[arg(long, value_name = "NAME")]
    pub ac: Option<String>,

    /// Year to select
    #[arg(short, long, value_name = "YYYY")]
    pub year: Option<String>,

    /// Prefer a monthly time series when the data varies by month
    #[arg(long)]
    pub monthly: bool,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    ///
    /// Defaults to a name derived from the tabular dataset and year.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Dataset API base URL
    #[arg(long, value_name = "URL", env = "MAPBOARD_API_URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Read tabular observations from a JSON file instead of the API
    #[arg(long, value_name = "FILE")]
    pub observations: Option<PathBuf>,

    /// Read admin-area boundaries from a GeoJSON file instead of the API
    #[arg(long, value_name = "FILE")]
    pub boundaries: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .mapboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .mapboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref year) = self.year {
            if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("Year must be four digits, got {:?}", year));
            }
        }

        if self.ac.is_some() && self.province.is_none() && self.link.is_none() {
            return Err("--ac needs a province (--province or a link carrying one)".to_string());
        }

        for path in [&self.observations, &self.boundaries].into_iter().flatten() {
            if !path.is_file() {
                return Err(format!("File does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// The location to restore: the link resolved against `share_url`.
    pub fn location(&self, share_url: &str) -> Result<Url> {
        let base = Url::parse(share_url)
            .with_context(|| format!("Invalid share URL: {}", share_url))?;

        match self.link.as_deref().map(str::trim) {
            None | Some("") => Ok(base),
            Some(link) if link.starts_with("http://") || link.starts_with("https://") => {
                Url::parse(link).with_context(|| format!("Invalid link: {}", link))
            }
            Some(link) => {
                let query = link.trim_start_matches('?');
                base.join(&format!("?{}", query))
                    .with_context(|| format!("Invalid link: {}", link))
            }
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
