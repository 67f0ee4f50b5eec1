use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
    /// Show all available debugging information
    Debug,
}

impl VerbosityLevel {
    /// Default `tracing` filter directive for this level
    pub fn log_directive(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

/// How a parsed manifest is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Readable package summary
    #[default]
    Human,
    /// Package descriptor as JSON
    Json,
    /// Validated node tree as JSON
    Tree,
}

/// Schema-validated package manifest reader
#[derive(Parser, Debug, Clone)]
#[command(name = "tagtree")]
#[command(about = "Read and validate a package manifest, then print its build description")]
#[command(version)]
pub struct Cli {
    /// Manifest file to read
    #[arg(help = "Package manifest (XML)")]
    pub manifest: PathBuf,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    /// Enable debug output, including parser events
    #[arg(long = "debug", conflicts_with = "quiet")]
    pub debug: bool,

    /// Enable quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Trim text content and drop whitespace-only text
    #[arg(long = "trim-text")]
    pub trim_text: bool,

    /// Regenerate `.d` docstring includes from the `.doc` files beside module sources
    #[arg(long = "prebuild")]
    pub prebuild: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.manifest.exists() {
            return Err(format!(
                "Manifest does not exist: {}",
                self.manifest.display()
            ));
        }
        if self.manifest.is_dir() {
            return Err(format!(
                "Manifest is a directory: {}",
                self.manifest.display()
            ));
        }
        if let Some(config) = &self.config
            && !config.is_file()
        {
            return Err(format!(
                "Configuration file does not exist: {}",
                config.display()
            ));
        }
        Ok(())
    }
}
