use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use tagtree::cli::{Cli, VerbosityLevel};
use tagtree::config::{Config, ConfigManager};
use tagtree::docstrings::prebuild_package;
use tagtree::error_reporter::ErrorReporter;
use tagtree::manifest::{Manifest, read_manifest_with};
use tagtree::output::Output;

/// Exit status for malformed or invalid manifests
const EXIT_PARSE_FAILURE: u8 = 1;
/// Exit status for usage and configuration errors
const EXIT_USAGE: u8 = 2;

fn cli_verbosity(cli: &Cli) -> VerbosityLevel {
    if cli.debug {
        VerbosityLevel::Debug
    } else if cli.quiet {
        VerbosityLevel::Quiet
    } else if cli.verbose {
        VerbosityLevel::Verbose
    } else {
        VerbosityLevel::Normal
    }
}

fn init_tracing(verbosity: VerbosityLevel) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("TAGTREE_LOG")
                .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_manifest(
    manifest: &Manifest,
    config: &Config,
    verbosity: VerbosityLevel,
) -> anyhow::Result<()> {
    let rendered = Output::new(verbosity)
        .render(manifest, config.output.format)
        .context("failed to serialize the manifest")?;
    if rendered.is_empty() {
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("failed to write to stdout")?;
    if !rendered.ends_with('\n') {
        writeln!(stdout).context("failed to write to stdout")?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli_verbosity(&cli));

    let early_reporter = ErrorReporter::new(cli_verbosity(&cli));
    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        return ExitCode::from(EXIT_USAGE);
    }

    let config = match ConfigManager::load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            early_reporter.report_config_error(&err);
            return ExitCode::from(EXIT_USAGE);
        }
    };
    let verbosity = if cli.debug {
        VerbosityLevel::Debug
    } else {
        config.verbosity()
    };

    info!(
        manifest = %cli.manifest.display(),
        format = ?config.output.format,
        "reading manifest"
    );
    let manifest = match read_manifest_with(&cli.manifest, config.parse_options()) {
        Ok(manifest) => manifest,
        Err(err) => {
            ErrorReporter::new(verbosity).report_parse_error(&err);
            return ExitCode::from(EXIT_PARSE_FAILURE);
        }
    };
    info!(
        package = %manifest.package.name,
        modules = manifest.package.modules.len(),
        "manifest is valid"
    );

    if cli.prebuild {
        match prebuild_package(&manifest.base_dir, &manifest.package) {
            Ok(written) => info!(includes = written.len(), "docstring includes up to date"),
            Err(err) => {
                eprintln!("Error: {}", err);
                return ExitCode::from(EXIT_PARSE_FAILURE);
            }
        }
    }

    match print_manifest(&manifest, &config, verbosity) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(EXIT_PARSE_FAILURE)
        }
    }
}
