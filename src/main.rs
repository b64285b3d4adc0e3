//! licensescope binary — thin CLI shell over the [`licensescope`] library crate.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use licensescope::backend::bitbake::BitbakeBackend;
use licensescope::backend::description::DescriptionBackend;
use licensescope::backend::identifier::IdentifierBackend;
use licensescope::backend::spdx::SpdxBackend;
use licensescope::backend::{parse_weight_arg, Backend, BackendWeights};
use licensescope::config::{load_profile, load_regexp_rules, load_weights, ScanOptions};
use licensescope::core::Core;
use licensescope::profile::filter;

/// License-detection scanner for local trees, git repositories, and downloadable archives.
#[derive(Parser)]
#[command(name = "licensescope", version, about, long_about = None)]
struct Cli {
    /// One or more descriptors: a filesystem path, a git/archive URL, or a local archive file.
    #[arg(required = true)]
    descriptors: Vec<String>,

    /// JSON profile file restricting the displayed results.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// JSON rule file for the regexp backend.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// TOML file of per-backend weight overrides.
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Repeatable NAME=VALUE backend weight override, applied after --weights.
    #[arg(long = "weight", value_name = "NAME=VALUE")]
    weight_args: Vec<String>,

    /// Abort the whole run on the first resource failure rather than recording and continuing.
    #[arg(long)]
    shutdown_on_error: bool,

    /// Override the cache directory (default: the OS cache dir under the program name).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Allow plain (non-allowlisted) HTTP/HTTPS fetches.
    #[arg(long)]
    allow_http: bool,

    /// Verbose internal logging.
    #[arg(long)]
    debug: bool,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if cli.debug { "licensescope=debug" } else { "licensescope=info" })
        }))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("licensescope: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<std::process::ExitCode, String> {
    let weights = match &cli.weights {
        Some(path) => load_weights(path).map_err(|e| format!("cannot load weights: {e}"))?,
        None => BackendWeights::default(),
    };
    for arg in &cli.weight_args {
        let (name, value) = parse_weight_arg(arg)?;
        weights.set(&name, value);
    }

    let mut backends: Vec<Arc<dyn Backend>> = vec![
        Arc::new(SpdxBackend::new()),
        Arc::new(DescriptionBackend::new()),
        Arc::new(BitbakeBackend::new()),
        Arc::new(IdentifierBackend::new()),
    ];
    if let Some(path) = &cli.rules {
        let regexp = load_regexp_rules(path).map_err(|e| format!("cannot load rules: {e}"))?;
        backends.push(Arc::new(regexp));
    }

    let profile = match &cli.profile {
        Some(path) => Some(load_profile(path).map_err(|e| format!("cannot load profile: {e}"))?),
        None => None,
    };

    let mut options = ScanOptions::new("licensescope");
    options.allow_http = cli.allow_http;
    options.debug = cli.debug;
    options.shutdown_on_error = cli.shutdown_on_error;
    if let Some(dir) = cli.cache_dir {
        options.cache = licensescope::cache::CachePrefix(dir);
    }

    let core = Core::new(backends, weights, options);
    let outcome = core.run(&cli.descriptors);

    for error in &outcome.errors {
        tracing::warn!(%error, "recorded during scan");
    }

    let report = filter(&outcome.results, profile.as_ref(), core.weights());

    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), &report).map_err(|e| format!("cannot serialize report: {e}"))?;
    println!();

    if outcome.errors.iter().any(|e| e.is_programming()) {
        Ok(std::process::ExitCode::FAILURE)
    } else {
        Ok(std::process::ExitCode::SUCCESS)
    }
}
