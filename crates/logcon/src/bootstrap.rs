use std::path::Path;
use std::sync::Mutex;

use logcon_core::settings::Settings;
use logcon_data::normalizer::NormalizerConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Create the data directory and the log file's parent directory if absent.
pub fn ensure_directories(data_dir: &Path, log_file: Option<&Path>) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)?;
    if let Some(parent) = log_file.and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to an [`EnvFilter`] directive.
pub fn level_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Diagnostics go to stderr (stdout carries command output) and, when
/// `log_file` is set, are also appended to that file without ANSI colours.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let plain = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let structured = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

// ── Normalizer configuration ───────────────────────────────────────────────────

pub fn normalizer_config(settings: &Settings) -> NormalizerConfig {
    NormalizerConfig {
        environment: settings.environment.clone(),
        ..NormalizerConfig::default()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
