mod bootstrap;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use logcon_core::models::LogRecord;
use logcon_core::settings::{Command, Settings};
use logcon_data::aggregator::LogAggregator;
use logcon_data::normalizer::Normalizer;
use logcon_data::reader::{load_log_records, load_raw_batch};
use logcon_runtime::consolidation::{ConsolidationRequest, ConsolidationService};
use logcon_runtime::orchestrator::MonitoringOrchestrator;
use logcon_runtime::store::{LogStore, StorageConfig};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();
    let data_dir = settings.resolved_data_dir();

    bootstrap::ensure_directories(&data_dir, settings.log_file.as_deref())?;
    bootstrap::setup_logging(
        &settings.log_level,
        settings.log_file.as_deref(),
        settings.json_logs,
    )?;

    tracing::info!("logcon v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Data directory: {}", data_dir.display());

    match settings.command.clone() {
        Command::Consolidate { input, batch_id } => {
            let store = LogStore::new(StorageConfig::from_settings(&settings))?;
            let service = ConsolidationService::new(
                Normalizer::new(bootstrap::normalizer_config(&settings)),
                Arc::new(store),
            );

            let raw = load_raw_batch(&input)
                .with_context(|| format!("loading raw logs from {}", input.display()))?;
            let mut request = ConsolidationRequest::from(raw);
            if batch_id.is_some() {
                request.batch_id = batch_id;
            }

            print_json(&service.consolidate(request))?;
        }

        Command::Stats { input } => {
            let records = load_records(&data_dir, input.as_deref())?;
            print_json(&LogAggregator::aggregate_stats(&records))?;
        }

        Command::Timeline { minutes, input } => {
            let records = load_records(&data_dir, input.as_deref())?;
            print_json(&LogAggregator::aggregate_timeline(&records, minutes))?;
        }

        Command::BySource { input } => {
            let records = load_records(&data_dir, input.as_deref())?;
            print_json(&LogAggregator::aggregate_by_source(&records))?;
        }

        Command::Anomalies { threshold, input } => {
            let records = load_records(&data_dir, input.as_deref())?;
            print_json(&LogAggregator::aggregate_anomaly_patterns(
                &records, threshold,
            ))?;
        }

        Command::Monitor {
            refresh_rate,
            minutes,
        } => {
            tracing::info!("Starting monitoring (refresh every {}s)...", refresh_rate);

            // A fresh process has nothing in memory; watch today's file.
            let config = StorageConfig {
                enable_ram: false,
                enable_file: true,
                ..StorageConfig::from_settings(&settings)
            };
            let store = Arc::new(LogStore::new(config)?);

            let orchestrator =
                MonitoringOrchestrator::new(u64::from(refresh_rate), minutes, store);
            let (mut rx, handle) = orchestrator.start();

            loop {
                tokio::select! {
                    snapshot = rx.recv() => match snapshot {
                        Some(snapshot) => print_json(&snapshot)?,
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Ctrl+C received; shutting down monitoring task");
                        break;
                    }
                }
            }
            handle.abort();
        }
    }

    Ok(())
}

/// Stored records from `input`, or from the data directory when omitted.
fn load_records(data_dir: &Path, input: Option<&Path>) -> Result<Vec<LogRecord>> {
    let path = input.unwrap_or(data_dir);
    let records = load_log_records(path)
        .with_context(|| format!("loading records from {}", path.display()))?;
    tracing::info!("Loaded {} records", records.len());
    Ok(records)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
