//! Record storage: bounded in-memory ring buffers and a daily append-only
//! JSONL file.
//!
//! Readers always get a copied snapshot taken under a short-held read lock,
//! so aggregation never sees a half-applied batch.

use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use logcon_core::error::{ConsolidatorError, Result};
use logcon_core::models::LogRecord;
use logcon_core::settings::{default_data_dir, Settings, DEFAULT_MAX_RAM_LOGS};
use logcon_data::reader::read_records_file;

// ── StorageConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub enable_ram: bool,
    pub enable_file: bool,
    /// Capacity of the global buffer and of each per-source buffer.
    pub max_ram_logs: usize,
    pub logs_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enable_ram: true,
            enable_file: true,
            max_ram_logs: DEFAULT_MAX_RAM_LOGS as usize,
            logs_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enable_ram: settings.enable_ram_storage,
            enable_file: settings.enable_file_storage,
            max_ram_logs: settings.max_ram_logs(),
            logs_dir: settings.resolved_data_dir(),
        }
    }
}

// ── Ring buffers ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RamBuffers {
    all: VecDeque<LogRecord>,
    by_source: HashMap<String, VecDeque<LogRecord>>,
}

fn push_bounded(buffer: &mut VecDeque<LogRecord>, record: LogRecord, capacity: usize) {
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(record);
}

// ── LogStore ──────────────────────────────────────────────────────────────────

/// Thread-safe record store; share it behind an `Arc`.
#[derive(Debug)]
pub struct LogStore {
    config: StorageConfig,
    ram: RwLock<RamBuffers>,
    /// Serialises appends so concurrent batches never interleave lines.
    file_lock: Mutex<()>,
}

impl LogStore {
    /// Create the store, creating `logs_dir` when file storage is enabled.
    pub fn new(config: StorageConfig) -> Result<Self> {
        if config.max_ram_logs == 0 {
            return Err(ConsolidatorError::Config(
                "max_ram_logs must be positive".to_string(),
            ));
        }
        if config.enable_file {
            std::fs::create_dir_all(&config.logs_dir).map_err(|source| {
                ConsolidatorError::FileWrite {
                    path: config.logs_dir.clone(),
                    source,
                }
            })?;
        }
        debug!(
            "Log store ready: ram={}, file={}, dir={}",
            config.enable_ram,
            config.enable_file,
            config.logs_dir.display()
        );
        Ok(Self {
            config,
            ram: RwLock::new(RamBuffers::default()),
            file_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// `"ram"` when memory storage is on, else `"file"`, else `"none"`.
    pub fn storage_type(&self) -> &'static str {
        if self.config.enable_ram {
            "ram"
        } else if self.config.enable_file {
            "file"
        } else {
            "none"
        }
    }

    /// Path of the daily file for `date`.
    pub fn daily_file(&self, date: NaiveDate) -> PathBuf {
        daily_file_in(&self.config.logs_dir, date)
    }

    // ── Writes ────────────────────────────────────────────────────────────

    /// Store `records` in order. Persistence failures are logged, never
    /// returned.
    pub fn store_batch(&self, records: &[LogRecord]) {
        self.store_batch_at(records, Utc::now());
    }

    /// [`store_batch`](Self::store_batch) writing to the file for `now`'s date.
    pub fn store_batch_at(&self, records: &[LogRecord], now: DateTime<Utc>) {
        if records.is_empty() {
            return;
        }

        if self.config.enable_ram {
            let capacity = self.config.max_ram_logs;
            let mut ram = self.ram.write().unwrap_or_else(PoisonError::into_inner);
            for record in records {
                push_bounded(
                    ram.by_source.entry(record.source()).or_default(),
                    record.clone(),
                    capacity,
                );
                push_bounded(&mut ram.all, record.clone(), capacity);
            }
        }

        if self.config.enable_file {
            let path = self.daily_file(now.date_naive());
            if let Err(e) = self.append_to_file(&path, records) {
                warn!("Failed to persist {} records: {}", records.len(), e);
            }
        }
    }

    fn append_to_file(&self, path: &Path, records: &[LogRecord]) -> Result<()> {
        let mut lines = String::new();
        for record in records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }

        let _guard = self.file_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let write_err = |source: std::io::Error| ConsolidatorError::FileWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(write_err)?;
        file.write_all(lines.as_bytes()).map_err(write_err)?;
        Ok(())
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    /// Consistent copy of every retained record, oldest first.
    ///
    /// Without RAM storage this reads today's file.
    pub fn snapshot(&self) -> Vec<LogRecord> {
        if self.config.enable_ram {
            let ram = self.ram.read().unwrap_or_else(PoisonError::into_inner);
            return ram.all.iter().cloned().collect();
        }
        self.read_today()
    }

    /// Retained records from one producer, oldest first.
    pub fn snapshot_by_source(&self, source: &str) -> Vec<LogRecord> {
        if self.config.enable_ram {
            let ram = self.ram.read().unwrap_or_else(PoisonError::into_inner);
            return ram
                .by_source
                .get(source)
                .map(|buffer| buffer.iter().cloned().collect())
                .unwrap_or_default();
        }
        self.read_today()
            .into_iter()
            .filter(|r| r.is_from_source(source))
            .collect()
    }

    /// Producers currently held in memory, sorted.
    pub fn sources(&self) -> Vec<String> {
        let ram = self.ram.read().unwrap_or_else(PoisonError::into_inner);
        let mut sources: Vec<String> = ram.by_source.keys().cloned().collect();
        sources.sort();
        sources
    }

    pub fn total_count(&self) -> usize {
        if self.config.enable_ram {
            return self.ram.read().unwrap_or_else(PoisonError::into_inner).all.len();
        }
        self.read_today().len()
    }

    fn read_today(&self) -> Vec<LogRecord> {
        if !self.config.enable_file {
            return Vec::new();
        }
        let path = self.daily_file(Utc::now().date_naive());
        if !path.exists() {
            return Vec::new();
        }
        read_records_file(&path).unwrap_or_else(|e| {
            warn!("Failed to read {}: {}", path.display(), e);
            Vec::new()
        })
    }
}

/// `{dir}/consolidated_logs_{YYYYMMDD}.jsonl`
pub fn daily_file_in(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("consolidated_logs_{}.jsonl", date.format("%Y%m%d")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
