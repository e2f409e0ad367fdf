use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::catalog::MAX_TIMELINE_MINUTES;

/// Default cap on records held by each in-memory ring buffer.
pub const DEFAULT_MAX_RAM_LOGS: u64 = 10_000;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Normalize heterogeneous producer logs and aggregate the canonical records
#[derive(Parser, Debug, Clone)]
#[command(
    name = "logcon",
    about = "Normalize heterogeneous producer logs and aggregate the canonical records",
    version
)]
pub struct Settings {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the daily consolidated JSONL files
    #[arg(long, env = "LOGCON_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep recent records in memory
    #[arg(
        long,
        env = "ENABLE_RAM_STORAGE",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new(),
        global = true
    )]
    pub enable_ram_storage: bool,

    /// Append every record to the daily JSONL file
    #[arg(
        long,
        env = "ENABLE_FILE_STORAGE",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new(),
        global = true
    )]
    pub enable_file_storage: bool,

    /// Capacity of each in-memory ring buffer
    #[arg(
        long,
        env = "MAX_RAM_LOGS",
        default_value_t = DEFAULT_MAX_RAM_LOGS,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub max_ram_logs: u64,

    /// Environment tag stamped on every record's resource
    #[arg(long, env = "LOGCON_ENVIRONMENT", default_value = "development", global = true)]
    pub environment: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"], global = true)]
    pub log_level: String,

    /// Log file path
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

// ── Command ────────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Normalize a batch of raw logs and store the results
    Consolidate {
        /// Request document, JSON array or JSONL file of raw logs
        input: PathBuf,
        /// Batch identifier to echo back (generated when omitted)
        #[arg(long)]
        batch_id: Option<String>,
    },

    /// Summary statistics over stored records
    Stats {
        /// Stored-records file or directory (defaults to the data dir)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Per-minute timeline over the trailing window
    Timeline {
        /// Window length in minutes (1-10080)
        #[arg(
            long,
            default_value_t = 60,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TIMELINE_MINUTES))
        )]
        minutes: u32,
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Per-source breakdown
    BySource {
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Patterns among records above an anomaly-score threshold
    Anomalies {
        /// Scores strictly above this value are included
        #[arg(long, default_value_t = 70.0)]
        threshold: f64,
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Periodically print stats and the timeline for stored records
    Monitor {
        /// Refresh rate in seconds (1-60)
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=60))]
        refresh_rate: u32,
        /// Timeline window in minutes (1-10080)
        #[arg(
            long,
            default_value_t = 60,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TIMELINE_MINUTES))
        )]
        minutes: u32,
    },
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments (with environment fallbacks) and apply `--debug`.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`load`](Self::load) but accepts an explicit argument list.
    pub fn load_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::resolve(Settings::parse_from(args))
    }

    /// `--debug` overrides the log level.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The configured data directory, or `~/.logcon/consolidated`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn max_ram_logs(&self) -> usize {
        usize::try_from(self.max_ram_logs).unwrap_or(usize::MAX)
    }
}

/// `~/.logcon/consolidated`, falling back to the working directory when no
/// home directory can be determined.
pub fn default_data_dir() -> PathBuf {
    data_dir_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
}

/// Data directory rooted at `base_dir` (used for testing).
pub fn data_dir_in(base_dir: &Path) -> PathBuf {
    base_dir.join(".logcon").join("consolidated")
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["logcon", "stats"]);

        assert_eq!(settings.command, Command::Stats { input: None });
        assert!(settings.enable_ram_storage);
        assert!(settings.enable_file_storage);
        assert_eq!(settings.max_ram_logs, DEFAULT_MAX_RAM_LOGS);
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.json_logs);
        assert!(!settings.debug);
    }

    #[test]
    fn test_data_dir_in() {
        let dir = data_dir_in(Path::new("/home/ops"));
        assert_eq!(dir, PathBuf::from("/home/ops/.logcon/consolidated"));
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let settings = Settings::parse_from(["logcon", "stats", "--data-dir", "/var/lib/logcon"]);
        assert_eq!(settings.resolved_data_dir(), PathBuf::from("/var/lib/logcon"));
    }

    // ── subcommands ───────────────────────────────────────────────────────────

    #[test]
    fn test_consolidate_command() {
        let settings = Settings::parse_from([
            "logcon",
            "consolidate",
            "batch.json",
            "--batch-id",
            "b-42",
        ]);
        assert_eq!(
            settings.command,
            Command::Consolidate {
                input: PathBuf::from("batch.json"),
                batch_id: Some("b-42".to_string()),
            }
        );
    }

    #[test]
    fn test_timeline_default_window() {
        let settings = Settings::parse_from(["logcon", "timeline"]);
        assert_eq!(
            settings.command,
            Command::Timeline {
                minutes: 60,
                input: None
            }
        );
    }

    #[test]
    fn test_timeline_window_bounds() {
        assert!(Settings::try_parse_from(["logcon", "timeline", "--minutes", "0"]).is_err());
        assert!(Settings::try_parse_from(["logcon", "timeline", "--minutes", "10081"]).is_err());
        assert!(
            Settings::try_parse_from(["logcon", "timeline", "--minutes", "4294967295"]).is_err()
        );
        assert!(Settings::try_parse_from(["logcon", "monitor", "--minutes", "20000"]).is_err());
        let settings = Settings::parse_from(["logcon", "timeline", "--minutes", "10080"]);
        assert_eq!(
            settings.command,
            Command::Timeline {
                minutes: 10_080,
                input: None
            }
        );
    }

    #[test]
    fn test_anomalies_threshold() {
        let settings = Settings::parse_from(["logcon", "anomalies", "--threshold", "85.5"]);
        match settings.command {
            Command::Anomalies { threshold, .. } => assert_eq!(threshold, 85.5),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_monitor_refresh_rate_range() {
        assert!(Settings::try_parse_from(["logcon", "monitor", "--refresh-rate", "0"]).is_err());
        assert!(Settings::try_parse_from(["logcon", "monitor", "--refresh-rate", "61"]).is_err());
        let settings = Settings::parse_from(["logcon", "monitor", "--refresh-rate", "5"]);
        assert_eq!(
            settings.command,
            Command::Monitor {
                refresh_rate: 5,
                minutes: 60
            }
        );
    }

    // ── storage flags ─────────────────────────────────────────────────────────

    #[test]
    fn test_storage_flags_accept_boolish_values() {
        let settings = Settings::parse_from([
            "logcon",
            "stats",
            "--enable-ram-storage",
            "false",
            "--enable-file-storage",
            "yes",
        ]);
        assert!(!settings.enable_ram_storage);
        assert!(settings.enable_file_storage);
    }

    #[test]
    fn test_max_ram_logs_must_be_positive() {
        assert!(Settings::try_parse_from(["logcon", "stats", "--max-ram-logs", "0"]).is_err());
        let settings = Settings::parse_from(["logcon", "stats", "--max-ram-logs", "250"]);
        assert_eq!(settings.max_ram_logs(), 250);
    }

    // ── logging flags ─────────────────────────────────────────────────────────

    #[test]
    fn test_debug_overrides_log_level() {
        let settings = Settings::load_from(["logcon", "stats", "--log-level", "ERROR", "--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(Settings::try_parse_from(["logcon", "stats", "--log-level", "LOUD"]).is_err());
    }

    #[test]
    fn test_log_file_flag() {
        let settings = Settings::parse_from(["logcon", "--log-file", "/tmp/logcon.log", "stats"]);
        assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/logcon.log")));
    }
}
