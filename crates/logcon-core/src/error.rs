use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the log consolidation engine.
#[derive(Error, Debug)]
pub enum ConsolidatorError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be appended to the on-disk log.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A raw entry whose `data` payload cannot be interpreted by any
    /// extraction rule.
    #[error("Malformed log entry: {0}")]
    MalformedEntry(String),

    /// A severity number outside the 1..=24 range.
    #[error("Invalid severity number: {0}")]
    InvalidSeverityNumber(i64),

    /// A severity name that is not one of the six levels.
    #[error("Invalid severity: {0}")]
    InvalidSeverity(String),

    /// The input path does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the logcon crates.
pub type Result<T> = std::result::Result<T, ConsolidatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ConsolidatorError::FileRead {
            path: PathBuf::from("/some/path.jsonl"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/path.jsonl"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_file_write() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = ConsolidatorError::FileWrite {
            path: PathBuf::from("/logs/consolidated_logs_20250102.jsonl"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to write file"));
        assert!(msg.contains("read-only"));
    }

    #[test]
    fn test_error_display_malformed_entry() {
        let err = ConsolidatorError::MalformedEntry("data must be an object, got array".into());
        assert_eq!(
            err.to_string(),
            "Malformed log entry: data must be an object, got array"
        );
    }

    #[test]
    fn test_error_display_invalid_severity_number() {
        let err = ConsolidatorError::InvalidSeverityNumber(25);
        assert_eq!(err.to_string(), "Invalid severity number: 25");
    }

    #[test]
    fn test_error_display_invalid_severity() {
        let err = ConsolidatorError::InvalidSeverity("LOUD".to_string());
        assert_eq!(err.to_string(), "Invalid severity: LOUD");
    }

    #[test]
    fn test_error_display_data_path_not_found() {
        let err = ConsolidatorError::DataPathNotFound(PathBuf::from("/missing/dir"));
        assert_eq!(err.to_string(), "Data path not found: /missing/dir");
    }

    #[test]
    fn test_error_display_config() {
        let err = ConsolidatorError::Config("max_ram_logs must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: max_ram_logs must be positive"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ConsolidatorError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: ConsolidatorError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
