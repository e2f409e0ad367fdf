//! File loading for raw producer batches and stored canonical records.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use logcon_core::error::{ConsolidatorError, Result};
use logcon_core::models::LogRecord;

/// Raw logs read from disk, plus the batch id if the file carried one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub logs: Vec<Value>,
    pub batch_id: Option<String>,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.jsonl` files recursively under `data_path`, sorted by path.
pub fn find_jsonl_files(data_path: &Path) -> Vec<PathBuf> {
    if !data_path.exists() {
        warn!("Data path does not exist: {}", data_path.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(data_path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == "jsonl")
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load a raw batch from `path`.
///
/// Accepts, in order of detection:
/// * a request document `{"logs": [...], "batch_id": "..."}`
/// * a JSON array of raw entries
/// * JSONL, one raw entry per line
///
/// Blank JSONL lines are skipped. Lines that are not valid JSON are kept as
/// JSON strings so that they still produce a (fallback) record downstream.
pub fn load_raw_batch(path: &Path) -> Result<RawBatch> {
    let content = std::fs::read_to_string(path).map_err(|source| ConsolidatorError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let batch = parse_raw_batch(&content)?;
    debug!(
        "Loaded {} raw logs from {}",
        batch.logs.len(),
        path.display()
    );
    Ok(batch)
}

/// Parse the text of a raw batch; see [`load_raw_batch`].
pub fn parse_raw_batch(content: &str) -> Result<RawBatch> {
    if let Ok(document) = serde_json::from_str::<Value>(content.trim()) {
        match document {
            Value::Object(mut map) if map.contains_key("logs") => {
                let logs = match map.remove("logs") {
                    Some(Value::Array(logs)) => logs,
                    _ => {
                        return Err(ConsolidatorError::MalformedEntry(
                            "\"logs\" must be an array".to_string(),
                        ))
                    }
                };
                let batch_id = map
                    .get("batch_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                return Ok(RawBatch { logs, batch_id });
            }
            Value::Array(logs) => return Ok(RawBatch { logs, batch_id: None }),
            // A lone object is a one-line JSONL file.
            _ => {}
        }
    }

    let logs = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line).unwrap_or_else(|e| {
                debug!("Keeping unparseable line as text: {}", e);
                Value::String(line.to_string())
            })
        })
        .collect();
    Ok(RawBatch {
        logs,
        batch_id: None,
    })
}

/// Load stored records from a JSONL file, or from every JSONL file under a
/// directory. Malformed lines are skipped.
pub fn load_log_records(path: &Path) -> Result<Vec<LogRecord>> {
    if !path.exists() {
        return Err(ConsolidatorError::DataPathNotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        find_jsonl_files(path)
    } else {
        vec![path.to_path_buf()]
    };

    let mut records = Vec::new();
    for file in &files {
        records.extend(read_records_file(file)?);
    }
    debug!(
        "Loaded {} records from {} files",
        records.len(),
        files.len()
    );
    Ok(records)
}

/// Parse one stored-records JSONL file.
pub fn read_records_file(path: &Path) -> Result<Vec<LogRecord>> {
    let file = std::fs::File::open(path).map_err(|source| ConsolidatorError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line_result in std::io::BufReader::new(file).lines() {
        let line = match line_result {
            Ok(l) => l,
            Err(_) => continue,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<LogRecord>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                debug!("Skipping malformed record in {}: {}", path.display(), e);
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed records in {}", skipped, path.display());
    }
    Ok(records)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use logcon_core::models::Severity;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn write_file(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn stored_line(body: &str) -> String {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap();
        serde_json::to_string(&LogRecord::new(ts, ts, body, Severity::Info)).unwrap()
    }

    // ── find_jsonl_files ──────────────────────────────────────────────────────

    #[test]
    fn test_find_jsonl_files_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("2025");
        std::fs::create_dir_all(&sub).unwrap();
        write_file(dir.path(), "c.jsonl", &["x"]);
        write_file(dir.path(), "a.jsonl", &["x"]);
        write_file(dir.path(), "notes.txt", &["x"]);
        write_file(&sub, "b.jsonl", &["x"]);

        let files = find_jsonl_files(dir.path());
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["b.jsonl", "a.jsonl", "c.jsonl"]);
    }

    #[test]
    fn test_find_jsonl_files_nonexistent_path() {
        let files = find_jsonl_files(Path::new("/tmp/does-not-exist-logcon-test-xyz"));
        assert!(files.is_empty());
    }

    // ── load_raw_batch ────────────────────────────────────────────────────────

    #[test]
    fn test_load_request_document() {
        let dir = TempDir::new().unwrap();
        let doc = json!({
            "batch_id": "b-7",
            "logs": [{"source": "a", "log_type": "x", "data": {}}, {"source": "b"}]
        })
        .to_string();
        let path = write_file(dir.path(), "req.json", &[&doc]);

        let batch = load_raw_batch(&path).unwrap();
        assert_eq!(batch.batch_id.as_deref(), Some("b-7"));
        assert_eq!(batch.logs.len(), 2);
    }

    #[test]
    fn test_load_request_document_rejects_non_array_logs() {
        let err = parse_raw_batch(r#"{"logs": "nope"}"#).unwrap_err();
        assert!(matches!(err, ConsolidatorError::MalformedEntry(_)));
    }

    #[test]
    fn test_load_json_array() {
        let batch = parse_raw_batch(r#"[{"source": "a"}, 3, "x"]"#).unwrap();
        assert_eq!(batch.logs.len(), 3);
        assert!(batch.batch_id.is_none());
    }

    #[test]
    fn test_load_jsonl_keeps_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "raw.jsonl",
            &[r#"{"source": "a", "data": {}}"#, "", "{broken", r#"{"source": "b"}"#],
        );
        let batch = load_raw_batch(&path).unwrap();
        assert_eq!(batch.logs.len(), 3);
        assert_eq!(batch.logs[1], json!("{broken"));
        assert_eq!(batch.logs[2]["source"], json!("b"));
    }

    #[test]
    fn test_single_object_is_one_entry() {
        let batch = parse_raw_batch(r#"{"source": "a", "log_type": "x"}"#).unwrap();
        assert_eq!(batch.logs.len(), 1);
    }

    #[test]
    fn test_load_raw_batch_missing_file() {
        let err = load_raw_batch(Path::new("/tmp/does-not-exist-logcon/raw.json")).unwrap_err();
        assert!(matches!(err, ConsolidatorError::FileRead { .. }));
    }

    // ── load_log_records ──────────────────────────────────────────────────────

    #[test]
    fn test_load_log_records_from_directory() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "consolidated_logs_20250101.jsonl", &[&stored_line("one")]);
        write_file(
            dir.path(),
            "consolidated_logs_20250102.jsonl",
            &[&stored_line("two"), "not json", &stored_line("three")],
        );

        let records = load_log_records(dir.path()).unwrap();
        let bodies: Vec<&str> = records.iter().map(|r| r.body()).collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_load_log_records_from_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "records.jsonl", &[&stored_line("only")]);
        let records = load_log_records(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_load_log_records_missing_path() {
        let err = load_log_records(Path::new("/tmp/does-not-exist-logcon-records")).unwrap_err();
        assert!(matches!(err, ConsolidatorError::DataPathNotFound(_)));
    }
}
