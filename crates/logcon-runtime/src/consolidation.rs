use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use logcon_core::catalog::HIGH_ANOMALY_THRESHOLD;
use logcon_core::models::{LogRecord, LogRecordBatch};
use logcon_data::normalizer::Normalizer;
use logcon_data::reader::RawBatch;

use crate::store::LogStore;

/// A batch of raw producer logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationRequest {
    pub logs: Vec<Value>,
    #[serde(default)]
    pub batch_id: Option<String>,
}

impl From<RawBatch> for ConsolidationRequest {
    fn from(batch: RawBatch) -> Self {
        Self {
            logs: batch.logs,
            batch_id: batch.batch_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationResponse {
    pub batch_id: String,
    pub batch_timestamp: String,
    /// Inputs that normalized without falling back.
    pub processed_count: usize,
    /// One record per input, in input order.
    pub log_records: Vec<LogRecord>,
    pub errors: Vec<String>,
}

impl ConsolidationResponse {
    fn from_batch(batch: LogRecordBatch, processed_count: usize, errors: Vec<String>) -> Self {
        Self {
            batch_id: batch.batch_id,
            batch_timestamp: batch.batch_timestamp,
            processed_count,
            log_records: batch.logs,
            errors,
        }
    }
}

/// Normalizes batches and hands every resulting record to the store.
#[derive(Debug, Clone)]
pub struct ConsolidationService {
    normalizer: Normalizer,
    store: Arc<LogStore>,
}

impl ConsolidationService {
    pub fn new(normalizer: Normalizer, store: Arc<LogStore>) -> Self {
        Self { normalizer, store }
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    pub fn consolidate(&self, request: ConsolidationRequest) -> ConsolidationResponse {
        self.consolidate_at(request, Utc::now())
    }

    pub fn consolidate_at(
        &self,
        request: ConsolidationRequest,
        now: DateTime<Utc>,
    ) -> ConsolidationResponse {
        let batch_id = request
            .batch_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let normalized = self.normalizer.normalize_batch_at(&request.logs, now);
        let processed_count = normalized.succeeded();
        let batch = LogRecordBatch::new(batch_id, now, normalized.records);
        self.store.store_batch_at(&batch.logs, now);

        info!(
            "Consolidated batch {}: {} of {} logs processed, {} high-anomaly",
            batch.batch_id,
            processed_count,
            batch.logs.len(),
            batch.high_anomaly_logs(HIGH_ANOMALY_THRESHOLD).len()
        );
        debug!(
            "Batch {} by severity {:?}, by source {:?}",
            batch.batch_id,
            batch.count_by_severity(),
            batch.count_by_source()
        );

        ConsolidationResponse::from_batch(batch, processed_count, normalized.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StorageConfig;
    use chrono::TimeZone;
    use logcon_core::models::Severity;
    use logcon_data::normalizer::NormalizerConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ConsolidationService {
        let store = LogStore::new(StorageConfig {
            enable_ram: true,
            enable_file: false,
            max_ram_logs: 100,
            logs_dir: dir.path().to_path_buf(),
        })
        .unwrap();
        ConsolidationService::new(Normalizer::new(NormalizerConfig::default()), Arc::new(store))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_request_deserializes_without_batch_id() {
        let request: ConsolidationRequest =
            serde_json::from_value(json!({"logs": [{"source": "a"}]})).unwrap();
        assert_eq!(request.logs.len(), 1);
        assert!(request.batch_id.is_none());
    }

    #[test]
    fn test_request_from_raw_batch() {
        let request = ConsolidationRequest::from(RawBatch {
            logs: vec![json!({})],
            batch_id: Some("b-1".to_string()),
        });
        assert_eq!(request.batch_id.as_deref(), Some("b-1"));
        assert_eq!(request.logs.len(), 1);
    }

    #[test]
    fn test_batch_id_echoed() {
        let dir = TempDir::new().unwrap();
        let response = service(&dir).consolidate_at(
            ConsolidationRequest {
                logs: vec![],
                batch_id: Some("batch-9".to_string()),
            },
            now(),
        );
        assert_eq!(response.batch_id, "batch-9");
        assert_eq!(response.batch_timestamp, "2025-01-02T12:00:00Z");
        assert_eq!(response.processed_count, 0);
        assert!(response.log_records.is_empty());
    }

    #[test]
    fn test_batch_id_generated() {
        let dir = TempDir::new().unwrap();
        let response = service(&dir).consolidate_at(ConsolidationRequest::default(), now());
        let parsed = Uuid::parse_str(&response.batch_id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_mixed_batch_keeps_order_and_counts_successes() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let request = ConsolidationRequest {
            logs: vec![
                json!({
                    "source": "log-synthesis",
                    "timestamp": "2025-01-02T11:59:00Z",
                    "log_type": "application_log",
                    "data": {"level": "WARN", "message": "slow query"}
                }),
                json!("not an entry"),
                json!({
                    "source": "service-mocks",
                    "log_type": "application_log",
                    "data": {"level": "INFO", "message": "ok"}
                }),
            ],
            batch_id: None,
        };

        let response = service.consolidate_at(request, now());
        assert_eq!(response.log_records.len(), 3);
        assert_eq!(response.processed_count, 2);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.log_records[1].severity(), Severity::Error);
        assert_eq!(response.log_records[2].source(), "service-mocks");

        let stored = service.store().snapshot();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].source(), "log-synthesis");
        assert_eq!(stored[2].source(), "service-mocks");
    }
}
