//! Raw producer log → canonical [`LogRecord`].
//!
//! Normalization is pure: every decision depends only on the raw entry and
//! the processing time handed in, so the `_at` variants are fully
//! deterministic. Malformed entries never abort a batch; they turn into an
//! ERROR fallback record plus an error string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use logcon_core::catalog::{
    service_name_for, LogCategory, HIGH_ANOMALY_THRESHOLD, HIGH_SENSITIVITY_LOG_TYPES, HOST_FIELDS,
    IP_FIELDS, NESTED_OBJECTS, PERFORMANCE_KEYS, PERFORMANCE_PREFIX, PROMOTED_KEYS, SUMMARY_KEYS,
};
use logcon_core::data_processors::{TimestampProcessor, ValueConverter};
use logcon_core::error::{ConsolidatorError, Result};
use logcon_core::models::{
    Attributes, InstrumentationScope, LogRecord, RawLogEntry, Resource, Severity,
};

const UNKNOWN: &str = "unknown";

// ── NormalizerConfig ──────────────────────────────────────────────────────────

/// Deployment tags stamped on every record's resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub environment: String,
    pub deployment_environment: String,
    /// Reported as both `service.version` and the scope version.
    pub service_version: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            deployment_environment: "docker".to_string(),
            service_version: "1.0.0".to_string(),
        }
    }
}

// ── NormalizedBatch ───────────────────────────────────────────────────────────

/// Output of [`Normalizer::normalize_batch`]: one record per input, in input
/// order, plus one message per input that fell back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedBatch {
    pub records: Vec<LogRecord>,
    pub errors: Vec<String>,
}

impl NormalizedBatch {
    /// Number of inputs that normalized without falling back.
    pub fn succeeded(&self) -> usize {
        self.records.len() - self.errors.len()
    }
}

// ── Body families ─────────────────────────────────────────────────────────────

/// `log_type` families with a templated one-line body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFamily {
    Security,
    Transaction,
    Application,
    ServerMetrics,
}

impl BodyFamily {
    /// Families in match order; a new family goes in here.
    const ALL: [(BodyFamily, &'static [&'static str]); 4] = [
        (
            BodyFamily::Security,
            &["security_log", "authentication_log", "authorization_log"],
        ),
        (
            BodyFamily::Transaction,
            &["transaction_log", "payment_log", "transfer_log"],
        ),
        (
            BodyFamily::Application,
            &["application_log", "microservice_log"],
        ),
        (BodyFamily::ServerMetrics, &["server_log"]),
    ];

    fn for_log_type(log_type: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(_, types)| types.contains(&log_type))
            .map(|(family, _)| *family)
    }

    fn render(self, data: &Map<String, Value>) -> String {
        match self {
            BodyFamily::Security => format!(
                "Security event: {} from user {} at IP {}",
                first_text(data, &["event_type"]),
                first_text(data, &["account", "user_id"]),
                first_text(data, &["source_ip", "ip_address"]),
            ),
            BodyFamily::Transaction => {
                let nested = data.get("transaction").and_then(Value::as_object);
                let nested_text = |key: &str| nested.and_then(|txn| field_text(txn, key));
                let id = nested_text("id").or_else(|| field_text(data, "transaction_id"));
                let status = nested_text("status").or_else(|| field_text(data, "status"));
                let amount = field_text(data, "amount").or_else(|| nested_text("amount"));
                let currency = field_text(data, "currency").or_else(|| nested_text("currency"));
                format!(
                    "Transaction {}: {} - {} {}",
                    or_unknown(id),
                    or_unknown(status),
                    or_unknown(amount),
                    or_unknown(currency),
                )
            }
            BodyFamily::Application => format!(
                "[{}] {}: {}",
                first_text(data, &["level"]),
                first_text(data, &["service"]),
                first_text(data, &["message"]),
            ),
            BodyFamily::ServerMetrics => format!(
                "Server metrics from {}: CPU {}%, Memory {}GB",
                first_text(data, &["host"]),
                one_decimal(data.get("cpu_usage_percent")),
                one_decimal(data.get("memory_used_gb")),
            ),
        }
    }
}

// ── Field helpers ─────────────────────────────────────────────────────────────

/// Text of `data[key]` when present and not `null`.
fn field_text(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some(ValueConverter::display_text(value)),
    }
}

fn first_text(data: &Map<String, Value>, keys: &[&str]) -> String {
    or_unknown(keys.iter().find_map(|key| field_text(data, key)))
}

fn or_unknown(text: Option<String>) -> String {
    text.unwrap_or_else(|| UNKNOWN.to_string())
}

fn one_decimal(value: Option<&Value>) -> String {
    value
        .and_then(ValueConverter::as_number)
        .map(|n| format!("{n:.1}"))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn insert_attr(attributes: &mut Attributes, key: &str, value: Value) {
    attributes.insert(ValueConverter::sanitize_key(key), value);
}

// ── Normalizer ────────────────────────────────────────────────────────────────

/// Converts raw producer logs into canonical records.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    // ── Entry points ──────────────────────────────────────────────────────

    /// Normalize one entry; malformed input yields the fallback record.
    pub fn normalize(&self, entry: &RawLogEntry) -> LogRecord {
        self.normalize_at(entry, Utc::now())
    }

    /// [`normalize`](Self::normalize) with an explicit processing time.
    pub fn normalize_at(&self, entry: &RawLogEntry, now: DateTime<Utc>) -> LogRecord {
        self.try_normalize_at(entry, now).unwrap_or_else(|e| {
            warn!(
                "Failed to normalize log from {}: {}",
                entry.source, e
            );
            Self::fallback_record(&entry.source, &entry.log_type, &e, now)
        })
    }

    /// Normalize one entry, failing only when `data` is not a mapping.
    pub fn try_normalize(&self, entry: &RawLogEntry) -> Result<LogRecord> {
        self.try_normalize_at(entry, Utc::now())
    }

    pub fn try_normalize_at(&self, entry: &RawLogEntry, now: DateTime<Utc>) -> Result<LogRecord> {
        let empty = Map::new();
        let data = match &entry.data {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(ConsolidatorError::MalformedEntry(format!(
                    "data must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let source = entry.source.as_str();
        let log_type = entry.log_type.as_str();

        // Unparseable producer clocks fall back to processing time.
        let timestamp = entry
            .timestamp
            .as_ref()
            .and_then(TimestampProcessor::parse)
            .unwrap_or(now);

        let body = Self::extract_body(log_type, data);
        let severity = Self::determine_severity(log_type, data);
        let (trace_id, span_id, trace_flags) = Self::extract_trace_context(data);

        let record = LogRecord::new(timestamp, now, body, severity)
            .with_attributes(Self::extract_attributes(
                source,
                log_type,
                data,
                entry.metadata.as_ref(),
            ))
            .with_resource(self.build_resource(source, log_type, data))
            .with_instrumentation_scope(self.build_scope(source, log_type))
            .with_trace_context(trace_id, span_id, trace_flags);

        debug!(
            "Normalized {} from {} as {}",
            log_type,
            source,
            record.severity()
        );
        Ok(record)
    }

    /// Normalize an arbitrary JSON value.
    ///
    /// Values that cannot be read as a raw entry at all (not an object, or a
    /// non-string `source`) produce the fallback record.
    pub fn normalize_value(&self, value: &Value) -> LogRecord {
        self.normalize_value_at(value, Utc::now())
    }

    pub fn normalize_value_at(&self, value: &Value, now: DateTime<Utc>) -> LogRecord {
        self.normalize_value_checked(value, now).0
    }

    /// Normalize a batch, returning exactly one record per input.
    pub fn normalize_batch(&self, values: &[Value]) -> NormalizedBatch {
        self.normalize_batch_at(values, Utc::now())
    }

    pub fn normalize_batch_at(&self, values: &[Value], now: DateTime<Utc>) -> NormalizedBatch {
        let mut batch = NormalizedBatch {
            records: Vec::with_capacity(values.len()),
            errors: Vec::new(),
        };
        for value in values {
            let (record, error) = self.normalize_value_checked(value, now);
            batch.records.push(record);
            if let Some(error) = error {
                batch.errors.push(error);
            }
        }
        debug!(
            "Normalized batch of {} ({} errors)",
            batch.records.len(),
            batch.errors.len()
        );
        batch
    }

    /// The record returned when an entry cannot be normalized.
    pub fn fallback_record(
        source: &str,
        log_type: &str,
        error: &ConsolidatorError,
        now: DateTime<Utc>,
    ) -> LogRecord {
        let mut attributes = Attributes::new();
        insert_attr(&mut attributes, "source", Value::from(source));
        insert_attr(&mut attributes, "original_log_type", Value::from(log_type));
        insert_attr(&mut attributes, "normalization.error", Value::from(error.to_string()));
        LogRecord::new(
            now,
            now,
            format!("Failed to normalize log: {error}"),
            Severity::Error,
        )
        .with_attributes(attributes)
    }

    fn normalize_value_checked(
        &self,
        value: &Value,
        now: DateTime<Utc>,
    ) -> (LogRecord, Option<String>) {
        let outcome = serde_json::from_value::<RawLogEntry>(value.clone())
            .map_err(|e| ConsolidatorError::MalformedEntry(e.to_string()))
            .and_then(|entry| self.try_normalize_at(&entry, now));

        match outcome {
            Ok(record) => (record, None),
            Err(e) => {
                let lifted = |key: &str| match value.get(key) {
                    None | Some(Value::Null) => UNKNOWN.to_string(),
                    Some(v) => ValueConverter::display_text(v),
                };
                let source = lifted("source");
                let message = format!("Failed to normalize log from {source}: {e}");
                warn!("{}", message);
                let record = Self::fallback_record(&source, &lifted("log_type"), &e, now);
                (record, Some(message))
            }
        }
    }

    // ── Body ──────────────────────────────────────────────────────────────

    /// Human-facing one-line summary of `data`.
    pub fn extract_body(log_type: &str, data: &Map<String, Value>) -> String {
        if let Some(family) = BodyFamily::for_log_type(log_type) {
            return family.render(data);
        }

        if let Some(message) = field_text(data, "message") {
            return message;
        }

        if let Some(error) = data.get("error").filter(|e| ValueConverter::is_truthy(e)) {
            return match error.as_object() {
                Some(details) => format!(
                    "Error: {} - {}",
                    field_text(details, "type").unwrap_or_else(|| "Unknown".to_string()),
                    field_text(details, "details").unwrap_or_else(|| "No details".to_string()),
                ),
                None => format!("Error: {}", ValueConverter::display_text(error)),
            };
        }

        let parts: Vec<String> = SUMMARY_KEYS
            .iter()
            .filter_map(|key| field_text(data, key).map(|v| format!("{key}: {v}")))
            .collect();
        if parts.is_empty() {
            format!("{log_type} log entry")
        } else {
            format!("{log_type}: {}", parts.join(", "))
        }
    }

    // ── Severity ──────────────────────────────────────────────────────────

    /// First matching rule wins: level, status, event type, anomaly score,
    /// then the `log_type` default.
    pub fn determine_severity(log_type: &str, data: &Map<String, Value>) -> Severity {
        if let Some(level) = field_text(data, "level") {
            match level.trim().to_uppercase().as_str() {
                "FATAL" | "CRITICAL" => return Severity::Fatal,
                "ERROR" | "ERR" => return Severity::Error,
                "WARN" | "WARNING" => return Severity::Warn,
                "INFO" => return Severity::Info,
                "DEBUG" | "TRACE" => return Severity::Debug,
                _ => {}
            }
        }

        if let Some(status) = field_text(data, "status") {
            match status.trim().to_lowercase().as_str() {
                "failed" | "error" | "critical" | "fatal" => return Severity::Error,
                "warning" | "degraded" | "slow" => return Severity::Warn,
                _ => {}
            }
        }

        if let Some(event_type) = field_text(data, "event_type") {
            let event_type = event_type.to_lowercase();
            let contains_any = |words: &[&str]| words.iter().any(|w| event_type.contains(w));
            if contains_any(&["breach", "attack", "intrusion", "malware"]) {
                return Severity::Fatal;
            }
            if contains_any(&["failure", "blocked", "denied"]) {
                return Severity::Error;
            }
            if contains_any(&["suspicious", "anomaly"]) {
                return Severity::Warn;
            }
        }

        if let Some(score) = data.get("anomaly_score").and_then(ValueConverter::as_number) {
            if score >= 85.0 {
                return Severity::Fatal;
            }
            if score >= 70.0 {
                return Severity::Error;
            }
            if score >= 50.0 {
                return Severity::Warn;
            }
        }

        if HIGH_SENSITIVITY_LOG_TYPES.contains(&log_type) {
            Severity::Warn
        } else {
            Severity::Info
        }
    }

    // ── Attributes ────────────────────────────────────────────────────────

    pub fn extract_attributes(
        source: &str,
        log_type: &str,
        data: &Map<String, Value>,
        metadata: Option<&Value>,
    ) -> Attributes {
        let mut attributes = Attributes::new();

        insert_attr(&mut attributes, "source", Value::from(source));
        insert_attr(&mut attributes, "original_log_type", Value::from(log_type));
        insert_attr(
            &mut attributes,
            "log.category",
            Value::from(LogCategory::from_log_type(log_type).as_str()),
        );

        for key in PROMOTED_KEYS {
            if let Some(value) = data.get(*key) {
                insert_attr(&mut attributes, key, value.clone());
            }
        }

        if let Some(score) = data.get("anomaly_score") {
            insert_attr(&mut attributes, "anomaly_score", score.clone());
            let high = ValueConverter::as_number(score).is_some_and(|s| s > HIGH_ANOMALY_THRESHOLD);
            insert_attr(&mut attributes, "anomaly.high", Value::Bool(high));
        }

        for key in PERFORMANCE_KEYS {
            if let Some(value) = data.get(*key) {
                insert_attr(
                    &mut attributes,
                    &format!("{PERFORMANCE_PREFIX}{key}"),
                    value.clone(),
                );
            }
        }

        match metadata {
            Some(Value::Object(meta)) => {
                for (key, value) in meta {
                    insert_attr(&mut attributes, &format!("meta.{key}"), value.clone());
                }
            }
            Some(Value::Null) | None => {}
            Some(other) => debug!("Ignoring non-object metadata ({})", json_kind(other)),
        }

        // One level only.
        for object_name in NESTED_OBJECTS {
            if let Some(nested) = data.get(*object_name).and_then(Value::as_object) {
                for (key, value) in nested {
                    insert_attr(&mut attributes, &format!("{object_name}.{key}"), value.clone());
                }
            }
        }

        attributes
    }

    // ── Resource / scope / trace ──────────────────────────────────────────

    fn build_resource(&self, source: &str, log_type: &str, data: &Map<String, Value>) -> Resource {
        let host_name = HOST_FIELDS
            .iter()
            .find_map(|key| field_text(data, key))
            .unwrap_or_else(|| "unknown-host".to_string());
        let host_ip = IP_FIELDS
            .iter()
            .find_map(|key| field_text(data, key))
            .unwrap_or_else(|| "127.0.0.1".to_string());

        Resource::with_attributes([
            ("service.name", service_name_for(source)),
            ("service.version", self.config.service_version.clone()),
            ("host.name", host_name),
            ("host.ip", host_ip),
            ("environment", self.config.environment.clone()),
            (
                "deployment.environment",
                self.config.deployment_environment.clone(),
            ),
            (
                "log.category",
                LogCategory::from_log_type(log_type).as_str().to_string(),
            ),
        ])
    }

    fn build_scope(&self, source: &str, log_type: &str) -> InstrumentationScope {
        let kind = log_type.strip_suffix("_log").unwrap_or(log_type);
        InstrumentationScope {
            name: format!("{source}.{kind}"),
            version: Some(self.config.service_version.clone()),
            attributes: Default::default(),
        }
    }

    /// `(trace_id, span_id, trace_flags)`; `request_id` stands in for a
    /// missing span id, truncated to 16 characters.
    fn extract_trace_context(
        data: &Map<String, Value>,
    ) -> (Option<String>, Option<String>, Option<u8>) {
        let trace_id = field_text(data, "trace_id");
        let span_id = field_text(data, "span_id").or_else(|| {
            field_text(data, "request_id").map(|id| ValueConverter::truncate_chars(&id, 16))
        });
        let trace_flags = data
            .get("trace_flags")
            .and_then(Value::as_u64)
            .and_then(|flags| u8::try_from(flags).ok());
        (trace_id, span_id, trace_flags)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
