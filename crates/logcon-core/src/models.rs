use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::catalog::HIGH_ANOMALY_THRESHOLD;
use crate::data_processors::{TimestampProcessor, ValueConverter};
use crate::error::{ConsolidatorError, Result};

/// Ordered attribute map; ordering keeps serialised records byte-stable.
pub type Attributes = BTreeMap<String, Value>;

// ── Severity ──────────────────────────────────────────────────────────────────

/// Textual severity of a canonical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    /// All levels in ascending order.
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::Fatal,
    ];

    /// The canonical uppercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Inclusive numeric band for this level.
    ///
    /// TRACE and DEBUG share the 1-8 band.
    pub fn band(&self) -> (u8, u8) {
        match self {
            Severity::Trace | Severity::Debug => (1, 8),
            Severity::Info => (9, 12),
            Severity::Warn => (13, 16),
            Severity::Error => (17, 20),
            Severity::Fatal => (21, 24),
        }
    }

    /// Whether `number` lies in this level's band.
    pub fn accepts(&self, number: SeverityNumber) -> bool {
        let (lo, hi) = self.band();
        (lo..=hi).contains(&number.get())
    }

    /// The number emitted for this level: 1 for TRACE, 2 for DEBUG, else the
    /// lowest number in the band.
    pub fn base_number(&self) -> SeverityNumber {
        match self {
            Severity::Debug => SeverityNumber(2),
            other => SeverityNumber(other.band().0),
        }
    }

    /// The level a bare number reads as. Within the shared band only 1 is
    /// TRACE; 2-8 read as DEBUG.
    pub fn from_number(number: u8) -> Result<Self> {
        match number {
            1 => Ok(Severity::Trace),
            2..=8 => Ok(Severity::Debug),
            9..=12 => Ok(Severity::Info),
            13..=16 => Ok(Severity::Warn),
            17..=20 => Ok(Severity::Error),
            21..=24 => Ok(Severity::Fatal),
            _ => Err(ConsolidatorError::InvalidSeverityNumber(i64::from(number))),
        }
    }

    /// Relative weight used for the aggregate severity score.
    pub fn weight(&self) -> u64 {
        match self {
            Severity::Trace => 1,
            Severity::Debug => 2,
            Severity::Info => 4,
            Severity::Warn => 8,
            Severity::Error => 16,
            Severity::Fatal => 32,
        }
    }
}

impl FromStr for Severity {
    type Err = ConsolidatorError;

    /// Case-insensitive parse of the six canonical names.
    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_uppercase().as_str() {
            "TRACE" => Ok(Severity::Trace),
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            "FATAL" => Ok(Severity::Fatal),
            _ => Err(ConsolidatorError::InvalidSeverity(value.to_string())),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── SeverityNumber ────────────────────────────────────────────────────────────

/// Numeric severity in `1..=24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SeverityNumber(u8);

impl SeverityNumber {
    /// Validate `n` against the 1..=24 range.
    pub fn new(n: u8) -> Result<Self> {
        Severity::from_number(n).map(|_| SeverityNumber(n))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// The level whose band contains this number.
    pub fn severity(&self) -> Severity {
        // Construction guarantees the range.
        Severity::from_number(self.0).unwrap_or(Severity::Info)
    }
}

impl TryFrom<u8> for SeverityNumber {
    type Error = ConsolidatorError;

    fn try_from(n: u8) -> Result<Self> {
        SeverityNumber::new(n)
    }
}

impl From<SeverityNumber> for u8 {
    fn from(n: SeverityNumber) -> u8 {
        n.0
    }
}

// ── RawLogEntry ───────────────────────────────────────────────────────────────

/// A producer log exactly as delivered by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLogEntry {
    /// Producer identifier.
    #[serde(default = "unknown", deserialize_with = "lenient_text")]
    pub source: String,
    /// Producer-asserted event time; may be absent or unparseable.
    #[serde(default)]
    pub timestamp: Option<Value>,
    /// Producer-declared category tag (open vocabulary).
    #[serde(default = "unknown", deserialize_with = "lenient_text")]
    pub log_type: String,
    /// Business payload; expected to be a mapping.
    #[serde(default)]
    pub data: Value,
    /// Opaque caller metadata, copied under `meta.*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Accept any JSON scalar as text; `null` reads as `"unknown"`.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => unknown(),
        other => ValueConverter::display_text(&other),
    })
}

impl RawLogEntry {
    /// Convenience constructor with a mapping payload and no metadata.
    pub fn new(
        source: impl Into<String>,
        timestamp: impl Into<String>,
        log_type: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            source: source.into(),
            timestamp: Some(Value::String(timestamp.into())),
            log_type: log_type.into(),
            data,
            metadata: None,
        }
    }

    /// Attach caller metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// ── Resource / InstrumentationScope ───────────────────────────────────────────

/// Standardised identity attributes of the emitting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Default for Resource {
    fn default() -> Self {
        let attributes = [
            ("service.name", "unknown-service"),
            ("service.version", "1.0.0"),
            ("host.name", "unknown-host"),
            ("host.ip", "127.0.0.1"),
            ("telemetry.sdk.name", "opentelemetry"),
            ("telemetry.sdk.language", "rust"),
            ("telemetry.sdk.version", env!("CARGO_PKG_VERSION")),
            ("environment", "development"),
            ("deployment.environment", "docker"),
            ("log.category", "unknown"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { attributes }
    }
}

impl Resource {
    /// Defaults overlaid with `overrides`.
    pub fn with_attributes<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut resource = Resource::default();
        for (k, v) in overrides {
            resource.attributes.insert(k.into(), v.into());
        }
        resource
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Library/component that produced a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentationScope {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

// ── LogRecord ─────────────────────────────────────────────────────────────────

/// The canonical, schema-stable event record.
///
/// Fields are private so that `severity` and `severity_number` can only
/// change together; every `with_*` method consumes the record and returns a
/// new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredLogRecord")]
pub struct LogRecord {
    timestamp: String,
    observed_timestamp: String,
    body: String,
    #[serde(rename = "severity_text")]
    severity: Severity,
    severity_number: SeverityNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_flags: Option<u8>,
    attributes: Attributes,
    resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    instrumentation_scope: Option<InstrumentationScope>,
}

/// Wire form used when reading records back from storage.
#[derive(Deserialize)]
struct StoredLogRecord {
    timestamp: String,
    #[serde(default)]
    observed_timestamp: Option<String>,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    severity_text: Option<Severity>,
    #[serde(default)]
    severity_number: Option<SeverityNumber>,
    #[serde(default)]
    trace_id: Option<String>,
    #[serde(default)]
    span_id: Option<String>,
    #[serde(default)]
    trace_flags: Option<u8>,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    resource: Option<Resource>,
    #[serde(default)]
    instrumentation_scope: Option<InstrumentationScope>,
}

impl TryFrom<StoredLogRecord> for LogRecord {
    type Error = ConsolidatorError;

    fn try_from(stored: StoredLogRecord) -> Result<Self> {
        let (severity, severity_number) = match (stored.severity_text, stored.severity_number) {
            (Some(s), Some(n)) if !s.accepts(n) => {
                return Err(ConsolidatorError::InvalidSeverityNumber(i64::from(n.get())))
            }
            (Some(s), Some(n)) => (s, n),
            (Some(s), None) => (s, s.base_number()),
            (None, Some(n)) => (n.severity(), n),
            (None, None) => (Severity::Info, Severity::Info.base_number()),
        };
        let body = match stored.body {
            Value::String(s) => s,
            other => ValueConverter::display_text(&other),
        };
        Ok(LogRecord {
            observed_timestamp: stored
                .observed_timestamp
                .unwrap_or_else(|| stored.timestamp.clone()),
            timestamp: stored.timestamp,
            body,
            severity,
            severity_number,
            trace_id: stored.trace_id,
            span_id: stored.span_id,
            trace_flags: stored.trace_flags,
            attributes: stored.attributes,
            resource: stored.resource.unwrap_or_default(),
            instrumentation_scope: stored.instrumentation_scope,
        })
    }
}

impl LogRecord {
    /// A record with the default resource, no attributes, and the lowest
    /// number in `severity`'s band.
    pub fn new(
        timestamp: DateTime<Utc>,
        observed_timestamp: DateTime<Utc>,
        body: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            timestamp: TimestampProcessor::format(timestamp),
            observed_timestamp: TimestampProcessor::format(observed_timestamp),
            body: body.into(),
            severity,
            severity_number: severity.base_number(),
            trace_id: None,
            span_id: None,
            trace_flags: None,
            attributes: Attributes::new(),
            resource: Resource::default(),
            instrumentation_scope: None,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// Normalized event time as stored (RFC 3339 for normalizer output).
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn observed_timestamp(&self) -> &str {
        &self.observed_timestamp
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn severity_number(&self) -> SeverityNumber {
        self.severity_number
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    pub fn trace_flags(&self) -> Option<u8> {
        self.trace_flags
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn instrumentation_scope(&self) -> Option<&InstrumentationScope> {
        self.instrumentation_scope.as_ref()
    }

    // ── Derived reads ─────────────────────────────────────────────────────

    /// The event time, or `None` if the stored text does not parse.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        TimestampProcessor::parse_str(&self.timestamp)
    }

    /// The `anomaly_score` attribute coerced to a number, if possible.
    pub fn anomaly_score(&self) -> Option<f64> {
        self.attribute("anomaly_score").and_then(ValueConverter::as_number)
    }

    /// Whether the anomaly score is strictly above `threshold`.
    pub fn has_high_anomaly_score(&self, threshold: f64) -> bool {
        self.anomaly_score().is_some_and(|score| score > threshold)
    }

    /// [`has_high_anomaly_score`](Self::has_high_anomaly_score) at the fixed 70 threshold.
    pub fn is_high_anomaly(&self) -> bool {
        self.has_high_anomaly_score(HIGH_ANOMALY_THRESHOLD)
    }

    fn text_attribute(&self, key: &str) -> String {
        match self.attribute(key) {
            Some(Value::Null) | None => "unknown".to_string(),
            Some(v) => ValueConverter::display_text(v),
        }
    }

    /// Originating producer (`"unknown"` when absent).
    pub fn source(&self) -> String {
        self.text_attribute("source")
    }

    /// Original `log_type` (`"unknown"` when absent).
    pub fn log_type(&self) -> String {
        self.text_attribute("original_log_type")
    }

    /// Derived category (`"unknown"` when absent).
    pub fn category(&self) -> String {
        self.text_attribute("log.category")
    }

    pub fn is_from_source(&self, source: &str) -> bool {
        self.attribute("source").and_then(Value::as_str) == Some(source)
    }

    // ── Copy-on-write variants ────────────────────────────────────────────

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = TimestampProcessor::format(timestamp);
        self
    }

    /// Replace the stored event-time text verbatim (e.g. when re-hydrating
    /// a record whose producer clock was garbage).
    pub fn with_timestamp_text(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Change the level; the number resets to the band's lowest value.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self.severity_number = severity.base_number();
        self
    }

    /// Change the number; the level follows the number's band.
    pub fn with_severity_number(mut self, number: u8) -> Result<Self> {
        let number = SeverityNumber::new(number)?;
        self.severity = number.severity();
        self.severity_number = number;
        Ok(self)
    }

    pub fn with_trace_context(
        mut self,
        trace_id: Option<String>,
        span_id: Option<String>,
        trace_flags: Option<u8>,
    ) -> Self {
        self.trace_id = trace_id;
        self.span_id = span_id;
        self.trace_flags = trace_flags;
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn without_attribute(mut self, key: &str) -> Self {
        self.attributes.remove(key);
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_instrumentation_scope(mut self, scope: InstrumentationScope) -> Self {
        self.instrumentation_scope = Some(scope);
        self
    }
}

// ── LogRecordBatch ────────────────────────────────────────────────────────────

/// A batch of canonical records sharing one identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecordBatch {
    pub batch_id: String,
    pub batch_timestamp: String,
    pub logs: Vec<LogRecord>,
}

impl LogRecordBatch {
    pub fn new(batch_id: impl Into<String>, batch_timestamp: DateTime<Utc>, logs: Vec<LogRecord>) -> Self {
        Self {
            batch_id: batch_id.into(),
            batch_timestamp: TimestampProcessor::format(batch_timestamp),
            logs,
        }
    }

    pub fn count_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for log in &self.logs {
            *counts.entry(log.severity()).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_by_source(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for log in &self.logs {
            *counts.entry(log.source()).or_insert(0) += 1;
        }
        counts
    }

    pub fn high_anomaly_logs(&self, threshold: f64) -> Vec<&LogRecord> {
        self.logs
            .iter()
            .filter(|log| log.has_high_anomaly_score(threshold))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 10, 30, 45).unwrap()
    }

    fn make_record(severity: Severity) -> LogRecord {
        LogRecord::new(ts(), ts(), "body", severity)
            .with_attribute("source", json!("log-synthesis"))
            .with_attribute("original_log_type", json!("transaction_log"))
    }

    // ── Severity ─────────────────────────────────────────────────────────

    #[test]
    fn test_severity_base_numbers() {
        assert_eq!(Severity::Trace.base_number().get(), 1);
        assert_eq!(Severity::Debug.base_number().get(), 2);
        assert_eq!(Severity::Info.base_number().get(), 9);
        assert_eq!(Severity::Warn.base_number().get(), 13);
        assert_eq!(Severity::Error.base_number().get(), 17);
        assert_eq!(Severity::Fatal.base_number().get(), 21);
    }

    #[test]
    fn test_severity_from_number_bands() {
        assert_eq!(Severity::from_number(1).unwrap(), Severity::Trace);
        assert_eq!(Severity::from_number(2).unwrap(), Severity::Debug);
        assert_eq!(Severity::from_number(8).unwrap(), Severity::Debug);
        assert_eq!(Severity::from_number(12).unwrap(), Severity::Info);
        assert_eq!(Severity::from_number(16).unwrap(), Severity::Warn);
        assert_eq!(Severity::from_number(20).unwrap(), Severity::Error);
        assert_eq!(Severity::from_number(24).unwrap(), Severity::Fatal);
    }

    #[test]
    fn test_severity_from_number_out_of_range() {
        assert!(Severity::from_number(0).is_err());
        assert!(Severity::from_number(25).is_err());
        assert!(SeverityNumber::new(0).is_err());
    }

    #[test]
    fn test_severity_from_str_case_insensitive() {
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warn);
        assert_eq!(" Fatal ".parse::<Severity>().unwrap(), Severity::Fatal);
        assert!("LOUD".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_serde_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Warn).unwrap(), r#""WARN""#);
        let back: Severity = serde_json::from_str(r#""ERROR""#).unwrap();
        assert_eq!(back, Severity::Error);
    }

    #[test]
    fn test_severity_number_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<SeverityNumber>("30").is_err());
        let n: SeverityNumber = serde_json::from_str("18").unwrap();
        assert_eq!(n.severity(), Severity::Error);
    }

    // ── LogRecord ────────────────────────────────────────────────────────

    #[test]
    fn test_new_record_is_consistent() {
        for severity in Severity::ALL {
            let record = LogRecord::new(ts(), ts(), "x", severity);
            let (lo, hi) = severity.band();
            let n = record.severity_number().get();
            assert!((lo..=hi).contains(&n), "{severity} -> {n}");
        }
    }

    #[test]
    fn test_with_severity_resets_number() {
        let record = make_record(Severity::Info).with_severity(Severity::Fatal);
        assert_eq!(record.severity(), Severity::Fatal);
        assert_eq!(record.severity_number().get(), 21);
    }

    #[test]
    fn test_with_severity_number_moves_level() {
        let record = make_record(Severity::Info).with_severity_number(19).unwrap();
        assert_eq!(record.severity(), Severity::Error);
        assert_eq!(record.severity_number().get(), 19);
        assert!(make_record(Severity::Info).with_severity_number(0).is_err());
    }

    #[test]
    fn test_with_variants_leave_original_untouched() {
        let original = make_record(Severity::Info);
        let derived = original.clone().with_attribute("anomaly_score", json!(99));
        assert!(original.attribute("anomaly_score").is_none());
        assert_eq!(derived.anomaly_score(), Some(99.0));
        let removed = derived.clone().without_attribute("anomaly_score");
        assert!(removed.anomaly_score().is_none());
    }

    #[test]
    fn test_anomaly_score_coercion() {
        let string_score = make_record(Severity::Info).with_attribute("anomaly_score", json!("85.5"));
        assert_eq!(string_score.anomaly_score(), Some(85.5));
        assert!(string_score.has_high_anomaly_score(70.0));

        let garbage = make_record(Severity::Info).with_attribute("anomaly_score", json!("high"));
        assert_eq!(garbage.anomaly_score(), None);
        assert!(!garbage.is_high_anomaly());
    }

    #[test]
    fn test_high_anomaly_is_strictly_greater() {
        let at_threshold = make_record(Severity::Info).with_attribute("anomaly_score", json!(70));
        assert!(!at_threshold.is_high_anomaly());
        let above = make_record(Severity::Info).with_attribute("anomaly_score", json!(70.01));
        assert!(above.is_high_anomaly());
    }

    #[test]
    fn test_source_and_type_accessors() {
        let record = make_record(Severity::Info);
        assert_eq!(record.source(), "log-synthesis");
        assert!(record.is_from_source("log-synthesis"));
        assert!(!record.is_from_source("state-manager"));
        assert_eq!(record.log_type(), "transaction_log");
        assert_eq!(record.category(), "unknown");
    }

    #[test]
    fn test_parsed_timestamp() {
        let record = make_record(Severity::Info);
        assert_eq!(record.timestamp(), "2025-01-02T10:30:45Z");
        assert_eq!(record.parsed_timestamp(), Some(ts()));
        let broken = record.with_timestamp_text("yesterday-ish");
        assert!(broken.parsed_timestamp().is_none());
    }

    #[test]
    fn test_serialisation_field_names() {
        let record = make_record(Severity::Warn);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["severity_text"], json!("WARN"));
        assert_eq!(value["severity_number"], json!(13));
        assert!(value.get("trace_id").is_none());
        assert_eq!(value["resource"]["attributes"]["host.name"], json!("unknown-host"));
    }

    #[test]
    fn test_deserialise_rejects_inconsistent_severity() {
        let value = json!({
            "timestamp": "2025-01-02T10:30:45Z",
            "body": "x",
            "severity_text": "INFO",
            "severity_number": 17,
        });
        assert!(serde_json::from_value::<LogRecord>(value).is_err());
    }

    #[test]
    fn test_trace_and_debug_share_a_band() {
        assert_eq!(Severity::Trace.band(), (1, 8));
        assert_eq!(Severity::Debug.band(), (1, 8));
        let six = SeverityNumber::new(6).unwrap();
        assert!(Severity::Trace.accepts(six));
        assert!(Severity::Debug.accepts(six));
        assert!(!Severity::Info.accepts(six));
    }

    #[test]
    fn test_deserialise_debug_numbered_two() {
        let value = json!({
            "timestamp": "2025-01-02T10:30:45Z",
            "body": "cache warmed",
            "severity_text": "DEBUG",
            "severity_number": 2,
        });
        let record: LogRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.severity(), Severity::Debug);
        assert_eq!(record.severity_number().get(), 2);
    }

    #[test]
    fn test_deserialise_trace_anywhere_in_shared_band() {
        let value = json!({
            "timestamp": "2025-01-02T10:30:45Z",
            "body": "x",
            "severity_text": "TRACE",
            "severity_number": 6,
        });
        let record: LogRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.severity(), Severity::Trace);
        assert_eq!(record.severity_number().get(), 6);
    }

    #[test]
    fn test_deserialise_fills_missing_fields() {
        let value = json!({
            "timestamp": "2025-01-02T10:30:45Z",
            "body": {"structured": true},
            "severity_text": "ERROR",
        });
        let record: LogRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.severity_number().get(), 17);
        assert_eq!(record.observed_timestamp(), "2025-01-02T10:30:45Z");
        assert_eq!(record.body(), r#"{"structured":true}"#);
        assert_eq!(record.resource().get("service.version"), Some("1.0.0"));
    }

    #[test]
    fn test_round_trip_preserves_record() {
        let record = make_record(Severity::Error)
            .with_trace_context(Some("abc".into()), Some("def".into()), Some(1))
            .with_instrumentation_scope(InstrumentationScope {
                name: "log-synthesis.transaction".into(),
                version: Some("1.0.0".into()),
                attributes: BTreeMap::new(),
            });
        let json = serde_json::to_string(&record).unwrap();
        let back: LogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    // ── RawLogEntry ──────────────────────────────────────────────────────

    #[test]
    fn test_raw_entry_defaults() {
        let entry: RawLogEntry = serde_json::from_value(json!({})).unwrap();
        assert_eq!(entry.source, "unknown");
        assert_eq!(entry.log_type, "unknown");
        assert!(entry.timestamp.is_none());
        assert!(entry.data.is_null());
        assert!(entry.metadata.is_none());
    }

    // ── LogRecordBatch ───────────────────────────────────────────────────

    #[test]
    fn test_batch_counts() {
        let batch = LogRecordBatch::new(
            "b-1",
            ts(),
            vec![
                make_record(Severity::Info),
                make_record(Severity::Error).with_attribute("anomaly_score", json!(91)),
                make_record(Severity::Error).with_attribute("source", json!("state-manager")),
            ],
        );
        let by_severity = batch.count_by_severity();
        assert_eq!(by_severity[&Severity::Info], 1);
        assert_eq!(by_severity[&Severity::Error], 2);
        let by_source = batch.count_by_source();
        assert_eq!(by_source["log-synthesis"], 2);
        assert_eq!(by_source["state-manager"], 1);
        assert_eq!(batch.high_anomaly_logs(70.0).len(), 1);
    }
}
