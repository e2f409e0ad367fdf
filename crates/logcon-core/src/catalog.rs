//! Static lookup tables shared by the normalizer and the aggregator.
//!
//! Everything in here is immutable data: the category allow-lists decide
//! `log.category` (and therefore downstream routing), the service table
//! decides `service.name`, and the key lists decide which producer fields are
//! promoted into canonical attributes.

use serde::{Deserialize, Serialize};

// ── LogCategory ───────────────────────────────────────────────────────────────

/// Coarse grouping derived deterministically from a producer's `log_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Infrastructure,
    Application,
    Database,
    Security,
    Transaction,
    Fraud,
    UserBehavior,
    Compliance,
    Monitoring,
    Integration,
    /// Any `log_type` missing from every allow-list.
    Unknown,
}

impl LogCategory {
    /// The canonical lowercase identifier used in attributes and resources.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Infrastructure => "infrastructure",
            LogCategory::Application => "application",
            LogCategory::Database => "database",
            LogCategory::Security => "security",
            LogCategory::Transaction => "transaction",
            LogCategory::Fraud => "fraud",
            LogCategory::UserBehavior => "user_behavior",
            LogCategory::Compliance => "compliance",
            LogCategory::Monitoring => "monitoring",
            LogCategory::Integration => "integration",
            LogCategory::Unknown => "unknown",
        }
    }

    /// Map a producer `log_type` to its category.
    ///
    /// Lists are scanned in [`CATEGORY_TABLE`] order, so a type that appears in
    /// two lists (`api_gateway_log`) resolves to the first one.
    pub fn from_log_type(log_type: &str) -> Self {
        CATEGORY_TABLE
            .iter()
            .find(|(_, types)| types.contains(&log_type))
            .map(|(category, _)| *category)
            .unwrap_or(LogCategory::Unknown)
    }
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allow-list of `log_type` values per category, in lookup order.
pub const CATEGORY_TABLE: &[(LogCategory, &[&str])] = &[
    (
        LogCategory::Infrastructure,
        &["server_log", "container_log", "network_log", "storage_log"],
    ),
    (
        LogCategory::Application,
        &["application_log", "api_gateway_log", "microservice_log"],
    ),
    (
        LogCategory::Database,
        &["database_log", "sql_query_log", "nosql_log"],
    ),
    (
        LogCategory::Security,
        &["security_log", "authentication_log", "authorization_log"],
    ),
    (
        LogCategory::Transaction,
        &["transaction_log", "payment_log", "transfer_log"],
    ),
    (
        LogCategory::Fraud,
        &["fraud_detection_log", "aml_log", "kyc_log"],
    ),
    (
        LogCategory::UserBehavior,
        &["user_activity_log", "session_log", "clickstream_log"],
    ),
    (
        LogCategory::Compliance,
        &["audit_log", "regulatory_log", "gdpr_log"],
    ),
    (
        LogCategory::Monitoring,
        &["metrics_log", "trace_log", "alert_log"],
    ),
    (
        LogCategory::Integration,
        &["api_gateway_log", "webhook_log", "third_party_log"],
    ),
];

// ── Service identity ──────────────────────────────────────────────────────────

/// Known producers and the service name each one reports under.
pub const SERVICE_NAMES: &[(&str, &str)] = &[
    ("log-synthesis", "log-synthesis-service"),
    ("scenario-orchestrator", "scenario-orchestrator-service"),
    ("pattern-generator", "pattern-generator-service"),
    ("state-manager", "state-manager-service"),
    ("ingestion-interface", "ingestion-interface-service"),
];

/// Resolve `service.name` for a producer; unknown producers get
/// `"{source}-service"`.
pub fn service_name_for(source: &str) -> String {
    SERVICE_NAMES
        .iter()
        .find(|(known, _)| *known == source)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("{}-service", source))
}

// ── Classification lists ──────────────────────────────────────────────────────

/// Log types that default to WARN when no content signal is present.
pub const HIGH_SENSITIVITY_LOG_TYPES: &[&str] = &["security_log", "fraud_detection_log", "aml_log"];

/// Anomaly scores strictly above this value mark a high-anomaly record.
pub const HIGH_ANOMALY_THRESHOLD: f64 = 70.0;

/// Longest timeline window, in minutes (one week).
pub const MAX_TIMELINE_MINUTES: u32 = 10_080;

// ── Attribute promotion lists ─────────────────────────────────────────────────

/// Top-level business keys copied verbatim into attributes.
pub const PROMOTED_KEYS: &[&str] = &[
    "user_id",
    "username",
    "account",
    "transaction_id",
    "session_id",
    "ip_address",
    "source_ip",
    "host",
    "service",
    "level",
    "status",
    "event_type",
    "error_code",
    "amount",
    "currency",
    "gateway",
];

/// Performance metrics promoted under the `performance.` namespace.
pub const PERFORMANCE_KEYS: &[&str] = &[
    "cpu_usage_percent",
    "memory_used_gb",
    "disk_io_read_mb",
    "disk_io_write_mb",
    "response_time",
    "processing_time_ms",
    "duration_ms",
    "latency_ms",
];

/// Namespace prefix for promoted performance metrics.
pub const PERFORMANCE_PREFIX: &str = "performance.";

/// Nested sub-objects flattened one level into `{object}.{key}` attributes.
pub const NESTED_OBJECTS: &[&str] = &["transaction", "authentication", "network", "database"];

/// Fields that may carry the host IP, in priority order.
pub const IP_FIELDS: &[&str] = &["source_ip", "ip_address", "client_ip"];

/// Fields that may carry the host name, in priority order.
pub const HOST_FIELDS: &[&str] = &["host", "hostname"];

/// Keys concatenated into the generic fallback body.
pub const SUMMARY_KEYS: &[&str] = &["level", "status", "event_type", "transaction_id", "user_id"];

/// Common failure phrases tallied for ERROR/FATAL records, in match order.
pub const ERROR_PHRASES: &[&str] = &[
    "connection timeout",
    "database error",
    "authentication failed",
    "permission denied",
    "file not found",
    "server error",
    "network error",
    "memory error",
    "disk full",
    "cpu overload",
];

// ── Tests ─────────────────────────────────────────────────────────────────────
