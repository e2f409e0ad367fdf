use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses and formats the loosely-formatted timestamps producers send.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Attempt to parse a [`serde_json::Value`] into a UTC [`DateTime`].
    ///
    /// Handles:
    /// * `null`       → `None`
    /// * JSON string  → ISO 8601 / RFC 3339 (including `Z`-suffix) or common
    ///   date-time patterns; zone-less values are taken as UTC.
    /// * JSON number  → Unix timestamp (integer or float seconds).
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Null => None,
            Value::String(s) => Self::parse_str(s.as_str()),
            Value::Number(n) => {
                if let Some(secs) = n.as_i64() {
                    DateTime::from_timestamp(secs, 0)
                } else if let Some(f) = n.as_f64() {
                    if !f.is_finite() {
                        return None;
                    }
                    let secs = f.trunc() as i64;
                    let nanos = (f.fract().abs() * 1_000_000_000.0).round() as u32;
                    DateTime::from_timestamp(secs, nanos.min(999_999_999))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Parse a timestamp string; `None` for empty or unrecognised input.
    pub fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        // Replace trailing 'Z' with '+00:00' for RFC 3339 compatibility.
        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        // Offset without the RFC 3339 'T' separator, e.g. "2025-01-02 10:30:45+07:00".
        if let Ok(dt) = DateTime::parse_from_str(&normalised, "%Y-%m-%d %H:%M:%S%.f%:z") {
            return Some(dt.with_timezone(&Utc));
        }

        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&Utc));
        }

        // Zone-less patterns are interpreted as UTC.
        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];

        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive));
        }

        debug!("TimestampProcessor: could not parse timestamp string \"{}\"", s);
        None
    }

    /// Canonical text form: RFC 3339 in UTC with a `Z` suffix and only as
    /// many fractional digits as the value carries.
    pub fn format(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

// ── ValueConverter ────────────────────────────────────────────────────────────

/// Explicit, total conversions from producer-supplied JSON values.
pub struct ValueConverter;

impl ValueConverter {
    /// Numeric reading of a value.
    ///
    /// Numbers convert directly; strings are trimmed and parsed. Anything
    /// else (including non-finite results) yields `None`, so callers exclude
    /// the value from numeric aggregates instead of zeroing it.
    pub fn as_number(value: &Value) -> Option<f64> {
        let n = match value {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Human-readable text for a value: strings without quotes, `null` as an
    /// empty string, everything else in its JSON form.
    pub fn display_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Whether a value counts as "present" for body extraction: not `null`,
    /// `false`, an empty string or an empty container.
    pub fn is_truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        }
    }

    /// First `max_chars` characters of `s` (character-, not byte-based).
    pub fn truncate_chars(s: &str, max_chars: usize) -> String {
        s.chars().take(max_chars).collect()
    }

    /// Attribute keys never contain spaces.
    pub fn sanitize_key(key: &str) -> String {
        key.replace(' ', "_")
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
