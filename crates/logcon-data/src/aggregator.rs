//! Statistics, timelines and anomaly-pattern breakdowns over canonical records.
//!
//! Every operation is a pure read over a caller-supplied slice. Callers
//! that share a live store must pass a consistent snapshot.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Timelike, Utc};
use regex::RegexSet;
use serde::Serialize;
use tracing::warn;

use logcon_core::catalog::{
    ERROR_PHRASES, HIGH_ANOMALY_THRESHOLD, MAX_TIMELINE_MINUTES, PERFORMANCE_KEYS,
    PERFORMANCE_PREFIX,
};
use logcon_core::data_processors::{TimestampProcessor, ValueConverter};
use logcon_core::models::{LogRecord, Severity};
use logcon_core::stats::{self, CountEntry, NumericSummary, Tally};

pub const NO_LOGS_MESSAGE: &str = "No logs available for analysis";
pub const NO_HIGH_ANOMALY_MESSAGE: &str = "No high anomaly logs found";
pub const NO_ERROR_LOGS_MESSAGE: &str = "No error logs found";

const TOP_N: usize = 10;
const TOP_LOG_TYPES: usize = 5;
const TOP_ERROR_SOURCES: usize = 5;

// ── Report ────────────────────────────────────────────────────────────────────

/// Either a computed result or an explicit "no data" sentinel.
///
/// Serialises untagged: the sentinel is `{"message": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Report<T> {
    Empty { message: String },
    Ready(T),
}

impl<T> Report<T> {
    pub fn empty(message: &str) -> Self {
        Report::Empty {
            message: message.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Report::Empty { .. })
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Report::Ready(value) => Some(value),
            Report::Empty { .. } => None,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            Report::Ready(value) => Some(value),
            Report::Empty { .. } => None,
        }
    }
}

// ── Result structures ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub total_logs: usize,
    pub unique_sources: usize,
    pub unique_log_types: usize,
    pub high_anomaly_logs: usize,
    /// Sum of per-record severity weights.
    pub severity_weight_score: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyAnalysis {
    pub logs_with_anomaly_score: usize,
    pub avg_anomaly_score: Option<f64>,
    pub max_anomaly_score: Option<f64>,
    pub min_anomaly_score: Option<f64>,
    pub high_anomaly_count: usize,
    /// `high_anomaly_count / total_logs * 100`; the denominator includes
    /// records without a score.
    pub high_anomaly_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeAnalysis {
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: f64,
    pub avg_interval_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPatterns {
    pub total_error_logs: usize,
    pub error_patterns: Vec<CountEntry>,
    pub error_by_source: Vec<CountEntry>,
}

/// Output of [`LogAggregator::aggregate_stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogStats {
    pub summary: StatsSummary,
    pub severity_distribution: BTreeMap<Severity, usize>,
    pub top_sources: Vec<CountEntry>,
    pub top_categories: Vec<CountEntry>,
    pub anomaly_analysis: AnomalyAnalysis,
    /// Absent when no record has a parseable timestamp.
    pub time_analysis: Option<TimeAnalysis>,
    /// Keyed by metric name without the `performance.` prefix.
    pub performance_metrics: BTreeMap<String, NumericSummary>,
    pub error_patterns: Report<ErrorPatterns>,
    pub generated_at: String,
}

/// One minute of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineBucket {
    /// Inclusive start of the bucket.
    pub timestamp: String,
    pub count: usize,
    pub severity_counts: BTreeMap<Severity, usize>,
    pub source_counts: BTreeMap<String, usize>,
    pub avg_anomaly_score: Option<f64>,
    pub max_anomaly_score: Option<f64>,
    pub high_anomaly_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStats {
    pub count: usize,
    pub severity_distribution: BTreeMap<Severity, usize>,
    pub avg_anomaly_score: Option<f64>,
    pub latest_timestamp: Option<String>,
    pub top_log_types: Vec<CountEntry>,
    pub high_anomaly_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePattern {
    /// Most frequent UTC hour; ties go to the hour seen first.
    pub peak_hour: u32,
    pub hour_distribution: BTreeMap<u32, usize>,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: f64,
}

/// Output of [`LogAggregator::aggregate_anomaly_patterns`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyPatterns {
    pub total_high_anomaly_logs: usize,
    pub threshold_used: f64,
    pub anomaly_by_source: Vec<CountEntry>,
    pub anomaly_by_type: Vec<CountEntry>,
    pub anomaly_by_category: Vec<CountEntry>,
    pub time_pattern: Option<TimePattern>,
    pub score_distribution: Option<NumericSummary>,
    pub generated_at: String,
}

// ── LogAggregator ─────────────────────────────────────────────────────────────

/// Stateless aggregation over canonical records.
pub struct LogAggregator;

impl LogAggregator {
    // ── Stats ─────────────────────────────────────────────────────────────

    pub fn aggregate_stats(records: &[LogRecord]) -> Report<LogStats> {
        Self::aggregate_stats_at(records, Utc::now())
    }

    pub fn aggregate_stats_at(records: &[LogRecord], now: DateTime<Utc>) -> Report<LogStats> {
        if records.is_empty() {
            return Report::empty(NO_LOGS_MESSAGE);
        }

        let total = records.len();
        let unique_sources: HashSet<String> = records.iter().map(LogRecord::source).collect();
        let unique_types: HashSet<String> = records.iter().map(LogRecord::log_type).collect();

        let scores: Vec<f64> = records.iter().filter_map(LogRecord::anomaly_score).collect();
        let high_anomaly_count = scores
            .iter()
            .filter(|s| **s > HIGH_ANOMALY_THRESHOLD)
            .count();

        let severity_weight_score = records.iter().map(|r| r.severity().weight()).sum();

        Report::Ready(LogStats {
            summary: StatsSummary {
                total_logs: total,
                unique_sources: unique_sources.len(),
                unique_log_types: unique_types.len(),
                high_anomaly_logs: high_anomaly_count,
                severity_weight_score,
            },
            severity_distribution: severity_histogram(records.iter()),
            top_sources: records
                .iter()
                .map(LogRecord::source)
                .collect::<Tally>()
                .most_common(TOP_N),
            top_categories: records
                .iter()
                .map(LogRecord::category)
                .collect::<Tally>()
                .most_common(TOP_N),
            anomaly_analysis: AnomalyAnalysis {
                logs_with_anomaly_score: scores.len(),
                avg_anomaly_score: stats::mean(&scores),
                max_anomaly_score: stats::max(&scores),
                min_anomaly_score: stats::min(&scores),
                high_anomaly_count,
                high_anomaly_percentage: high_anomaly_count as f64 / total as f64 * 100.0,
            },
            time_analysis: Self::time_analysis(records),
            performance_metrics: Self::performance_metrics(records),
            error_patterns: Self::error_patterns(records),
            generated_at: TimestampProcessor::format(now),
        })
    }

    fn time_analysis(records: &[LogRecord]) -> Option<TimeAnalysis> {
        let mut timestamps: Vec<DateTime<Utc>> =
            records.iter().filter_map(LogRecord::parsed_timestamp).collect();
        timestamps.sort();
        let (first, last) = (*timestamps.first()?, *timestamps.last()?);
        let span_seconds = seconds_between(first, last);
        let intervals = timestamps.len().saturating_sub(1).max(1);
        Some(TimeAnalysis {
            start_time: TimestampProcessor::format(first),
            end_time: TimestampProcessor::format(last),
            duration_minutes: span_seconds / 60.0,
            avg_interval_seconds: span_seconds / intervals as f64,
        })
    }

    /// Summaries for each recognised `performance.*` attribute that appears
    /// with a numeric value in at least one record.
    pub fn performance_metrics(records: &[LogRecord]) -> BTreeMap<String, NumericSummary> {
        PERFORMANCE_KEYS
            .iter()
            .filter_map(|metric| {
                let key = format!("{PERFORMANCE_PREFIX}{metric}");
                let values: Vec<f64> = records
                    .iter()
                    .filter_map(|r| r.attribute(&key).and_then(ValueConverter::as_number))
                    .collect();
                NumericSummary::from_values(&values).map(|s| (metric.to_string(), s))
            })
            .collect()
    }

    /// Phrase and source tallies over ERROR/FATAL records.
    pub fn error_patterns(records: &[LogRecord]) -> Report<ErrorPatterns> {
        let errors: Vec<&LogRecord> = records
            .iter()
            .filter(|r| matches!(r.severity(), Severity::Error | Severity::Fatal))
            .collect();
        if errors.is_empty() {
            return Report::empty(NO_ERROR_LOGS_MESSAGE);
        }

        let phrases = error_phrase_set();
        let mut by_phrase = Tally::new();
        let mut by_source = Tally::new();
        for record in &errors {
            // Lowest index wins, so list order decides between overlapping phrases.
            if let Some(idx) = phrases.matches(record.body()).iter().next() {
                by_phrase.add(ERROR_PHRASES[idx]);
            }
            by_source.add(record.source());
        }

        Report::Ready(ErrorPatterns {
            total_error_logs: errors.len(),
            error_patterns: by_phrase.most_common(TOP_N),
            error_by_source: by_source.most_common(TOP_ERROR_SOURCES),
        })
    }

    // ── Timeline ──────────────────────────────────────────────────────────

    pub fn aggregate_timeline(records: &[LogRecord], window_minutes: u32) -> Report<Vec<TimelineBucket>> {
        Self::aggregate_timeline_at(records, window_minutes, Utc::now())
    }

    /// One bucket per minute of `[now - window_minutes, now)`, oldest first.
    ///
    /// Records outside the window or without a parseable timestamp are
    /// dropped. Windows longer than [`MAX_TIMELINE_MINUTES`] are clamped.
    pub fn aggregate_timeline_at(
        records: &[LogRecord],
        window_minutes: u32,
        now: DateTime<Utc>,
    ) -> Report<Vec<TimelineBucket>> {
        if records.is_empty() {
            return Report::empty(NO_LOGS_MESSAGE);
        }

        if window_minutes > MAX_TIMELINE_MINUTES {
            warn!(
                "Timeline window of {} minutes clamped to {}",
                window_minutes, MAX_TIMELINE_MINUTES
            );
        }
        let window_minutes = window_minutes.min(MAX_TIMELINE_MINUTES);
        let start = now - Duration::minutes(i64::from(window_minutes));
        let slots = window_minutes as usize;

        // Sparse: only minutes that hold records get an entry.
        let mut members: BTreeMap<usize, Vec<&LogRecord>> = BTreeMap::new();
        for record in records {
            let Some(ts) = record.parsed_timestamp() else {
                continue;
            };
            if ts < start || ts >= now {
                continue;
            }
            let idx = ((ts - start).num_milliseconds() / 60_000) as usize;
            if idx < slots {
                members.entry(idx).or_default().push(record);
            }
        }

        let buckets = (0..slots)
            .map(|i| {
                let bucket = members.remove(&i).unwrap_or_default();
                let scores: Vec<f64> = bucket.iter().filter_map(|r| r.anomaly_score()).collect();
                let mut source_counts = BTreeMap::new();
                for record in &bucket {
                    *source_counts.entry(record.source()).or_insert(0) += 1;
                }
                TimelineBucket {
                    timestamp: TimestampProcessor::format(start + Duration::minutes(i as i64)),
                    count: bucket.len(),
                    severity_counts: severity_histogram(bucket.iter().copied()),
                    source_counts,
                    avg_anomaly_score: stats::mean(&scores),
                    max_anomaly_score: stats::max(&scores),
                    high_anomaly_count: scores
                        .iter()
                        .filter(|s| **s > HIGH_ANOMALY_THRESHOLD)
                        .count(),
                }
            })
            .collect();

        Report::Ready(buckets)
    }

    // ── By source ─────────────────────────────────────────────────────────

    pub fn aggregate_by_source(records: &[LogRecord]) -> Report<BTreeMap<String, SourceStats>> {
        if records.is_empty() {
            return Report::empty(NO_LOGS_MESSAGE);
        }

        let mut groups: BTreeMap<String, Vec<&LogRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.source()).or_default().push(record);
        }

        let by_source = groups
            .into_iter()
            .map(|(source, group)| {
                let scores: Vec<f64> = group.iter().filter_map(|r| r.anomaly_score()).collect();
                let latest = group.iter().filter_map(|r| r.parsed_timestamp()).max();
                let stats = SourceStats {
                    count: group.len(),
                    severity_distribution: severity_histogram(group.iter().copied()),
                    avg_anomaly_score: stats::mean(&scores),
                    latest_timestamp: latest.map(TimestampProcessor::format),
                    top_log_types: group
                        .iter()
                        .map(|r| r.log_type())
                        .collect::<Tally>()
                        .most_common(TOP_LOG_TYPES),
                    high_anomaly_count: group.iter().filter(|r| r.is_high_anomaly()).count(),
                };
                (source, stats)
            })
            .collect();

        Report::Ready(by_source)
    }

    // ── Anomaly patterns ──────────────────────────────────────────────────

    pub fn aggregate_anomaly_patterns(records: &[LogRecord], threshold: f64) -> Report<AnomalyPatterns> {
        Self::aggregate_anomaly_patterns_at(records, threshold, Utc::now())
    }

    /// Breakdowns over records scoring strictly above `threshold`.
    pub fn aggregate_anomaly_patterns_at(
        records: &[LogRecord],
        threshold: f64,
        now: DateTime<Utc>,
    ) -> Report<AnomalyPatterns> {
        let matched: Vec<&LogRecord> = records
            .iter()
            .filter(|r| r.has_high_anomaly_score(threshold))
            .collect();
        if matched.is_empty() {
            return Report::empty(NO_HIGH_ANOMALY_MESSAGE);
        }

        let tally = |key: fn(&LogRecord) -> String| {
            matched
                .iter()
                .map(|r| key(r))
                .collect::<Tally>()
                .most_common(TOP_N)
        };
        let scores: Vec<f64> = matched.iter().filter_map(|r| r.anomaly_score()).collect();

        Report::Ready(AnomalyPatterns {
            total_high_anomaly_logs: matched.len(),
            threshold_used: threshold,
            anomaly_by_source: tally(LogRecord::source),
            anomaly_by_type: tally(LogRecord::log_type),
            anomaly_by_category: tally(LogRecord::category),
            time_pattern: Self::time_pattern(&matched),
            score_distribution: NumericSummary::from_values(&scores),
            generated_at: TimestampProcessor::format(now),
        })
    }

    fn time_pattern(records: &[&LogRecord]) -> Option<TimePattern> {
        let timestamps: Vec<DateTime<Utc>> =
            records.iter().filter_map(|r| r.parsed_timestamp()).collect();
        let first = *timestamps.iter().min()?;
        let last = *timestamps.iter().max()?;

        // First-appearance order, for the peak tie-break.
        let mut hours: Vec<(u32, usize)> = Vec::new();
        for ts in &timestamps {
            match hours.iter_mut().find(|(h, _)| *h == ts.hour()) {
                Some((_, count)) => *count += 1,
                None => hours.push((ts.hour(), 1)),
            }
        }
        let mut peak = hours[0];
        for candidate in &hours[1..] {
            if candidate.1 > peak.1 {
                peak = *candidate;
            }
        }

        Some(TimePattern {
            peak_hour: peak.0,
            hour_distribution: hours.into_iter().collect(),
            start_time: TimestampProcessor::format(first),
            end_time: TimestampProcessor::format(last),
            duration_minutes: seconds_between(first, last) / 60.0,
        })
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn severity_histogram<'a>(records: impl Iterator<Item = &'a LogRecord>) -> BTreeMap<Severity, usize> {
    let mut histogram = BTreeMap::new();
    for record in records {
        *histogram.entry(record.severity()).or_insert(0) += 1;
    }
    histogram
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

fn error_phrase_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new(
            ERROR_PHRASES
                .iter()
                .map(|phrase| format!("(?i){}", regex::escape(phrase))),
        )
        .expect("error phrases are valid regexes")
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
