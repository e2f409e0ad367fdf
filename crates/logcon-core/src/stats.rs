use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Percentile helpers ────────────────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using standard linear
/// interpolation (the same algorithm used by NumPy's `percentile` function).
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> Option<f64> {
    let len = sorted_data.len();
    match len {
        0 => None,
        1 => Some(sorted_data[0]),
        _ => {
            let rank = (p / 100.0) * (len as f64 - 1.0);
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            if lo == hi {
                return Some(sorted_data[lo]);
            }
            let frac = rank - lo as f64;
            Some(sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo]))
        }
    }
}

/// Median of an unsorted slice; the mean of the two middle values for an
/// even count.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, 50.0)
}

/// Arithmetic mean; `None` when there is nothing to average.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

// ── NumericSummary ────────────────────────────────────────────────────────────

/// count/min/max/mean/median over the values that were actually present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    #[serde(rename = "avg")]
    pub mean: f64,
    pub median: f64,
}

impl NumericSummary {
    /// Summarise `values`; `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        Some(Self {
            count: values.len(),
            min: min(values)?,
            max: max(values)?,
            mean: mean(values)?,
            median: median(values)?,
        })
    }
}

// ── Tally ─────────────────────────────────────────────────────────────────────

/// One ranked entry of a [`Tally`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub name: String,
    pub count: usize,
}

/// Frequency counter that remembers first-appearance order.
///
/// Rankings sort by count descending; equal counts keep the order in which
/// the keys were first seen, so results are stable for a given input.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    entries: Vec<CountEntry>,
    /// Position of each name in `entries`.
    index: HashMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl AsRef<str>) {
        let name = name.as_ref();
        match self.index.get(name) {
            Some(&pos) => self.entries[pos].count += 1,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push(CountEntry {
                    name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> usize {
        self.index
            .get(name)
            .map(|&pos| self.entries[pos].count)
            .unwrap_or(0)
    }

    /// All entries in first-appearance order.
    pub fn entries(&self) -> &[CountEntry] {
        &self.entries
    }

    /// The `n` most frequent entries.
    pub fn most_common(&self, n: usize) -> Vec<CountEntry> {
        let mut ranked = self.entries.clone();
        // `sort_by` is stable, which preserves first appearance among ties.
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(n);
        ranked
    }
}

impl<S: AsRef<str>> FromIterator<S> for Tally {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for name in iter {
            tally.add(name);
        }
        tally
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
