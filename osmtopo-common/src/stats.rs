//! Flat name -> count stats map shared by every pass of both pipelines.
//!
//! Mirrors the Python original's `defaultdict(lambda: 0)`: any counter name
//! that was never touched reads back as zero, and `bump` is the only way to
//! grow the map, so a typo'd counter name just silently starts a new one
//! instead of panicking mid-ingest.

use std::collections::BTreeMap;
use std::fmt;

/// A flat counter map, keyed by counter name.
///
/// Kept as a `BTreeMap` (rather than a `HashMap`) so that periodic progress
/// printouts and the final summary come out in a stable, diffable order.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    counters: BTreeMap<String, i64>,
    /// Running-maximum float counters (e.g. `max_area_distance`), kept
    /// separate from the integer counters since they track degrees, not
    /// event counts.
    watermarks: BTreeMap<String, f64>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `name` by one, creating it at zero first if needed.
    pub fn bump(&mut self, name: &str) {
        self.add(name, 1);
    }

    /// Increment `name` by `delta` (may be negative).
    pub fn add(&mut self, name: &str, delta: i64) {
        *self.counters.entry(name.to_string()).or_insert(0) += delta;
    }

    /// Read `name`, defaulting to zero if it was never touched.
    pub fn get(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Raise the running maximum for `name` to `value` if it is larger.
    ///
    /// Used for `max_area_distance` in the Area Resolver.
    pub fn watermark_max(&mut self, name: &str, value: f64) {
        let entry = self.watermarks.entry(name.to_string()).or_insert(0.0);
        if value > *entry {
            *entry = value;
        }
    }

    pub fn get_watermark(&self, name: &str) -> f64 {
        self.watermarks.get(name).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.counters.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (name, value) in &self.counters {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{name}: {value}")?;
        }
        for (name, value) in &self.watermarks {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}
