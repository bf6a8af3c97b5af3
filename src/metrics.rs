/*
 *  metrics.rs
 *
 *  LyMatrix - pixel panel dashboard
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
//! In-process fetch metrics, keyed by source name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

/// Counters and the last load time for one source.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SourceMetrics {
    /// `matrix.load_seconds` gauge: duration of the most recent cycle
    pub load_seconds: f64,
    pub fetches: u64,
    pub failures: u64,
}

/// Shared registry handed to every source worker.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<Mutex<HashMap<String, SourceMetrics>>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed fetch/fallback cycle.
    pub fn record(&self, source: &str, elapsed: Duration, failed: bool) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(source.to_string()).or_default();
        entry.load_seconds = elapsed.as_secs_f64();
        entry.fetches += 1;
        if failed {
            entry.failures += 1;
        }
        debug!(
            "matrix.load_seconds={:.3} image:{} fetches={} failures={}",
            entry.load_seconds, source, entry.fetches, entry.failures
        );
    }

    pub fn get(&self, source: &str) -> Option<SourceMetrics> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .copied()
    }

    /// Sorted copy of every source's metrics.
    pub fn snapshot(&self) -> Vec<(String, SourceMetrics)> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Times a fetch cycle; records into the registry when dropped.
pub struct FetchTimer<'a> {
    metrics: &'a Metrics,
    name: &'a str,
    start: Instant,
    failed: bool,
}

impl<'a> FetchTimer<'a> {
    pub fn new(metrics: &'a Metrics, name: &'a str) -> Self {
        FetchTimer {
            metrics,
            name,
            start: Instant::now(),
            failed: false,
        }
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
    }
}

// called automatically when the timer goes out of scope
impl Drop for FetchTimer<'_> {
    fn drop(&mut self) {
        self.metrics.record(self.name, self.start.elapsed(), self.failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_failures() {
        let m = Metrics::new();
        m.record("weather", Duration::from_millis(250), false);
        m.record("weather", Duration::from_millis(500), true);

        let w = m.get("weather").unwrap();
        assert_eq!(w.fetches, 2);
        assert_eq!(w.failures, 1);
        assert!((w.load_seconds - 0.5).abs() < 1e-9);
        assert!(m.get("mbta").is_none());
    }

    #[test]
    fn test_timer_records_on_drop() {
        let m = Metrics::new();
        {
            let mut t = FetchTimer::new(&m, "fish");
            t.mark_failed();
        }
        let f = m.get("fish").unwrap();
        assert_eq!((f.fetches, f.failures), (1, 1));
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let m = Metrics::new();
        m.record("mbta", Duration::ZERO, false);
        m.record("bluebikes", Duration::ZERO, false);
        let names: Vec<_> = m.snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["bluebikes", "mbta"]);
    }
}
