//! Process-wide request counters reported by `/stats`.
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, PoisonError,
};

use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

pub struct Stats {
    since: String,
    served: AtomicU64,
    uploaded: AtomicU64,
    errors: Mutex<BTreeMap<u16, u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A point-in-time copy of the counters.
pub struct StatsReport {
    pub since: String,
    pub served: u64,
    pub uploaded: u64,
    /// Error responses keyed by HTTP status code.
    pub errors: BTreeMap<u16, u64>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        let since = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            since,
            served: AtomicU64::new(0),
            uploaded: AtomicU64::new(0),
            errors: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_served(&self) {
        self.served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_uploaded(&self) {
        self.uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, status: u16) {
        let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        *errors.entry(status).or_default() += 1;
    }

    pub fn report(&self) -> StatsReport {
        StatsReport {
            since: self.since.clone(),
            served: self.served.load(Ordering::Relaxed),
            uploaded: self.uploaded.load(Ordering::Relaxed),
            errors: self
                .errors
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fresh_stats_are_empty() {
        let report = Stats::new().report();
        assert_eq!((report.served, report.uploaded), (0, 0));
        assert!(report.errors.is_empty());
        assert!(!report.since.is_empty());
    }

    #[test]
    fn errors_are_counted_per_status() {
        let stats = Stats::new();
        stats.record_error(404);
        stats.record_error(404);
        stats.record_error(401);
        let report = stats.report();
        assert_eq!(report.errors, BTreeMap::from([(401, 1), (404, 2)]));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errors"]["404"], 2);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(Stats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_served();
                        stats.record_uploaded();
                        stats.record_error(500);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let report = stats.report();
        assert_eq!((report.served, report.uploaded), (8000, 8000));
        assert_eq!(report.errors[&500], 8000);
    }
}
