use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

pub const RECORDS_APPENDED_TOTAL: &str = "shopfloor_store_records_appended_total";
pub const DUPLICATES_SUPPRESSED_TOTAL: &str = "shopfloor_store_duplicates_suppressed_total";
pub const RESET_TRIGGERS_TOTAL: &str = "shopfloor_store_reset_triggers_total";
pub const RECORDS_EVICTED_TOTAL: &str = "shopfloor_store_records_evicted_total";
pub const EVICTED_QUERIES_TOTAL: &str = "shopfloor_store_evicted_queries_total";

/// Counters updated by the store without taking any lock.
#[derive(Debug, Default)]
pub struct StoreTelemetry {
    records_appended: AtomicU64,
    duplicates_suppressed: AtomicU64,
    reset_triggers: AtomicU64,
    records_evicted: AtomicU64,
    evicted_queries: AtomicU64,
}

/// Point-in-time copy of the store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreTelemetrySnapshot {
    pub records_appended_total: u64,
    pub duplicates_suppressed_total: u64,
    pub reset_triggers_total: u64,
    pub records_evicted_total: u64,
    pub evicted_queries_total: u64,
}

impl StoreTelemetry {
    pub fn record_appended(&self) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate_suppressed(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset_triggered(&self) {
        self.reset_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.records_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn evicted_query(&self) {
        self.evicted_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StoreTelemetrySnapshot {
        StoreTelemetrySnapshot {
            records_appended_total: self.records_appended.load(Ordering::Relaxed),
            duplicates_suppressed_total: self.duplicates_suppressed.load(Ordering::Relaxed),
            reset_triggers_total: self.reset_triggers.load(Ordering::Relaxed),
            records_evicted_total: self.records_evicted.load(Ordering::Relaxed),
            evicted_queries_total: self.evicted_queries.load(Ordering::Relaxed),
        }
    }
}

impl StoreTelemetrySnapshot {
    /// Renders the counters in Prometheus text exposition format.
    pub fn render_exposition(&self) -> String {
        let counters = [
            (
                RECORDS_APPENDED_TOTAL,
                "Observation records appended to the sequence buffer.",
                self.records_appended_total,
            ),
            (
                DUPLICATES_SUPPRESSED_TOTAL,
                "Payloads dropped because they did not change the effective state.",
                self.duplicates_suppressed_total,
            ),
            (
                RESET_TRIGGERS_TOTAL,
                "Payloads that carried a reset trigger.",
                self.reset_triggers_total,
            ),
            (
                RECORDS_EVICTED_TOTAL,
                "Records overwritten after the ring filled up.",
                self.records_evicted_total,
            ),
            (
                EVICTED_QUERIES_TOTAL,
                "Historical queries that asked for an evicted sequence.",
                self.evicted_queries_total,
            ),
        ];
        let mut out = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

/// Extracts metric names (without labels) from Prometheus exposition text.
pub fn scrape_metric_names(exposition: &str) -> Vec<String> {
    exposition
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let mut parts = trimmed.split(|c: char| c == '{' || c.is_whitespace());
            parts
                .next()
                .filter(|name| !name.is_empty())
                .map(|name| name.to_string())
        })
        .collect()
}
