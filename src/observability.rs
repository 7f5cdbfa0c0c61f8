//! Run counters
//!
//! Every counter bump is mirrored as a `debug` tracing event so the counts
//! can be followed live with `RUST_LOG=scrapetree=debug`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RunStats {
    expansions: AtomicU64,
    processed_hits: AtomicU64,
    raw_hits: AtomicU64,
    network_fetches: AtomicU64,
    handler_calls: AtomicU64,
    emitted: AtomicU64,
    failures: AtomicU64,
    cycles_suppressed: AtomicU64,
    cache_write_failures: AtomicU64,
}

macro_rules! counter {
    ($method:ident, $field:ident) => {
        pub fn $method(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(counter = stringify!($field), "Metric incremented");
        }
    };
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(expansion_started, expansions);
    counter!(processed_hit, processed_hits);
    counter!(raw_hit, raw_hits);
    counter!(network_fetch, network_fetches);
    counter!(handler_called, handler_calls);
    counter!(leaf_emitted, emitted);
    counter!(expansion_failed, failures);
    counter!(cycle_suppressed, cycles_suppressed);
    counter!(cache_write_failed, cache_write_failures);

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            expansions: self.expansions.load(Ordering::Relaxed),
            processed_hits: self.processed_hits.load(Ordering::Relaxed),
            raw_hits: self.raw_hits.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            handler_calls: self.handler_calls.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cycles_suppressed: self.cycles_suppressed.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub expansions: u64,
    pub processed_hits: u64,
    pub raw_hits: u64,
    pub network_fetches: u64,
    pub handler_calls: u64,
    pub emitted: u64,
    pub failures: u64,
    pub cycles_suppressed: u64,
    pub cache_write_failures: u64,
}
