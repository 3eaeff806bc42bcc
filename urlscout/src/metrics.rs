use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks request and pattern-cache counters for a search run
#[derive(Debug, Clone)]
pub struct FetchMetrics {
    // Request metrics
    targets_dispatched: Arc<AtomicU64>,
    targets_succeeded: Arc<AtomicU64>,
    targets_failed: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
    matches_found: Arc<AtomicU64>,

    // Cache metrics
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
}

impl FetchMetrics {
    /// Creates a new FetchMetrics instance
    pub fn new() -> Self {
        Self {
            targets_dispatched: Arc::new(AtomicU64::new(0)),
            targets_succeeded: Arc::new(AtomicU64::new(0)),
            targets_failed: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            matches_found: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a target handed to a worker
    pub fn record_dispatch(&self) {
        self.targets_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successfully scanned response body
    pub fn record_success(&self, bytes: u64, matches: u64) {
        self.targets_succeeded.fetch_add(1, Ordering::Relaxed);
        let total = self.bytes_read.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.matches_found.fetch_add(matches, Ordering::Relaxed);
        debug!("Body scanned: {} bytes, total read: {} bytes", bytes, total);
    }

    /// Records a target that ended in an error
    pub fn record_failure(&self) {
        self.targets_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a pattern cache lookup
    pub fn record_cache_operation(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Gets the current counters
    pub fn get_stats(&self) -> FetchStats {
        FetchStats {
            targets_dispatched: self.targets_dispatched.load(Ordering::Relaxed),
            targets_succeeded: self.targets_succeeded.load(Ordering::Relaxed),
            targets_failed: self.targets_failed.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            matches_found: self.matches_found.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// Logs the current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Fetch stats:\n\
             Targets dispatched: {}\n\
             Targets succeeded/failed: {}/{}\n\
             Bytes read: {}\n\
             Matches found: {}\n\
             Pattern cache hits/misses: {}/{}",
            stats.targets_dispatched,
            stats.targets_succeeded,
            stats.targets_failed,
            stats.bytes_read,
            stats.matches_found,
            stats.cache_hits,
            stats.cache_misses
        );
    }
}

impl Default for FetchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`FetchMetrics`]
#[derive(Debug, Clone, Copy)]
pub struct FetchStats {
    pub targets_dispatched: u64,
    pub targets_succeeded: u64,
    pub targets_failed: u64,
    pub bytes_read: u64,
    pub matches_found: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tracking() {
        let metrics = FetchMetrics::new();

        metrics.record_dispatch();
        metrics.record_dispatch();
        metrics.record_dispatch();
        metrics.record_success(1000, 3);
        metrics.record_success(500, 0);
        metrics.record_failure();

        let stats = metrics.get_stats();
        assert_eq!(stats.targets_dispatched, 3);
        assert_eq!(stats.targets_succeeded, 2);
        assert_eq!(stats.targets_failed, 1);
        assert_eq!(stats.bytes_read, 1500);
        assert_eq!(stats.matches_found, 3);
    }

    #[test]
    fn test_cache_metrics() {
        let metrics = FetchMetrics::new();

        metrics.record_cache_operation(true);
        metrics.record_cache_operation(false);
        metrics.record_cache_operation(false);
        let stats = metrics.get_stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = FetchMetrics::new();
        let worker_view = metrics.clone();

        worker_view.record_failure();
        assert_eq!(metrics.get_stats().targets_failed, 1);
    }
}
