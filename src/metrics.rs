use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Atomic counter for lock-free updates from concurrent fetch tasks.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Run-wide counters shared by the fetch pool, the writer thread, and the
/// orchestrator. All fields are independently updatable without locking.
#[derive(Debug, Default)]
pub struct CrawlMetrics {
    pub pages_fetched: Counter,
    pub fetch_failures: Counter,
    pub links_discovered: Counter,
    pub links_enqueued: Counter,
    pub rows_inserted: Counter,
    pub batches_committed: Counter,
    pub batches_dropped: Counter,
    pub commit_retries: Counter,
}

impl CrawlMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

pub type SharedMetrics = Arc<CrawlMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments() {
        let counter = Counter::new();
        counter.inc();
        counter.inc();
        counter.add(3);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn metrics_start_at_zero() {
        let metrics = CrawlMetrics::new();
        assert_eq!(metrics.pages_fetched.get(), 0);
        assert_eq!(metrics.batches_dropped.get(), 0);
    }

    #[test]
    fn metrics_shared_across_threads() {
        let metrics: SharedMetrics = Arc::new(CrawlMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.pages_fetched.inc();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.pages_fetched.get(), 400);
    }
}
