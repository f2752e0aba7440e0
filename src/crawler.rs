//! Level-synchronous crawl orchestration.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::extract::CrawlScope;
use crate::fetch_pool::FetchPool;
use crate::frontier::{FrontierError, FrontierStore};
use crate::metrics::{CrawlMetrics, SharedMetrics};
use crate::network::PageFetcher;
use crate::topics::TopicSet;
use crate::url_utils;
use crate::writer::{LinkWriter, WriterClosed};

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid seed URL: {0}")]
    InvalidSeed(#[from] url::ParseError),

    #[error(transparent)]
    Frontier(#[from] FrontierError),

    #[error("link writer stopped before the crawl finished")]
    Writer(#[from] WriterClosed),
}

/// Tunables for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Number of BFS levels to process; discoveries at this depth are
    /// stored but not fetched.
    pub max_depth: u32,
    pub site_domain: String,
    pub batch_size: usize,
    pub queue_wait: Duration,
    /// Randomized pre-request delay bounds; `None` disables the delay.
    pub jitter_ms: Option<(u64, u64)>,
    pub timeout: Option<Duration>,
    pub fetch_retries: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: Config::DEFAULT_MAX_DEPTH,
            site_domain: Config::DEFAULT_SITE_DOMAIN.to_string(),
            batch_size: Config::BATCH_SIZE,
            queue_wait: Duration::from_secs(Config::QUEUE_WAIT_SECS),
            jitter_ms: Some((Config::JITTER_MIN_MS, Config::JITTER_MAX_MS)),
            timeout: None,
            fetch_retries: 0,
        }
    }
}

/// Drives the BFS loop.
///
/// Per level: read the unprocessed URLs, fetch them with a bounded pool,
/// mark every attempted URL processed, queue the discoveries one level
/// deeper, and flush the writer. The flush is the barrier that makes a
/// level's discoveries visible before the next level's read, so levels
/// never bleed into each other.
pub struct Crawler {
    config: CrawlConfig,
    seed_url: String,
    store: Arc<FrontierStore>,
    pool: FetchPool,
    metrics: SharedMetrics,
    shutdown: watch::Receiver<bool>,
}

impl Crawler {
    pub fn new(
        config: CrawlConfig,
        seed_url: String,
        store: Arc<FrontierStore>,
        fetcher: Arc<dyn PageFetcher>,
        metrics: SharedMetrics,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let scope = CrawlScope::new(config.site_domain.clone());
        let topics = Arc::new(TopicSet::new());
        let pool = FetchPool::new(
            fetcher,
            scope,
            topics,
            Arc::clone(&metrics),
            config.jitter_ms,
        );
        Self {
            config,
            seed_url,
            store,
            pool,
            metrics,
            shutdown,
        }
    }

    /// Run the crawl to completion and return the run totals.
    pub async fn run(self) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();

        Url::parse(&self.seed_url)?;
        // The store keeps everything percent-decoded.
        let seed = url_utils::decode_url(&self.seed_url);

        let writer = LinkWriter::spawn_with(
            Arc::clone(&self.store),
            Arc::clone(&self.metrics),
            self.config.batch_size,
            self.config.queue_wait,
        );

        // Seeding an already-populated store is a no-op thanks to the
        // primary key, which is what makes reruns resume instead of restart.
        writer.enqueue(seed, 0)?;
        writer.flush().await?;

        let mut levels = 0u32;
        for level in 0..self.config.max_depth {
            if *self.shutdown.borrow() {
                info!(level, "shutdown requested, stopping before this level");
                break;
            }
            self.process_level(level, &writer).await?;
            levels += 1;
        }

        // Drain phase: close the queue and wait until every queued link has
        // been committed, so nothing discovered is lost.
        writer.shutdown();

        let summary = CrawlSummary::collect(&self.metrics, levels, started.elapsed());
        info!(
            levels = summary.levels,
            processed = summary.processed(),
            failed = summary.failed,
            rows_inserted = summary.rows_inserted,
            "crawl finished"
        );
        Ok(summary)
    }

    #[tracing::instrument(skip(self, writer))]
    async fn process_level(&self, level: u32, writer: &LinkWriter) -> Result<(), CrawlError> {
        let urls = self.store.unprocessed(level)?;
        if urls.is_empty() {
            // An empty level is not an error; the loop just advances.
            debug!("no unprocessed URLs at this level");
            return Ok(());
        }

        info!(
            urls = urls.len(),
            workers = FetchPool::width_for_level(level),
            "processing level"
        );

        let outcome = self.pool.run(level, urls.clone()).await;

        // Success and failure both conclude a URL for this run; failed URLs
        // are counted rather than retried forever.
        for url in &urls {
            self.store.mark_processed(url)?;
        }

        let discovered = outcome.discovered.len();
        if discovered > 0 {
            writer.enqueue_all(outcome.discovered, level + 1)?;
        }
        // Barrier: the ack guarantees the next level's read sees these rows.
        writer.flush().await?;

        info!(
            attempted = urls.len(),
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            discovered,
            "level complete"
        );
        Ok(())
    }
}

/// End-of-run totals, assembled from the shared metrics.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub levels: u32,
    pub succeeded: u64,
    pub failed: u64,
    pub discovered: u64,
    pub rows_inserted: u64,
    pub batches_committed: u64,
    pub batches_dropped: u64,
    pub duration: Duration,
}

impl CrawlSummary {
    fn collect(metrics: &CrawlMetrics, levels: u32, duration: Duration) -> Self {
        Self {
            levels,
            succeeded: metrics.pages_fetched.get(),
            failed: metrics.fetch_failures.get(),
            discovered: metrics.links_discovered.get(),
            rows_inserted: metrics.rows_inserted.get(),
            batches_committed: metrics.batches_committed.get(),
            batches_dropped: metrics.batches_dropped.get(),
            duration,
        }
    }

    /// URLs whose fetch attempt concluded, successfully or not.
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} levels, {} pages processed ({} failed), {} links discovered, \
             {} rows written in {} batches ({} dropped), {:.1}s",
            self.levels,
            self.processed(),
            self.failed,
            self.discovered,
            self.rows_inserted,
            self.batches_committed,
            self.batches_dropped,
            self.duration.as_secs_f64()
        )
    }
}
