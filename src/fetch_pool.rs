//! Bounded-concurrency fetching for one BFS level.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::Config;
use crate::extract::{extract_links, CrawlScope};
use crate::metrics::SharedMetrics;
use crate::network::{FetchError, PageFetcher};
use crate::topics::TopicSet;

/// Merged result of one level's fetches.
#[derive(Debug, Default)]
pub struct LevelOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// Union of every in-scope link discovered at this level.
    pub discovered: HashSet<String>,
}

struct UrlOutcome {
    url: String,
    result: Result<HashSet<String>, FetchError>,
}

/// Runs a level's URLs through the fetcher with bounded concurrency.
///
/// Each URL becomes a task gated by a semaphore sized for the level, so at
/// most `width_for_level` requests are in flight at once. `run` returns
/// only after every task has completed; levels never overlap.
pub struct FetchPool {
    fetcher: Arc<dyn PageFetcher>,
    scope: CrawlScope,
    topics: Arc<TopicSet>,
    metrics: SharedMetrics,
    jitter_ms: Option<(u64, u64)>,
}

impl FetchPool {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        scope: CrawlScope,
        topics: Arc<TopicSet>,
        metrics: SharedMetrics,
        jitter_ms: Option<(u64, u64)>,
    ) -> Self {
        Self {
            fetcher,
            scope,
            topics,
            metrics,
            jitter_ms,
        }
    }

    /// Worker count for a level. Fan-out tapers with depth, since deeper
    /// levels carry far more URLs, and never drops below the floor.
    pub fn width_for_level(level: u32) -> usize {
        Config::WORKER_BASE
            .saturating_sub(Config::WORKER_STEP.saturating_mul(level as usize))
            .max(Config::WORKER_FLOOR)
    }

    /// Fetch every URL in `urls` and merge the extracted links. Failures are
    /// logged and counted; they contribute no links.
    pub async fn run(&self, level: u32, urls: Vec<String>) -> LevelOutcome {
        let semaphore = Arc::new(Semaphore::new(Self::width_for_level(level)));
        let mut tasks = JoinSet::new();

        for url in urls {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let scope = self.scope.clone();
            let topics = Arc::clone(&self.topics);
            let jitter_ms = self.jitter_ms;

            tasks.spawn(async move {
                // The semaphore is never closed while the pool is running.
                let _permit = semaphore.acquire_owned().await.ok();
                fetch_one(&*fetcher, &scope, &topics, jitter_ms, url).await
            });
        }

        let mut outcome = LevelOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(UrlOutcome {
                    url,
                    result: Ok(links),
                }) => {
                    outcome.succeeded += 1;
                    self.metrics.pages_fetched.inc();
                    self.metrics.links_discovered.add(links.len() as u64);
                    debug!(%url, links = links.len(), "fetched page");
                    outcome.discovered.extend(links);
                }
                Ok(UrlOutcome {
                    url,
                    result: Err(e),
                }) => {
                    outcome.failed += 1;
                    self.metrics.fetch_failures.inc();
                    warn!(%url, error = %e, "fetch failed");
                }
                Err(e) => {
                    // A panicked task still counts as a concluded attempt.
                    outcome.failed += 1;
                    self.metrics.fetch_failures.inc();
                    error!(error = %e, "fetch task did not complete");
                }
            }
        }
        outcome
    }
}

async fn fetch_one(
    fetcher: &dyn PageFetcher,
    scope: &CrawlScope,
    topics: &TopicSet,
    jitter_ms: Option<(u64, u64)>,
    url: String,
) -> UrlOutcome {
    if let Some((min_ms, max_ms)) = jitter_ms {
        // Desynchronizes workers so requests do not land in bursts. The rng
        // handle cannot be held across the await.
        let delay = if min_ms >= max_ms {
            min_ms
        } else {
            rand::thread_rng().gen_range(min_ms..=max_ms)
        };
        sleep(Duration::from_millis(delay)).await;
    }

    let result = match fetcher.fetch(&url).await {
        Ok(page) => match Url::parse(&url) {
            Ok(base) => Ok(extract_links(&page.body, &base, scope, topics)),
            Err(e) => Err(FetchError::InvalidUrl(e)),
        },
        Err(e) => Err(e),
    };

    UrlOutcome { url, result }
}
