use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use wikicrawl::cli::{Cli, Commands};
use wikicrawl::crawler::{CrawlConfig, CrawlError, Crawler};
use wikicrawl::frontier::{FrontierError, FrontierStore};
use wikicrawl::logging;
use wikicrawl::metrics::CrawlMetrics;
use wikicrawl::network::{FetchError, HttpClient, PageFetcher};

#[derive(Error, Debug)]
enum MainError {
    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Frontier(#[from] FrontierError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            seed,
            max_depth,
            db_path,
            site_domain,
            batch_size,
            queue_wait_secs,
            timeout_secs,
            fetch_retries,
            jitter_min_ms,
            jitter_max_ms,
            no_jitter,
            log_dir,
        } => {
            logging::init(log_dir.as_deref().map(Path::new))
                .map_err(|e| MainError::Logging(e.to_string()))?;

            let config = CrawlConfig {
                max_depth,
                site_domain,
                batch_size,
                queue_wait: Duration::from_secs(queue_wait_secs),
                jitter_ms: if no_jitter {
                    None
                } else {
                    Some((jitter_min_ms, jitter_max_ms))
                },
                timeout: timeout_secs.map(Duration::from_secs),
                fetch_retries,
            };

            run_crawl(config, seed, &db_path).await
        }
        Commands::Stats { db_path } => run_stats(&db_path),
    }
}

async fn run_crawl(config: CrawlConfig, seed: String, db_path: &str) -> Result<(), MainError> {
    info!(%seed, max_depth = config.max_depth, db_path, "starting crawl");

    let store = Arc::new(FrontierStore::open(db_path)?);
    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpClient::new(config.timeout, config.fetch_retries)?);
    let metrics = Arc::new(CrawlMetrics::new());

    // Ctrl+C finishes the level in flight, drains the writer, and leaves the
    // database ready for a resumed run.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing the current level");
            let _ = shutdown_tx.send(true);
        }
    });

    let crawler = Crawler::new(config, seed, store, fetcher, metrics, shutdown_rx);
    let summary = crawler.run().await?;
    println!("{summary}");

    Ok(())
}

fn run_stats(db_path: &str) -> Result<(), MainError> {
    let store = FrontierStore::open(db_path)?;
    println!("{}", store.stats()?);
    Ok(())
}
