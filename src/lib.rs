pub mod cli;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetch_pool;
pub mod frontier;
pub mod logging;
pub mod metrics;
pub mod network;
pub mod topics;
pub mod url_utils;
pub mod writer;

// Re-export main types for library usage
pub use crawler::{CrawlConfig, CrawlError, CrawlSummary, Crawler};
pub use extract::{extract_links, CrawlScope};
pub use fetch_pool::{FetchPool, LevelOutcome};
pub use frontier::{FrontierError, FrontierStats, FrontierStore, LevelStats, LinkRecord};
pub use metrics::{CrawlMetrics, SharedMetrics};
pub use network::{FetchError, FetchedPage, HttpClient, PageFetcher};
pub use topics::TopicSet;
pub use writer::{LinkWriter, WriterClosed};
