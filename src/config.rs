// Crawl-wide default constants

pub struct Config;

impl Config {
    // Frontier write batching
    pub const BATCH_SIZE: usize = 1000;
    pub const QUEUE_WAIT_SECS: u64 = 5;

    // Writer commit retry policy
    pub const COMMIT_RETRY_LIMIT: u32 = 5;
    pub const COMMIT_RETRY_BASE_MS: u64 = 100;
    pub const COMMIT_RETRY_MAX_MS: u64 = 5_000;

    // Fetch pool width: max(WORKER_FLOOR, WORKER_BASE - WORKER_STEP * level)
    pub const WORKER_BASE: usize = 20;
    pub const WORKER_STEP: usize = 2;
    pub const WORKER_FLOOR: usize = 5;

    // Per-request jitter window
    pub const JITTER_MIN_MS: u64 = 500;
    pub const JITTER_MAX_MS: u64 = 1500;

    // Defaults for caller-supplied settings
    pub const DEFAULT_SITE_DOMAIN: &'static str = "wikipedia.org";
    pub const DEFAULT_DB_PATH: &'static str = "links.db";
    pub const DEFAULT_MAX_DEPTH: u32 = 6;
}
