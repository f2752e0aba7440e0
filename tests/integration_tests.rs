//! End-to-end crawl runs driven by a canned-page fetcher.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::watch;
use wikicrawl::network::FetchFuture;
use wikicrawl::{
    CrawlConfig, CrawlMetrics, Crawler, FetchError, FetchedPage, FrontierStats, FrontierStore,
    LinkWriter, PageFetcher, SharedMetrics,
};

/// Serves canned pages and records the order fetches started in.
struct SiteFixture {
    pages: HashMap<String, String>,
    fetch_log: Mutex<Vec<String>>,
}

impl SiteFixture {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            fetch_log: Mutex::new(Vec::new()),
        }
    }

    fn fetched(&self) -> Vec<String> {
        self.fetch_log.lock().clone()
    }
}

impl PageFetcher for SiteFixture {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            self.fetch_log.lock().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => Ok(FetchedPage {
                    body: body.clone(),
                    status: 200,
                }),
                None => Err(FetchError::Status(500)),
            }
        })
    }
}

fn wiki_page(topics: &[&str]) -> String {
    let anchors: String = topics
        .iter()
        .map(|topic| format!(r#"<a href="/wiki/{topic}">{topic}</a>"#))
        .collect();
    format!("<html><body>{anchors}</body></html>")
}

fn wiki_url(topic: &str) -> String {
    format!("https://site.example/wiki/{topic}")
}

fn test_config(max_depth: u32) -> CrawlConfig {
    CrawlConfig {
        max_depth,
        site_domain: "site.example".to_string(),
        batch_size: 100,
        queue_wait: Duration::from_millis(50),
        jitter_ms: None,
        timeout: None,
        fetch_retries: 0,
    }
}

fn build_crawler(
    config: CrawlConfig,
    seed: &str,
    store: &Arc<FrontierStore>,
    fixture: &Arc<SiteFixture>,
) -> Crawler {
    let metrics: SharedMetrics = Arc::new(CrawlMetrics::new());
    let (_tx, rx) = watch::channel(false);
    Crawler::new(
        config,
        seed.to_string(),
        Arc::clone(store),
        Arc::clone(fixture) as Arc<dyn PageFetcher>,
        metrics,
        rx,
    )
}

fn level_counts(stats: &FrontierStats, level: u32) -> (u64, u64) {
    stats
        .levels
        .iter()
        .find(|l| l.level == level)
        .map(|l| (l.total, l.processed))
        .unwrap_or((0, 0))
}

fn three_level_site() -> Arc<SiteFixture> {
    Arc::new(SiteFixture::new(&[
        (&wiki_url("Seed"), &wiki_page(&["A", "B", "C"])),
        (&wiki_url("A"), &wiki_page(&["A1", "A2"])),
        (&wiki_url("B"), &wiki_page(&["B1", "B2"])),
        (&wiki_url("C"), &wiki_page(&["C1", "C2"])),
    ]))
}

#[tokio::test]
async fn crawl_respects_level_order_and_depth_bound() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FrontierStore::open(dir.path().join("links.db")).unwrap());
    let fixture = three_level_site();

    let crawler = build_crawler(test_config(2), &wiki_url("Seed"), &store, &fixture);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.levels, 2);
    assert_eq!(summary.processed(), 4);
    assert_eq!(summary.failed, 0);

    // One seed row, three level-1 rows, six level-2 candidates left for a
    // deeper run.
    let stats = store.stats().unwrap();
    assert_eq!(level_counts(&stats, 0), (1, 1));
    assert_eq!(level_counts(&stats, 1), (3, 3));
    assert_eq!(level_counts(&stats, 2), (6, 0));
    assert_eq!(stats.total(), 10);

    // No level-1 fetch starts before the seed completes, and level 2 is
    // never fetched at all.
    let fetched = fixture.fetched();
    assert_eq!(fetched.len(), 4);
    assert_eq!(fetched[0], wiki_url("Seed"));
    let level1: HashSet<String> = fetched[1..].iter().cloned().collect();
    let expected: HashSet<String> = ["A", "B", "C"].iter().map(|t| wiki_url(t)).collect();
    assert_eq!(level1, expected);
}

#[tokio::test]
async fn rerun_resumes_without_refetching_processed_urls() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("links.db");

    {
        let store = Arc::new(FrontierStore::open(&db_path).unwrap());
        let fixture = three_level_site();
        let crawler = build_crawler(test_config(2), &wiki_url("Seed"), &store, &fixture);
        crawler.run().await.unwrap();
        assert_eq!(fixture.fetched().len(), 4);
    }

    // Second run over the same database at the same depth: every reachable
    // row is already processed, so nothing is fetched and nothing changes.
    let store = Arc::new(FrontierStore::open(&db_path).unwrap());
    let fixture = three_level_site();
    let crawler = build_crawler(test_config(2), &wiki_url("Seed"), &store, &fixture);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.processed(), 0);
    assert!(fixture.fetched().is_empty());

    let seed_record = store.lookup(&wiki_url("Seed")).unwrap().unwrap();
    assert_eq!(seed_record.level, 0);
    assert!(seed_record.processed);
    assert_eq!(store.stats().unwrap().total(), 10);
}

#[tokio::test]
async fn deeper_rerun_picks_up_where_the_last_one_stopped() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("links.db");

    {
        let store = Arc::new(FrontierStore::open(&db_path).unwrap());
        let fixture = three_level_site();
        let crawler = build_crawler(test_config(1), &wiki_url("Seed"), &store, &fixture);
        crawler.run().await.unwrap();
        // Depth 1 processed only the seed.
        assert_eq!(fixture.fetched().len(), 1);
    }

    let store = Arc::new(FrontierStore::open(&db_path).unwrap());
    let fixture = three_level_site();
    let crawler = build_crawler(test_config(2), &wiki_url("Seed"), &store, &fixture);
    let summary = crawler.run().await.unwrap();

    // The second run skips the seed and processes only level 1.
    assert_eq!(summary.processed(), 3);
    let fetched: HashSet<String> = fixture.fetched().into_iter().collect();
    let expected: HashSet<String> = ["A", "B", "C"].iter().map(|t| wiki_url(t)).collect();
    assert_eq!(fetched, expected);
}

#[tokio::test]
async fn failed_fetches_are_marked_processed_and_counted() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FrontierStore::open(dir.path().join("links.db")).unwrap());

    // Bad is linked but never served; its fetch fails with a 500.
    let fixture = Arc::new(SiteFixture::new(&[
        (&wiki_url("Seed"), &wiki_page(&["Good", "Bad"])),
        (&wiki_url("Good"), &wiki_page(&["Deeper"])),
    ]));

    let crawler = build_crawler(test_config(2), &wiki_url("Seed"), &store, &fixture);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    // The failure still concludes the URL, so a rerun will not retry it.
    let bad = store.lookup(&wiki_url("Bad")).unwrap().unwrap();
    assert!(bad.processed);

    let stats = store.stats().unwrap();
    assert_eq!(level_counts(&stats, 2), (1, 0));
}

#[tokio::test]
async fn out_of_scope_and_special_links_never_reach_the_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FrontierStore::open(dir.path().join("links.db")).unwrap());

    let body = concat!(
        r#"<a href="/wiki/Kept">kept</a>"#,
        r#"<a href="https://other.example/wiki/Foreign">foreign</a>"#,
        r#"<a href="/wiki/Category:Stuff">category</a>"#,
        r#"<a href="/wiki/Doc.pdf">pdf</a>"#,
        r#"<a href="/wiki/Kept?action=edit">edit</a>"#,
        r##"<a href="#section">anchor</a>"##,
    );
    let fixture = Arc::new(SiteFixture::new(&[(&wiki_url("Seed"), body)]));

    let crawler = build_crawler(test_config(1), &wiki_url("Seed"), &store, &fixture);
    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.processed(), 1);
    let stats = store.stats().unwrap();
    assert_eq!(level_counts(&stats, 1), (1, 0));
    assert!(store.lookup(&wiki_url("Kept")).unwrap().is_some());
    assert!(store
        .lookup("https://other.example/wiki/Foreign")
        .unwrap()
        .is_none());
}

#[test]
fn writer_persists_large_bursts_exactly_once() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FrontierStore::open(dir.path().join("links.db")).unwrap());
    let metrics: SharedMetrics = Arc::new(CrawlMetrics::new());
    let writer = LinkWriter::spawn(Arc::clone(&store), Arc::clone(&metrics));

    // 2500 links span multiple commit batches at the default cap.
    writer
        .enqueue_all((0..2500).map(|i| wiki_url(&format!("Page_{i}"))), 1)
        .unwrap();
    // Resubmitting a slice of them at another level adds nothing.
    writer
        .enqueue_all((0..100).map(|i| wiki_url(&format!("Page_{i}"))), 7)
        .unwrap();
    writer.shutdown();

    let stats = store.stats().unwrap();
    assert_eq!(stats.total(), 2500);
    assert_eq!(level_counts(&stats, 1).0, 2500);
    assert_eq!(level_counts(&stats, 7).0, 0);
    assert_eq!(metrics.rows_inserted.get(), 2500);
    assert_eq!(metrics.batches_dropped.get(), 0);
}

#[test]
fn store_state_survives_reopening() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("links.db");

    {
        let store = FrontierStore::open(&db_path).unwrap();
        store
            .insert_batch(&[(wiki_url("A"), 0), (wiki_url("B"), 1)])
            .unwrap();
        store.mark_processed(&wiki_url("A")).unwrap();
    }

    let store = FrontierStore::open(&db_path).unwrap();
    // A keeps its flag, and re-inserting it deeper changes nothing.
    store.insert_batch(&[(wiki_url("A"), 9)]).unwrap();
    let record = store.lookup(&wiki_url("A")).unwrap().unwrap();
    assert_eq!(record.level, 0);
    assert!(record.processed);
    assert_eq!(store.unprocessed(1).unwrap(), vec![wiki_url("B")]);
}
