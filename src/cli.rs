//! Command-line interface for the crawler binary.

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "wikicrawl")]
#[command(about = "Breadth-first wiki crawler with a persistent, resumable frontier")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl outward from a seed URL, one BFS level at a time.
    Crawl {
        #[arg(short, long, help = "Seed URL the crawl starts from")]
        seed: String,

        #[arg(
            short,
            long,
            default_value_t = Config::DEFAULT_MAX_DEPTH,
            help = "Number of BFS levels to process"
        )]
        max_depth: u32,

        #[arg(
            short,
            long,
            default_value = Config::DEFAULT_DB_PATH,
            help = "Path of the SQLite frontier database"
        )]
        db_path: String,

        #[arg(
            long,
            default_value = Config::DEFAULT_SITE_DOMAIN,
            help = "Site family the crawl stays inside (the domain and its subdomains)"
        )]
        site_domain: String,

        #[arg(
            long,
            default_value_t = Config::BATCH_SIZE,
            help = "Links per frontier write batch"
        )]
        batch_size: usize,

        #[arg(
            long,
            default_value_t = Config::QUEUE_WAIT_SECS,
            help = "Seconds the writer waits for the first queued link"
        )]
        queue_wait_secs: u64,

        #[arg(
            long,
            help = "Total per-request timeout in seconds (unlimited when absent)"
        )]
        timeout_secs: Option<u64>,

        #[arg(
            long,
            default_value_t = 0,
            help = "Extra attempts for transient fetch errors"
        )]
        fetch_retries: u32,

        #[arg(
            long,
            default_value_t = Config::JITTER_MIN_MS,
            help = "Lower bound of the randomized pre-request delay, in milliseconds"
        )]
        jitter_min_ms: u64,

        #[arg(
            long,
            default_value_t = Config::JITTER_MAX_MS,
            help = "Upper bound of the randomized pre-request delay, in milliseconds"
        )]
        jitter_max_ms: u64,

        #[arg(long, help = "Disable the randomized delay before each request")]
        no_jitter: bool,

        #[arg(long, help = "Also write daily-rolling log files to this directory")]
        log_dir: Option<String>,
    },

    /// Print per-level totals from an existing frontier database.
    Stats {
        #[arg(
            short,
            long,
            default_value = Config::DEFAULT_DB_PATH,
            help = "Path of the SQLite frontier database"
        )]
        db_path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn crawl_with_only_a_seed_uses_defaults() {
        let cli = Cli::try_parse_from([
            "wikicrawl",
            "crawl",
            "--seed",
            "https://en.wikipedia.org/wiki/Petroleum",
        ])
        .unwrap();

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
                assert_eq!(seed, "https://en.wikipedia.org/wiki/Petroleum");
                assert_eq!(max_depth, Config::DEFAULT_MAX_DEPTH);
                assert_eq!(db_path, Config::DEFAULT_DB_PATH);
                assert_eq!(site_domain, Config::DEFAULT_SITE_DOMAIN);
                assert_eq!(batch_size, Config::BATCH_SIZE);
                assert_eq!(queue_wait_secs, Config::QUEUE_WAIT_SECS);
                assert_eq!(timeout_secs, None);
                assert_eq!(fetch_retries, 0);
                assert_eq!(jitter_min_ms, Config::JITTER_MIN_MS);
                assert_eq!(jitter_max_ms, Config::JITTER_MAX_MS);
                assert!(!no_jitter);
                assert_eq!(log_dir, None);
            }
            other => panic!("expected crawl command, got {other:?}"),
        }
    }

    #[test]
    fn crawl_accepts_every_option() {
        let cli = Cli::try_parse_from([
            "wikicrawl",
            "crawl",
            "-s",
            "https://de.wikipedia.org/wiki/Erdöl",
            "-m",
            "3",
            "-d",
            "/tmp/erdoel.db",
            "--site-domain",
            "wikipedia.org",
            "--batch-size",
            "500",
            "--queue-wait-secs",
            "2",
            "--timeout-secs",
            "30",
            "--fetch-retries",
            "2",
            "--jitter-min-ms",
            "100",
            "--jitter-max-ms",
            "200",
            "--no-jitter",
            "--log-dir",
            "/tmp/logs",
        ])
        .unwrap();

        match cli.command {
            Commands::Crawl {
                max_depth,
                db_path,
                batch_size,
                queue_wait_secs,
                timeout_secs,
                fetch_retries,
                jitter_min_ms,
                jitter_max_ms,
                no_jitter,
                log_dir,
                ..
            } => {
                assert_eq!(max_depth, 3);
                assert_eq!(db_path, "/tmp/erdoel.db");
                assert_eq!(batch_size, 500);
                assert_eq!(queue_wait_secs, 2);
                assert_eq!(timeout_secs, Some(30));
                assert_eq!(fetch_retries, 2);
                assert_eq!(jitter_min_ms, 100);
                assert_eq!(jitter_max_ms, 200);
                assert!(no_jitter);
                assert_eq!(log_dir, Some("/tmp/logs".to_string()));
            }
            other => panic!("expected crawl command, got {other:?}"),
        }
    }

    #[test]
    fn crawl_requires_a_seed() {
        let err = Cli::try_parse_from(["wikicrawl", "crawl"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn stats_defaults_to_the_standard_db_path() {
        let cli = Cli::try_parse_from(["wikicrawl", "stats"]).unwrap();
        match cli.command {
            Commands::Stats { db_path } => assert_eq!(db_path, Config::DEFAULT_DB_PATH),
            other => panic!("expected stats command, got {other:?}"),
        }
    }

    #[test]
    fn unknown_subcommands_are_rejected() {
        let err = Cli::try_parse_from(["wikicrawl", "export"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn max_depth_must_be_numeric() {
        let err = Cli::try_parse_from([
            "wikicrawl",
            "crawl",
            "--seed",
            "https://en.wikipedia.org/wiki/Petroleum",
            "--max-depth",
            "six",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }
}
