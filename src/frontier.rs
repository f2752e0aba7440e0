//! SQLite-backed persistent frontier.

use std::fmt;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("frontier database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// One persisted frontier row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub url: String,
    pub level: u32,
    pub processed: bool,
}

/// Durable table of every URL the crawl has discovered.
///
/// The URL is the primary key, so a URL exists at most once for the lifetime
/// of the database and keeps the level of its first discovery. A single
/// connection behind a mutex serializes all access; the batched writer is
/// the only steady-state writer, so contention stays low.
pub struct FrontierStore {
    conn: Mutex<Connection>,
}

impl FrontierStore {
    /// Open the database at `path`, creating the schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FrontierError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store with the same schema.
    pub fn open_in_memory() -> Result<Self, FrontierError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), FrontierError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS links (
                url TEXT PRIMARY KEY,
                level INTEGER,
                processed INTEGER DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_links_level_processed
                ON links (level, processed);",
        )?;
        Ok(())
    }

    /// Insert `(url, level)` rows in one transaction, ignoring URLs that are
    /// already stored. Returns how many rows were actually inserted.
    pub fn insert_batch(&self, rows: &[(String, u32)]) -> Result<usize, FrontierError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO links (url, level, processed) VALUES (?1, ?2, 0)",
            )?;
            for (url, level) in rows {
                inserted += stmt.execute(params![url, level])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Every URL at `level` whose fetch has not concluded yet. Read once per
    /// level by the orchestrator; row order is not significant.
    pub fn unprocessed(&self, level: u32) -> Result<Vec<String>, FrontierError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT url FROM links WHERE level = ?1 AND processed = 0")?;
        let urls = stmt
            .query_map(params![level], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    /// Flag one URL as processed. Idempotent, and the flag never reverts.
    pub fn mark_processed(&self, url: &str) -> Result<(), FrontierError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE links SET processed = 1 WHERE url = ?1", params![url])?;
        Ok(())
    }

    /// Look up a single stored row.
    pub fn lookup(&self, url: &str) -> Result<Option<LinkRecord>, FrontierError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT url, level, processed FROM links WHERE url = ?1")?;
        let row = stmt.query_row(params![url], |row| {
            Ok(LinkRecord {
                url: row.get(0)?,
                level: row.get(1)?,
                processed: row.get(2)?,
            })
        });
        match row {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Per-level totals over the whole table.
    pub fn stats(&self) -> Result<FrontierStats, FrontierError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT level, COUNT(*), COALESCE(SUM(processed), 0)
             FROM links GROUP BY level ORDER BY level",
        )?;
        let levels = stmt
            .query_map([], |row| {
                Ok(LevelStats {
                    level: row.get(0)?,
                    total: row.get(1)?,
                    processed: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FrontierStats { levels })
    }
}

/// Totals for one BFS level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelStats {
    pub level: u32,
    pub total: u64,
    pub processed: u64,
}

/// Snapshot of the stored frontier, one entry per level.
#[derive(Debug, Clone)]
pub struct FrontierStats {
    pub levels: Vec<LevelStats>,
}

impl FrontierStats {
    pub fn total(&self) -> u64 {
        self.levels.iter().map(|l| l.total).sum()
    }

    pub fn total_processed(&self) -> u64 {
        self.levels.iter().map(|l| l.processed).sum()
    }
}

impl fmt::Display for FrontierStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in &self.levels {
            writeln!(
                f,
                "level {:>2}: {:>8} stored, {:>8} processed",
                level.level, level.total, level.processed
            )?;
        }
        write!(
            f,
            "total:    {:>8} stored, {:>8} processed",
            self.total(),
            self.total_processed()
        )
    }
}
