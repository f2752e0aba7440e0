//! Background thread that batches frontier inserts.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use flume::{Receiver, Sender};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::frontier::FrontierStore;
use crate::metrics::{CrawlMetrics, SharedMetrics};

/// Returned when the writer thread is no longer accepting links.
#[derive(Debug, Error)]
#[error("link writer is not running")]
pub struct WriterClosed;

enum WriterMessage {
    Link { url: String, level: u32 },
    /// Commit everything drained so far, then ack.
    Flush(Sender<()>),
}

/// Handle to the dedicated writer thread.
///
/// Discovered `(url, level)` pairs go through an unbounded queue; one
/// background thread drains them in bounded batches and commits each batch
/// as a single transaction, so fetch workers never block on individual
/// database round-trips. Dropping the handle (or calling [`shutdown`])
/// closes the queue; the thread keeps draining until it is empty, so
/// nothing enqueued beforehand is lost.
///
/// [`shutdown`]: LinkWriter::shutdown
pub struct LinkWriter {
    tx: Option<Sender<WriterMessage>>,
    handle: Option<thread::JoinHandle<()>>,
    metrics: SharedMetrics,
}

impl LinkWriter {
    /// Spawn the writer thread with the default batch size and queue wait.
    pub fn spawn(store: Arc<FrontierStore>, metrics: SharedMetrics) -> Self {
        Self::spawn_with(
            store,
            metrics,
            Config::BATCH_SIZE,
            Duration::from_secs(Config::QUEUE_WAIT_SECS),
        )
    }

    /// Spawn with explicit batching parameters.
    pub fn spawn_with(
        store: Arc<FrontierStore>,
        metrics: SharedMetrics,
        batch_size: usize,
        queue_wait: Duration,
    ) -> Self {
        let (tx, rx) = flume::unbounded();
        let thread_metrics = Arc::clone(&metrics);
        let handle = thread::Builder::new()
            .name("link-writer".into())
            .spawn(move || Self::writer_loop(store, thread_metrics, batch_size, queue_wait, rx));

        match handle {
            Ok(handle) => Self {
                tx: Some(tx),
                handle: Some(handle),
                metrics,
            },
            Err(e) => {
                // Without the thread the queue has no consumer; leave the
                // handle closed so callers see WriterClosed immediately.
                error!(error = %e, "failed to spawn link writer thread");
                Self {
                    tx: None,
                    handle: None,
                    metrics,
                }
            }
        }
    }

    /// Queue one discovered URL for insertion at `level`.
    pub fn enqueue(&self, url: String, level: u32) -> Result<(), WriterClosed> {
        let tx = self.tx.as_ref().ok_or(WriterClosed)?;
        tx.send(WriterMessage::Link { url, level })
            .map_err(|_| WriterClosed)?;
        self.metrics.links_enqueued.inc();
        Ok(())
    }

    /// Queue every URL in `urls` for insertion at `level`.
    pub fn enqueue_all<I>(&self, urls: I, level: u32) -> Result<(), WriterClosed>
    where
        I: IntoIterator<Item = String>,
    {
        for url in urls {
            self.enqueue(url, level)?;
        }
        Ok(())
    }

    /// Wait until everything queued before this call has been committed.
    pub async fn flush(&self) -> Result<(), WriterClosed> {
        let tx = self.tx.as_ref().ok_or(WriterClosed)?;
        let (ack_tx, ack_rx) = flume::bounded(1);
        tx.send(WriterMessage::Flush(ack_tx))
            .map_err(|_| WriterClosed)?;
        ack_rx.recv_async().await.map_err(|_| WriterClosed)
    }

    /// Close the queue, drain what remains, and join the thread.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        // Dropping the sender is the stop signal the loop watches for.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn writer_loop(
        store: Arc<FrontierStore>,
        metrics: SharedMetrics,
        batch_size: usize,
        queue_wait: Duration,
        rx: Receiver<WriterMessage>,
    ) {
        loop {
            let (batch, acks) = Self::drain_batch(&rx, batch_size, queue_wait);

            if batch.is_empty() && acks.is_empty() && rx.is_disconnected() {
                break;
            }

            if !batch.is_empty() {
                Self::commit_batch(&store, &metrics, &batch);
            }
            for ack in acks {
                // The flush caller may have gone away; that is fine.
                let _ = ack.send(());
            }
        }
        debug!("link writer drained and exiting");
    }

    /// Block for the first message (bounded by `queue_wait`), then take
    /// whatever is already queued, up to `batch_size` links. A flush closes
    /// the batch early so its ack covers everything queued before it.
    fn drain_batch(
        rx: &Receiver<WriterMessage>,
        batch_size: usize,
        queue_wait: Duration,
    ) -> (Vec<(String, u32)>, Vec<Sender<()>>) {
        let mut batch = Vec::new();
        let mut acks = Vec::new();

        match rx.recv_deadline(Instant::now() + queue_wait) {
            Ok(WriterMessage::Link { url, level }) => batch.push((url, level)),
            Ok(WriterMessage::Flush(ack)) => {
                acks.push(ack);
                return (batch, acks);
            }
            Err(_) => return (batch, acks),
        }

        while batch.len() < batch_size {
            match rx.try_recv() {
                Ok(WriterMessage::Link { url, level }) => batch.push((url, level)),
                Ok(WriterMessage::Flush(ack)) => {
                    acks.push(ack);
                    break;
                }
                Err(_) => break,
            }
        }

        (batch, acks)
    }

    fn commit_batch(store: &FrontierStore, metrics: &CrawlMetrics, batch: &[(String, u32)]) {
        let mut attempt = 0u32;
        loop {
            match store.insert_batch(batch) {
                Ok(inserted) => {
                    metrics.rows_inserted.add(inserted as u64);
                    metrics.batches_committed.inc();
                    debug!(
                        queued = batch.len(),
                        inserted, "committed frontier batch"
                    );
                    return;
                }
                Err(e) if attempt < Config::COMMIT_RETRY_LIMIT => {
                    metrics.commit_retries.inc();
                    let delay = Self::retry_delay(attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "frontier commit failed, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    metrics.batches_dropped.inc();
                    error!(
                        error = %e,
                        dropped = batch.len(),
                        "frontier commit still failing after {} retries, dropping batch",
                        Config::COMMIT_RETRY_LIMIT
                    );
                    return;
                }
            }
        }
    }

    /// Exponential backoff with a cap and up to 10% added jitter.
    fn retry_delay(attempt: u32) -> Duration {
        let exponential =
            Config::COMMIT_RETRY_BASE_MS.saturating_mul(2u64.saturating_pow(attempt.min(20)));
        let capped = exponential.min(Config::COMMIT_RETRY_MAX_MS);
        let jitter = rand::thread_rng().gen_range(0..=capped / 10);
        Duration::from_millis(capped + jitter)
    }
}

impl Drop for LinkWriter {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
