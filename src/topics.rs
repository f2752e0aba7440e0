//! In-memory topic dedupe for a single crawl run.

use dashmap::DashSet;

/// Concurrent set of article topics already emitted by the link extractor.
///
/// Lives for one run and is never persisted; a resumed run starts empty and
/// relies on the frontier's primary key to absorb re-discoveries.
#[derive(Debug, Default)]
pub struct TopicSet {
    seen: DashSet<String>,
}

impl TopicSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically record a topic. Returns true when it was not seen before.
    pub fn insert(&self, topic: &str) -> bool {
        self.seen.insert(topic.to_string())
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.seen.contains(topic)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
