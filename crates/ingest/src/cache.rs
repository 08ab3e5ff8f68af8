use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;
use lru::LruCache;
use serde::Serialize;

use gridscope_core::Reading;

/// Cache key for one node-day batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DayKey {
    pub node: String,
    pub date: NaiveDate,
}

impl DayKey {
    pub fn new(node: &str, date: NaiveDate) -> Self {
        Self {
            node: node.to_string(),
            date,
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.node, self.date.format("%Y_%m_%d"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub nodes: Vec<String>,
}

/// Day-batch cache injected into the orchestrator.
///
/// Entries live for the process lifetime; there is no TTL and no
/// eviction. Day batches are immutable upstream, so a cached batch never
/// goes stale — the only invalidation is an explicit per-node clear.
pub trait ReadingCache: Send + Sync {
    fn get(&self, key: &DayKey) -> Option<Vec<Reading>>;
    fn put(&self, key: DayKey, readings: Vec<Reading>);
    /// Drop every cached day for one node, returning how many were removed.
    fn clear_node(&self, node: &str) -> usize;
    fn stats(&self) -> CacheStats;
}

/// In-memory implementation on an unbounded LRU map with hit/miss
/// counters.
pub struct MemoryCache {
    entries: Mutex<LruCache<DayKey, Vec<Reading>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl ReadingCache for MemoryCache {
    fn get(&self, key: &DayKey) -> Option<Vec<Reading>> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(readings) = entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(readings.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    fn put(&self, key: DayKey, readings: Vec<Reading>) {
        let mut entries = self.entries.lock().unwrap();
        entries.put(key, readings);
    }

    fn clear_node(&self, node: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let keys: Vec<DayKey> = entries
            .iter()
            .filter(|(key, _)| key.node == node)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            entries.pop(key);
        }
        keys.len()
    }

    fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap();
        let nodes: BTreeSet<String> = entries.iter().map(|(key, _)| key.node.clone()).collect();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries: entries.len(),
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            nodes: nodes.into_iter().collect(),
        }
    }
}
