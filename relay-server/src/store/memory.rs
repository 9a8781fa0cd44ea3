//! Process-local run store with capacity and age limits.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::info;

use super::{RunRecord, RunStore};

struct Entry {
    record: RunRecord,
    touched: Instant,
    seq: u64,
}

/// Records plus their write order. `order` maps each entry's `seq` back to
/// its run id, so the oldest write is always `order`'s first key.
#[derive(Default)]
struct Entries {
    records: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Entries {
    fn remove(&mut self, run_id: &str) -> Option<Entry> {
        let entry = self.records.remove(run_id)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn insert(&mut self, run_id: &str, record: RunRecord, touched: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, run_id.to_string());
        self.records.insert(
            run_id.to_string(),
            Entry {
                record,
                touched,
                seq,
            },
        );
    }

    fn evict_oldest(&mut self) {
        if let Some((_, id)) = self.order.pop_first() {
            self.records.remove(&id);
            info!(run_id = %id, "run_store_evicted");
        }
    }
}

/// In-memory [`RunStore`].
///
/// A single mutex guards the map, so each `upsert` read-modify-write is
/// atomic. Merges never await, so the lock is held only for the merge itself.
pub struct MemoryRunStore {
    entries: Mutex<Entries>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl MemoryRunStore {
    /// `capacity` is clamped to at least one record; `ttl` of `None` disables
    /// expiry.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // A panic inside a merge closure leaves the map itself consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl
            .map(|ttl| now.duration_since(entry.touched) >= ttl)
            .unwrap_or(false)
    }
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self::new(10_000, None)
    }
}

impl RunStore for MemoryRunStore {
    fn get(&self, run_id: &str) -> Option<RunRecord> {
        let mut entries = self.lock();
        let now = Instant::now();
        let expired = entries.records.get(run_id).map(|e| self.is_expired(e, now))?;
        if expired {
            entries.remove(run_id);
            return None;
        }
        entries.records.get(run_id).map(|e| e.record.clone())
    }

    fn upsert(&self, run_id: &str, merge: &mut dyn FnMut(&mut RunRecord)) -> RunRecord {
        let mut entries = self.lock();
        let now = Instant::now();

        let mut record = match entries.remove(run_id) {
            Some(entry) if !self.is_expired(&entry, now) => entry.record,
            _ => RunRecord::new(run_id),
        };
        merge(&mut record);

        while entries.records.len() >= self.capacity {
            entries.evict_oldest();
        }
        entries.insert(run_id, record.clone(), now);
        record
    }

    fn len(&self) -> usize {
        self.lock().records.len()
    }

    fn prune_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut entries = self.lock();
        let now = Instant::now();
        let expired: Vec<String> = entries
            .records
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        expired.len()
    }
}
