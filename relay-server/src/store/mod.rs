//! Run record storage.
//!
//! The reconciler only talks to [`RunStore`], so the in-memory map can be
//! replaced by a persistent or sharded backend without touching merge logic.

pub mod memory;
pub mod record;

pub use memory::MemoryRunStore;
pub use record::{is_processing, RunRecord, PROCESSING_STATUS};

/// Storage abstraction for accumulated run records.
pub trait RunStore: Send + Sync {
    /// Current record for `run_id`, if any.
    fn get(&self, run_id: &str) -> Option<RunRecord>;

    /// Load the record for `run_id` (or a fresh one), apply `merge`, and
    /// persist it. Must be atomic with respect to other upserts of the same
    /// `run_id`. Returns the stored record.
    fn upsert(&self, run_id: &str, merge: &mut dyn FnMut(&mut RunRecord)) -> RunRecord;

    /// Number of records held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired records, returning how many were removed.
    fn prune_expired(&self) -> usize {
        0
    }
}
