//! Read models built from the event log.
//!
//! Read models are disposable: dropping one and replaying the organization's
//! stream rebuilds it exactly.

pub mod snapshot_cache;

pub use snapshot_cache::{ApplyOutcome, CacheError, CachedSnapshot, SnapshotCache, SnapshotWriter};
