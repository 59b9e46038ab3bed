use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

use pantry_core::OrganizationId;
use pantry_events::EventEnvelope;
use pantry_inventory::{AggregateError, InventoryAggregate, InventoryEvent, InventorySnapshot};

/// A cached snapshot together with the last sequence number folded into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSnapshot {
    pub snapshot: Arc<InventorySnapshot>,
    pub cursor: u64,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to decode inventory event: {0}")]
    Decode(String),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("cache lock poisoned")]
    Poisoned,
}

/// What `apply_envelope` did with an envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// At or below the cursor; already folded in.
    Duplicate,
    /// Nothing cached for the organization and the envelope is not the start
    /// of its stream. The next read rebuilds from the log instead.
    NotCached,
}

#[derive(Debug, Default)]
struct Slot {
    /// Single writer per organization.
    writer: Mutex<()>,
    current: RwLock<Option<CachedSnapshot>>,
}

/// Per-organization snapshot cache.
///
/// Writes for one organization are serialized through that organization's
/// writer lock; the next snapshot is computed off to the side and swapped in,
/// so readers only ever see whole snapshots and never block on a fold.
/// Organizations never contend with each other beyond the slot lookup.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slots: RwLock<HashMap<OrganizationId, Arc<Slot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, organization_id: OrganizationId) -> Result<Arc<Slot>, CacheError> {
        if let Some(slot) = self
            .slots
            .read()
            .map_err(|_| CacheError::Poisoned)?
            .get(&organization_id)
        {
            return Ok(slot.clone());
        }

        let mut slots = self.slots.write().map_err(|_| CacheError::Poisoned)?;
        Ok(slots.entry(organization_id).or_default().clone())
    }

    pub fn get(&self, organization_id: OrganizationId) -> Option<CachedSnapshot> {
        let slots = self.slots.read().ok()?;
        let slot = slots.get(&organization_id)?;
        let current = slot.current.read().ok()?;
        current.clone()
    }

    /// Run `f` as the organization's only writer.
    ///
    /// Every other write for the organization (including `apply_envelope`
    /// from a worker) waits until `f` returns. Readers are never blocked.
    pub fn with_writer<T, E>(
        &self,
        organization_id: OrganizationId,
        f: impl FnOnce(&mut SnapshotWriter<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<CacheError>,
    {
        let slot = self.slot(organization_id)?;
        let _writer = slot.writer.lock().map_err(|_| CacheError::Poisoned)?;

        f(&mut SnapshotWriter {
            organization_id,
            current: &slot.current,
        })
    }

    /// Install a snapshot rebuilt from the log at `cursor`.
    ///
    /// Returns `false` (and keeps the cached entry) when the cache has already
    /// moved past `cursor`.
    pub fn install(
        &self,
        snapshot: InventorySnapshot,
        cursor: u64,
    ) -> Result<bool, CacheError> {
        self.with_writer(snapshot.organization_id, |w| w.install(snapshot, cursor))
    }

    /// Drop the organization's entry; the next read rebuilds it.
    pub fn invalidate(&self, organization_id: OrganizationId) {
        if let Err(err) = self.with_writer(organization_id, |w| w.invalidate()) {
            warn!(organization_id = %organization_id, error = %err, "could not invalidate cached snapshot");
        }
    }

    /// Fold one published envelope into the organization's cached snapshot.
    ///
    /// See [`SnapshotWriter::apply_envelope`].
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<ApplyOutcome, CacheError> {
        self.with_writer(envelope.organization_id(), |w| w.apply_envelope(envelope))
    }
}

/// Write access to one organization's entry, held under its writer lock.
#[derive(Debug)]
pub struct SnapshotWriter<'a> {
    organization_id: OrganizationId,
    current: &'a RwLock<Option<CachedSnapshot>>,
}

impl SnapshotWriter<'_> {
    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn cached(&self) -> Result<Option<CachedSnapshot>, CacheError> {
        Ok(self.current.read().map_err(|_| CacheError::Poisoned)?.clone())
    }

    fn store(&mut self, entry: Option<CachedSnapshot>) -> Result<(), CacheError> {
        *self.current.write().map_err(|_| CacheError::Poisoned)? = entry;
        Ok(())
    }

    /// Same rules as [`SnapshotCache::install`].
    pub fn install(&mut self, snapshot: InventorySnapshot, cursor: u64) -> Result<bool, CacheError> {
        if snapshot.organization_id != self.organization_id {
            return Err(AggregateError::OrganizationMismatch {
                expected: self.organization_id,
                found: snapshot.organization_id,
            }
            .into());
        }

        if let Some(existing) = self.cached()? {
            if existing.cursor > cursor {
                debug!(
                    organization_id = %self.organization_id,
                    cached = existing.cursor,
                    offered = cursor,
                    "keeping newer cached snapshot"
                );
                return Ok(false);
            }
        }

        self.store(Some(CachedSnapshot {
            snapshot: Arc::new(snapshot),
            cursor,
        }))?;
        Ok(true)
    }

    pub fn invalidate(&mut self) -> Result<(), CacheError> {
        self.store(None)
    }

    /// Fold one envelope into the cached snapshot.
    ///
    /// - Idempotent for at-least-once delivery (envelopes <= cursor are ignored)
    /// - Gaps are rejected so a lost envelope can never go unnoticed
    /// - A rejected event leaves snapshot and cursor untouched
    pub fn apply_envelope(
        &mut self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<ApplyOutcome, CacheError> {
        if envelope.organization_id() != self.organization_id {
            return Err(AggregateError::OrganizationMismatch {
                expected: self.organization_id,
                found: envelope.organization_id(),
            }
            .into());
        }
        let seq = envelope.sequence_number();

        let (base, last) = match self.cached()? {
            Some(cached) => (cached.snapshot, cached.cursor),
            None if seq == 1 => (Arc::new(InventorySnapshot::empty(self.organization_id)), 0),
            None => return Ok(ApplyOutcome::NotCached),
        };

        if seq <= last {
            return Ok(ApplyOutcome::Duplicate);
        }
        if seq != last + 1 {
            return Err(CacheError::NonMonotonicSequence { last, found: seq });
        }

        let event: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CacheError::Decode(e.to_string()))?;
        let next = InventoryAggregate::handled(&event, &base)?;

        self.store(Some(CachedSnapshot {
            snapshot: Arc::new(next),
            cursor: seq,
        }))?;

        Ok(ApplyOutcome::Applied)
    }
}
