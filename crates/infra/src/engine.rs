//! Read/write entry point for inventory snapshots.
//!
//! `inventory_for` is the ground truth: a full replay of the organization's
//! stream. The cache is an optimization that must always agree with it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use pantry_core::{ExpectedVersion, OrganizationId};
use pantry_inventory::{
    AggregateError, InventoryAggregate, InventoryEvent, InventorySnapshot, operations_for,
};

use crate::config::EngineConfig;
use crate::event_log::{EventLog, EventLogError, StoredEvent, UncommittedEvent};
use crate::projections::{CacheError, SnapshotCache};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Log(#[from] EventLogError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("event #{sequence_number} could not be decoded: {message}")]
    Decode { sequence_number: u64, message: String },
}

/// Inventory aggregate engine bound to an event log.
pub struct InventoryEngine<L> {
    log: L,
    cache: Arc<SnapshotCache>,
    config: EngineConfig,
}

impl<L> InventoryEngine<L>
where
    L: EventLog,
{
    pub fn new(log: L, config: EngineConfig) -> Self {
        Self::with_cache(log, Arc::new(SnapshotCache::new()), config)
    }

    /// Share a cache with other writers (e.g. a `SnapshotWorker`).
    pub fn with_cache(log: L, cache: Arc<SnapshotCache>, config: EngineConfig) -> Self {
        Self { log, cache, config }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Incremental path: the snapshot after `event`.
    pub fn handle(
        &self,
        event: &InventoryEvent,
        snapshot: &InventorySnapshot,
    ) -> Result<InventorySnapshot, EngineError> {
        Ok(InventoryAggregate::handled(event, snapshot)?)
    }

    /// Full replay of the organization's stream from empty.
    pub fn inventory_for(
        &self,
        organization_id: OrganizationId,
    ) -> Result<InventorySnapshot, EngineError> {
        Ok(self.replay(organization_id)?.0)
    }

    fn replay(
        &self,
        organization_id: OrganizationId,
    ) -> Result<(InventorySnapshot, u64), EngineError> {
        let stored = self.log.load_organization(organization_id)?;
        let cursor = stored.last().map(|e| e.sequence_number).unwrap_or(0);

        let events = stored
            .iter()
            .map(|e| {
                e.decode::<InventoryEvent>().map_err(|err| EngineError::Decode {
                    sequence_number: e.sequence_number,
                    message: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let snapshot = InventoryAggregate::replay(organization_id, &events)?;

        debug!(
            organization_id = %organization_id,
            events = events.len(),
            cursor,
            "replayed inventory"
        );

        Ok((snapshot, cursor))
    }

    /// Append an event to the log.
    ///
    /// The event is validated first so a malformed or unknown event never
    /// enters the history every later replay depends on. With the cache enabled
    /// the append and the cache update happen under the organization's writer
    /// lock, so the cache never falls behind a committed event and the caller
    /// can read its own write through `current`.
    pub fn record(
        &self,
        event: &InventoryEvent,
        expected_version: ExpectedVersion,
    ) -> Result<StoredEvent, EngineError> {
        operations_for(event)?;

        if !self.config.cache_enabled {
            return self.append(event, expected_version);
        }

        self.cache.with_writer(event.organization_id, |writer| {
            let stored = self.append(event, expected_version)?;

            match writer.apply_envelope(&stored.to_envelope()) {
                Ok(outcome) => debug!(
                    organization_id = %stored.organization_id,
                    sequence_number = stored.sequence_number,
                    ?outcome,
                    "cache updated"
                ),
                Err(err) => {
                    warn!(
                        organization_id = %stored.organization_id,
                        sequence_number = stored.sequence_number,
                        error = %err,
                        "cache rejected committed event; invalidating"
                    );
                    writer.invalidate()?;
                }
            }

            Ok(stored)
        })
    }

    fn append(
        &self,
        event: &InventoryEvent,
        expected_version: ExpectedVersion,
    ) -> Result<StoredEvent, EngineError> {
        let uncommitted = UncommittedEvent::from_inventory(event)?;
        let mut committed = self.log.append(vec![uncommitted], expected_version)?;
        committed
            .pop()
            .ok_or_else(|| EventLogError::InvalidAppend("append committed nothing".to_string()).into())
    }

    /// Current snapshot, from the cache when possible.
    pub fn current(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Arc<InventorySnapshot>, EngineError> {
        if !self.config.cache_enabled {
            return Ok(Arc::new(self.inventory_for(organization_id)?));
        }

        if self.config.verify_on_read {
            self.verify(organization_id)?;
        }

        if let Some(cached) = self.cache.get(organization_id) {
            return Ok(cached.snapshot);
        }

        self.cache.with_writer(organization_id, |writer| {
            if let Some(cached) = writer.cached()? {
                return Ok(cached.snapshot);
            }

            let (snapshot, cursor) = self.replay(organization_id)?;
            info!(organization_id = %organization_id, cursor, "rebuilt cached inventory");
            writer.install(snapshot.clone(), cursor)?;
            Ok(Arc::new(snapshot))
        })
    }

    /// Compare the cached snapshot against a full replay.
    ///
    /// Returns `true` when they agree (or nothing was cached). On disagreement
    /// the replayed snapshot replaces the cached one.
    pub fn verify(&self, organization_id: OrganizationId) -> Result<bool, EngineError> {
        self.cache.with_writer(organization_id, |writer| {
            let Some(cached) = writer.cached()? else {
                return Ok(true);
            };

            let (snapshot, cursor) = self.replay(organization_id)?;
            if cached.cursor == cursor && *cached.snapshot == snapshot {
                return Ok(true);
            }

            warn!(
                organization_id = %organization_id,
                cached_cursor = cached.cursor,
                log_cursor = cursor,
                "cached inventory disagrees with replay; replacing"
            );
            writer.invalidate()?;
            writer.install(snapshot, cursor)?;
            Ok(false)
        })
    }
}
