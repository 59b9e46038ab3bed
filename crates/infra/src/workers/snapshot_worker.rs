use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use pantry_core::OrganizationId;
use pantry_events::{EventBus, EventEnvelope, OrganizationScoped, Subscription};

use crate::projections::SnapshotCache;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Keeps a `SnapshotCache` current from a bus subscription.
///
/// One worker drains one subscription sequentially, so every organization's
/// envelopes are folded in publish order. A failed envelope invalidates that
/// organization's entry; the next read rebuilds it from the log.
#[derive(Debug)]
pub struct SnapshotWorker;

impl SnapshotWorker {
    /// Spawn the worker thread.
    ///
    /// - `organization_id`: when provided, envelopes of other organizations are ignored
    /// - subscribes before returning, so nothing published afterwards is missed
    pub fn spawn<B>(
        name: &'static str,
        bus: B,
        organization_id: Option<OrganizationId>,
        cache: Arc<SnapshotCache>,
    ) -> io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>> + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, organization_id, &cache))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop(
    name: &'static str,
    sub: Subscription<EventEnvelope<JsonValue>>,
    shutdown_rx: mpsc::Receiver<()>,
    organization_id: Option<OrganizationId>,
    cache: &SnapshotCache,
) {
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(envelope) => {
                if let Some(org) = organization_id {
                    if OrganizationScoped::organization_id(&envelope) != org {
                        continue;
                    }
                }

                match cache.apply_envelope(&envelope) {
                    Ok(outcome) => debug!(
                        worker = name,
                        organization_id = %envelope.organization_id(),
                        sequence_number = envelope.sequence_number(),
                        event_id = %envelope.event_id(),
                        ?outcome,
                        "snapshot worker applied envelope"
                    ),
                    Err(err) => {
                        warn!(
                            worker = name,
                            organization_id = %envelope.organization_id(),
                            sequence_number = envelope.sequence_number(),
                            record_id = %envelope.record_id(),
                            error = %err,
                            "snapshot worker failed; invalidating cached snapshot"
                        );
                        cache.invalidate(envelope.organization_id());
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
