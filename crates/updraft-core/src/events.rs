//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Update session lifecycle, lease renewal, and checkpointing."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::sync::Arc;

use tracing::debug;

use updraft_api::wire::{EngineEvent, EngineEventBatch};
use updraft_api::UpdateIdentifier;
use updraft_common::metrics::EVENT_BATCHES_TOTAL;

use crate::backend::UpdateBackend;
use crate::error::Result;
use crate::lease::LeaseReader;

/// Ships ordered engine event batches under the current lease.
///
/// Batches append server-side, so they must be submitted in production
/// order. A retried, partially accepted batch may duplicate events; the
/// sequence metadata carried in each event lets the backend deduplicate.
#[derive(Debug)]
pub struct EventRecorder {
    backend: Arc<dyn UpdateBackend>,
    update: UpdateIdentifier,
    lease: LeaseReader,
}

impl EventRecorder {
    pub fn new(
        backend: Arc<dyn UpdateBackend>,
        update: UpdateIdentifier,
        lease: LeaseReader,
    ) -> Self {
        Self {
            backend,
            update,
            lease,
        }
    }

    /// Ship one batch. Empty batches are dropped without a call.
    pub async fn record(&self, batch: EngineEventBatch) -> Result<()> {
        if batch.events.is_empty() {
            return Ok(());
        }
        let count = batch.events.len();
        let token = self.lease.current()?;
        self.backend
            .record_events(&self.update, batch, &token)
            .await?;
        EVENT_BATCHES_TOTAL.inc();
        debug!(update = %self.update, count, "event batch recorded");
        Ok(())
    }
}

/// Read the whole event stream back, following continuation tokens until the
/// backend stops returning one.
pub async fn read_all_events(
    backend: &dyn UpdateBackend,
    update: &UpdateIdentifier,
) -> Result<Vec<EngineEvent>> {
    let mut events = Vec::new();
    let mut continuation: Option<String> = None;
    loop {
        let page = backend.get_events(update, continuation.take()).await?;
        events.extend(page.events);
        match page.continuation_token {
            Some(next) => continuation = Some(next),
            None => break,
        }
    }
    Ok(events)
}
