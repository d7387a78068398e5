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

use serde_json::Value as JsonValue;
use tracing::debug;

use updraft_api::wire::PatchCheckpointRequest;
use updraft_api::UpdateIdentifier;
use updraft_common::metrics::CHECKPOINT_PATCHES_TOTAL;

use crate::backend::UpdateBackend;
use crate::error::Result;
use crate::lease::LeaseReader;

/// Persists the latest full deployment snapshot under the current lease.
///
/// Every write carries the entire snapshot, so replaying a timed-out PATCH
/// converges on the same stored state; the latest accepted write wins.
/// The writer makes no claim about concurrent calls: submissions must be
/// serialized by whoever drives the operation, or "latest" becomes
/// ambiguous.
#[derive(Debug)]
pub struct CheckpointWriter {
    backend: Arc<dyn UpdateBackend>,
    update: UpdateIdentifier,
    lease: LeaseReader,
}

impl CheckpointWriter {
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

    /// Replace the stored checkpoint with the full `deployment` snapshot.
    pub async fn write(&self, deployment: JsonValue) -> Result<()> {
        let token = self.lease.current()?;
        self.backend
            .patch_checkpoint(
                &self.update,
                PatchCheckpointRequest::snapshot(deployment),
                &token,
            )
            .await?;
        CHECKPOINT_PATCHES_TOTAL.inc();
        debug!(update = %self.update, "checkpoint patched");
        Ok(())
    }

    /// Mark the stored checkpoint unusable, e.g. after a crash left it
    /// inconsistent mid-write. Idempotent like [`write`](Self::write).
    pub async fn invalidate(&self) -> Result<()> {
        let token = self.lease.current()?;
        self.backend
            .patch_checkpoint(&self.update, PatchCheckpointRequest::invalidate(), &token)
            .await?;
        debug!(update = %self.update, "checkpoint invalidated");
        Ok(())
    }
}
