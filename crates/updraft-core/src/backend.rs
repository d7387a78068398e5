//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Update session lifecycle, lease renewal, and checkpointing."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
//! Backend capabilities consumed by the lifecycle core. Implementations are
//! injected at construction; the REST binding lives in `updraft-client` and
//! an in-memory one in [`crate::testing`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use updraft_api::wire::{
    ConfigMap, EngineEventBatch, PatchCheckpointRequest, Stack, StartUpdateResponse, TagMap,
    UpdateProgramRequest, UpdateProgramResponse, UpdateResults, UpdateStatus,
};
use updraft_api::{StackIdentifier, UpdateIdentifier, UpdateKind};

use crate::error::Result;
use crate::lease::LeaseToken;

/// Operations scoped to one update's lifecycle.
#[async_trait]
pub trait UpdateBackend: fmt::Debug + Send + Sync + 'static {
    /// Register a new update of the given kind against the stack. Not
    /// retry-safe: replaying could register duplicate updates.
    async fn create_update(
        &self,
        stack: &StackIdentifier,
        kind: UpdateKind,
        request: UpdateProgramRequest,
    ) -> Result<UpdateProgramResponse>;

    /// Start the update, atomically replacing the stack's tag set. Returns
    /// the initial lease token and the stack's new version. Not retry-safe.
    async fn start_update(
        &self,
        update: &UpdateIdentifier,
        tags: TagMap,
    ) -> Result<StartUpdateResponse>;

    /// Exchange the current lease token for a fresh one valid for
    /// `duration`. Retry-safe.
    async fn renew_lease(
        &self,
        update: &UpdateIdentifier,
        token: &LeaseToken,
        duration: Duration,
    ) -> Result<LeaseToken>;

    /// Replace the stored checkpoint with the submitted one, or mark it
    /// invalid. Retry-safe because the request carries the entire snapshot.
    async fn patch_checkpoint(
        &self,
        update: &UpdateIdentifier,
        request: PatchCheckpointRequest,
        token: &LeaseToken,
    ) -> Result<()>;

    /// Abort the update. Retry-safe; a no-op once the update is terminal.
    async fn cancel_update(&self, update: &UpdateIdentifier) -> Result<()>;

    /// Complete the update with its final status. Retry-safe; a no-op once
    /// the update is terminal.
    async fn complete_update(
        &self,
        update: &UpdateIdentifier,
        status: UpdateStatus,
        token: &LeaseToken,
    ) -> Result<()>;

    /// Append a batch of ordered engine events. Retry-safe; duplicates from
    /// retried partial acceptance are deduplicated downstream by sequence.
    async fn record_events(
        &self,
        update: &UpdateIdentifier,
        batch: EngineEventBatch,
        token: &LeaseToken,
    ) -> Result<()>;

    /// Read back a page of recorded events. An absent continuation token
    /// reads from the start; the response omits the token at end of stream.
    async fn get_events(
        &self,
        update: &UpdateIdentifier,
        continuation_token: Option<String>,
    ) -> Result<UpdateResults>;
}

/// Stack-level operations that do not belong to a single update.
#[async_trait]
pub trait StackBackend: fmt::Debug + Send + Sync + 'static {
    /// Create a stack with the given tag set. Not retry-safe.
    async fn create_stack(&self, stack: &StackIdentifier, tags: TagMap) -> Result<Stack>;

    /// Fetch the stack record.
    async fn get_stack(&self, stack: &StackIdentifier) -> Result<Stack>;

    /// Delete the stack. Without `force`, a stack that still contains
    /// resources is refused with [`crate::BackendError::StackHasResources`].
    async fn delete_stack(&self, stack: &StackIdentifier, force: bool) -> Result<()>;

    /// Configuration of the stack's most recent deployment. Fails with
    /// [`crate::BackendError::NoPreviousDeployment`] when no update has run.
    async fn get_latest_configuration(&self, stack: &StackIdentifier) -> Result<ConfigMap>;
}
