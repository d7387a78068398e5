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
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use updraft_api::wire::{EngineEventBatch, RequiredPolicy, TagMap, UpdateProgramRequest, UpdateStatus};
use updraft_api::{validate_stack_properties, StackIdentifier, UpdateIdentifier, UpdateKind};

use crate::backend::UpdateBackend;
use crate::checkpoint::CheckpointWriter;
use crate::error::{BackendError, Result};
use crate::events::EventRecorder;
use crate::lease::{LeaseKeeper, LeaseReader, LeaseToken};

/// An update accepted by the backend but not yet started.
///
/// Holds the identifier assigned at creation plus any policies the backend
/// requires before the update may proceed. Callers are expected to abort
/// here when required policies are unsatisfied.
#[derive(Debug)]
pub struct UpdateSession {
    backend: Arc<dyn UpdateBackend>,
    update: UpdateIdentifier,
    required_policies: Vec<RequiredPolicy>,
}

impl UpdateSession {
    /// Register a new update against `stack`. Not retried: a replay could
    /// register duplicate updates.
    pub async fn create(
        backend: Arc<dyn UpdateBackend>,
        stack: StackIdentifier,
        kind: UpdateKind,
        request: UpdateProgramRequest,
    ) -> Result<Self> {
        let response = backend.create_update(&stack, kind, request).await?;
        info!(stack = %stack, %kind, update_id = %response.update_id, "update created");
        Ok(Self {
            backend,
            update: UpdateIdentifier {
                stack,
                kind,
                update_id: response.update_id,
            },
            required_policies: response.required_policies,
        })
    }

    pub fn update(&self) -> &UpdateIdentifier {
        &self.update
    }

    /// Policies the backend requires this update to satisfy, passed through
    /// untouched.
    pub fn required_policies(&self) -> &[RequiredPolicy] {
        &self.required_policies
    }

    /// Start the update, atomically replacing the stack's tag set.
    ///
    /// Tags are validated locally first; a malformed set fails with
    /// [`BackendError::Validation`] before any request is sent, and the
    /// session never reaches `Running`.
    pub async fn start(self, tags: TagMap) -> Result<StartedUpdate> {
        validate_stack_properties(&self.update.stack.stack, &tags)?;
        let response = self.backend.start_update(&self.update, tags).await?;
        info!(update = %self.update, stack_version = response.version, "update started");
        Ok(StartedUpdate {
            backend: self.backend,
            update: self.update,
            token: LeaseToken::new(response.token),
            stack_version: response.version,
        })
    }
}

/// An update holding a freshly issued lease, not yet running.
#[derive(Debug)]
pub struct StartedUpdate {
    backend: Arc<dyn UpdateBackend>,
    update: UpdateIdentifier,
    token: LeaseToken,
    stack_version: u64,
}

impl StartedUpdate {
    pub fn update(&self) -> &UpdateIdentifier {
        &self.update
    }

    /// The initial lease token returned by start.
    pub fn token(&self) -> &LeaseToken {
        &self.token
    }

    /// Stack version after the tag replacement performed by start.
    pub fn stack_version(&self) -> u64 {
        self.stack_version
    }

    /// Enter the `Running` window: spawn the lease renewal loop and hand out
    /// the handle used for checkpointing, event recording, and termination.
    pub fn run(self, lease_duration: Duration) -> RunningUpdate {
        let keeper = LeaseKeeper::spawn(
            self.backend.clone(),
            self.update.clone(),
            self.token,
            lease_duration,
        );
        let lease = keeper.reader();
        let checkpoints =
            CheckpointWriter::new(self.backend.clone(), self.update.clone(), lease.clone());
        let events = EventRecorder::new(self.backend.clone(), self.update.clone(), lease.clone());
        RunningUpdate {
            backend: self.backend,
            update: self.update,
            stack_version: self.stack_version,
            lease,
            keeper: Mutex::new(Some(keeper)),
            checkpoints,
            checkpoint_gate: tokio::sync::Mutex::new(()),
            events,
            terminal: Mutex::new(None),
        }
    }
}

/// Terminal state an update session ends in, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Completed,
    Canceled,
}

/// Handle for one running update.
///
/// The lease renewal loop runs in the background for as long as this handle
/// is live and non-terminal. Checkpoint submissions are serialized here: at
/// most one write is in flight per update.
#[derive(Debug)]
pub struct RunningUpdate {
    backend: Arc<dyn UpdateBackend>,
    update: UpdateIdentifier,
    stack_version: u64,
    lease: LeaseReader,
    keeper: Mutex<Option<LeaseKeeper>>,
    checkpoints: CheckpointWriter,
    checkpoint_gate: tokio::sync::Mutex<()>,
    events: EventRecorder,
    terminal: Mutex<Option<TerminalState>>,
}

impl RunningUpdate {
    pub fn update(&self) -> &UpdateIdentifier {
        &self.update
    }

    pub fn stack_version(&self) -> u64 {
        self.stack_version
    }

    /// Terminal state, once one has been reached.
    pub fn terminal_state(&self) -> Option<TerminalState> {
        *self.terminal.lock()
    }

    /// Persist the full deployment snapshot as the current checkpoint.
    pub async fn checkpoint(&self, deployment: JsonValue) -> Result<()> {
        self.ensure_open()?;
        let _in_flight = self.checkpoint_gate.lock().await;
        self.checkpoints.write(deployment).await
    }

    /// Mark the stored checkpoint unusable.
    pub async fn invalidate_checkpoint(&self) -> Result<()> {
        self.ensure_open()?;
        let _in_flight = self.checkpoint_gate.lock().await;
        self.checkpoints.invalidate().await
    }

    /// Ship one ordered batch of engine events.
    pub async fn record_events(&self, batch: EngineEventBatch) -> Result<()> {
        self.ensure_open()?;
        self.events.record(batch).await
    }

    /// Complete the update with its final status. A no-op when the session
    /// is already terminal, whichever terminal call came first.
    pub async fn complete(&self, status: UpdateStatus) -> Result<()> {
        if self.terminal.lock().is_some() {
            debug!(update = %self.update, "session already terminal; complete is a no-op");
            return Ok(());
        }
        let token = self.lease.current()?;
        self.backend
            .complete_update(&self.update, status, &token)
            .await?;
        info!(update = %self.update, ?status, "update completed");
        self.finish(TerminalState::Completed).await;
        Ok(())
    }

    /// Abort the update. A no-op when the session is already terminal.
    /// Usable even after lease expiry, since cancellation is authorized by
    /// the account token.
    pub async fn cancel(&self) -> Result<()> {
        if self.terminal.lock().is_some() {
            debug!(update = %self.update, "session already terminal; cancel is a no-op");
            return Ok(());
        }
        self.backend.cancel_update(&self.update).await?;
        info!(update = %self.update, "update canceled");
        self.finish(TerminalState::Canceled).await;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.terminal.lock().is_some() {
            return Err(BackendError::Closed);
        }
        Ok(())
    }

    async fn finish(&self, state: TerminalState) {
        {
            let mut terminal = self.terminal.lock();
            if terminal.is_none() {
                *terminal = Some(state);
            }
        }
        let keeper = self.keeper.lock().take();
        if let Some(keeper) = keeper {
            keeper.stop().await;
        }
    }
}
