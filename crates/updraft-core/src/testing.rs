//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Update session lifecycle, lease renewal, and checkpointing."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
//! In-memory backend used to exercise lifecycle behaviour without a network.
//!
//! The mock enforces the same contracts the real backend does: single
//! current lease token per update, last-full-write-wins checkpoints,
//! append-only events with continuation-token pagination, and idempotent
//! terminal transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use updraft_api::wire::{
    ConfigMap, EngineEventBatch, PatchCheckpointRequest, RequiredPolicy, Stack,
    StartUpdateResponse, TagMap, UpdateMetadata, UpdateOptions, UpdateProgramRequest,
    UpdateProgramResponse, UpdateResults, UpdateStatus, CHECKPOINT_VERSION,
};
use updraft_api::{StackIdentifier, UpdateIdentifier, UpdateKind};

use crate::backend::{StackBackend, UpdateBackend};
use crate::error::{BackendError, Result};
use crate::lease::LeaseToken;

use updraft_transport::TransportError;

/// A minimal but valid update-program request for tests.
pub fn minimal_program_request() -> UpdateProgramRequest {
    UpdateProgramRequest {
        name: "website".to_owned(),
        runtime: "nodejs".to_owned(),
        main: None,
        description: String::new(),
        config: ConfigMap::new(),
        options: UpdateOptions::default(),
        metadata: UpdateMetadata::default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockTerminal {
    Completed(UpdateStatus),
    Canceled,
}

#[derive(Debug)]
struct StackRecord {
    stack: Stack,
    resource_count: u64,
    version: u64,
    latest_config: Option<ConfigMap>,
}

#[derive(Debug)]
struct UpdateRecord {
    stack: StackIdentifier,
    config: ConfigMap,
    started: bool,
    token_counter: u64,
    current_token: Option<String>,
    checkpoint: Option<JsonValue>,
    checkpoint_invalid: bool,
    events: Vec<updraft_api::wire::EngineEvent>,
    terminal: Option<MockTerminal>,
}

#[derive(Debug, Default)]
struct MockState {
    stacks: HashMap<StackIdentifier, StackRecord>,
    updates: HashMap<String, UpdateRecord>,
    next_update: u64,
    required_policies: Vec<RequiredPolicy>,
    page_size: Option<usize>,
}

/// In-memory [`StackBackend`] + [`UpdateBackend`] implementation.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    fail_renewals: AtomicBool,
}

fn rejection(status: u16, message: &str) -> BackendError {
    BackendError::Transport(TransportError::Api {
        status,
        message: message.to_owned(),
    })
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the deployment currently holds `count` resources; affects
    /// delete-without-force.
    pub fn set_resource_count(&self, stack: &StackIdentifier, count: u64) {
        if let Some(record) = self.state.lock().stacks.get_mut(stack) {
            record.resource_count = count;
        }
    }

    /// Policies returned with every created update.
    pub fn set_required_policies(&self, policies: Vec<RequiredPolicy>) {
        self.state.lock().required_policies = policies;
    }

    /// Paginate event reads in pages of `size` instead of one full page.
    pub fn set_page_size(&self, size: usize) {
        self.state.lock().page_size = Some(size);
    }

    /// Make every renewal attempt fail, simulating a backend outage long
    /// enough to expire the lease.
    pub fn set_fail_renewals(&self, fail: bool) {
        self.fail_renewals.store(fail, Ordering::SeqCst);
    }

    /// The lease token the backend currently honours for `update_id`.
    pub fn current_token(&self, update_id: &str) -> Option<String> {
        self.state
            .lock()
            .updates
            .get(update_id)
            .and_then(|record| record.current_token.clone())
    }

    /// The stored checkpoint snapshot, if any.
    pub fn stored_checkpoint(&self, update_id: &str) -> Option<JsonValue> {
        self.state
            .lock()
            .updates
            .get(update_id)
            .and_then(|record| record.checkpoint.clone())
    }

    /// Whether the stored checkpoint has been marked unusable.
    pub fn checkpoint_invalidated(&self, update_id: &str) -> bool {
        self.state
            .lock()
            .updates
            .get(update_id)
            .map(|record| record.checkpoint_invalid)
            .unwrap_or(false)
    }

    /// Whether start has been called for `update_id`.
    pub fn update_started(&self, update_id: &str) -> bool {
        self.state
            .lock()
            .updates
            .get(update_id)
            .map(|record| record.started)
            .unwrap_or(false)
    }

    /// Whether the update ended via cancel.
    pub fn update_canceled(&self, update_id: &str) -> bool {
        matches!(
            self.state
                .lock()
                .updates
                .get(update_id)
                .and_then(|record| record.terminal),
            Some(MockTerminal::Canceled)
        )
    }

    /// Final status when the update ended via complete.
    pub fn terminal_status(&self, update_id: &str) -> Option<UpdateStatus> {
        match self
            .state
            .lock()
            .updates
            .get(update_id)
            .and_then(|record| record.terminal)
        {
            Some(MockTerminal::Completed(status)) => Some(status),
            _ => None,
        }
    }

    fn check_token(record: &UpdateRecord, token: &LeaseToken) -> Result<()> {
        if !record.started {
            return Err(rejection(409, "update has not been started"));
        }
        match &record.current_token {
            Some(current) if current == token.as_str() => Ok(()),
            _ => Err(BackendError::stale_token()),
        }
    }
}

#[async_trait]
impl StackBackend for MockBackend {
    async fn create_stack(&self, stack: &StackIdentifier, tags: TagMap) -> Result<Stack> {
        let mut state = self.state.lock();
        if state.stacks.contains_key(stack) {
            return Err(rejection(409, "stack already exists"));
        }
        let record = Stack {
            org_name: stack.owner.clone(),
            project_name: stack.project.clone(),
            stack_name: stack.stack.clone(),
            tags,
        };
        state.stacks.insert(
            stack.clone(),
            StackRecord {
                stack: record.clone(),
                resource_count: 0,
                version: 0,
                latest_config: None,
            },
        );
        Ok(record)
    }

    async fn get_stack(&self, stack: &StackIdentifier) -> Result<Stack> {
        self.state
            .lock()
            .stacks
            .get(stack)
            .map(|record| record.stack.clone())
            .ok_or_else(|| rejection(404, "stack not found"))
    }

    async fn delete_stack(&self, stack: &StackIdentifier, force: bool) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .stacks
            .get(stack)
            .ok_or_else(|| rejection(404, "stack not found"))?;
        if record.resource_count > 0 && !force {
            return Err(BackendError::StackHasResources);
        }
        state.stacks.remove(stack);
        Ok(())
    }

    async fn get_latest_configuration(&self, stack: &StackIdentifier) -> Result<ConfigMap> {
        let state = self.state.lock();
        let record = state
            .stacks
            .get(stack)
            .ok_or_else(|| rejection(404, "stack not found"))?;
        record
            .latest_config
            .clone()
            .ok_or(BackendError::NoPreviousDeployment)
    }
}

#[async_trait]
impl UpdateBackend for MockBackend {
    async fn create_update(
        &self,
        stack: &StackIdentifier,
        _kind: UpdateKind,
        request: UpdateProgramRequest,
    ) -> Result<UpdateProgramResponse> {
        let mut state = self.state.lock();
        if !state.stacks.contains_key(stack) {
            return Err(rejection(404, "stack not found"));
        }
        state.next_update += 1;
        let update_id = format!("update-{}", state.next_update);
        state.updates.insert(
            update_id.clone(),
            UpdateRecord {
                stack: stack.clone(),
                config: request.config,
                started: false,
                token_counter: 0,
                current_token: None,
                checkpoint: None,
                checkpoint_invalid: false,
                events: Vec::new(),
                terminal: None,
            },
        );
        Ok(UpdateProgramResponse {
            update_id,
            required_policies: state.required_policies.clone(),
        })
    }

    async fn start_update(
        &self,
        update: &UpdateIdentifier,
        tags: TagMap,
    ) -> Result<StartUpdateResponse> {
        let mut state = self.state.lock();
        let stack_version = {
            let stack = state
                .stacks
                .get_mut(&update.stack)
                .ok_or_else(|| rejection(404, "stack not found"))?;
            stack.stack.tags = tags;
            stack.version += 1;
            stack.version
        };
        let record = state
            .updates
            .get_mut(&update.update_id)
            .ok_or_else(|| rejection(404, "update not found"))?;
        if record.started {
            return Err(rejection(409, "update already started"));
        }
        record.started = true;
        record.token_counter = 1;
        let token = format!("lease-{}-1", update.update_id);
        record.current_token = Some(token.clone());
        Ok(StartUpdateResponse {
            version: stack_version,
            token,
        })
    }

    async fn renew_lease(
        &self,
        update: &UpdateIdentifier,
        token: &LeaseToken,
        _duration: Duration,
    ) -> Result<LeaseToken> {
        if self.fail_renewals.load(Ordering::SeqCst) {
            return Err(rejection(503, "lease renewal unavailable"));
        }
        let mut state = self.state.lock();
        let record = state
            .updates
            .get_mut(&update.update_id)
            .ok_or_else(|| rejection(404, "update not found"))?;
        Self::check_token(record, token)?;
        record.token_counter += 1;
        let fresh = format!("lease-{}-{}", update.update_id, record.token_counter);
        record.current_token = Some(fresh.clone());
        Ok(LeaseToken::new(fresh))
    }

    async fn patch_checkpoint(
        &self,
        update: &UpdateIdentifier,
        request: PatchCheckpointRequest,
        token: &LeaseToken,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .updates
            .get_mut(&update.update_id)
            .ok_or_else(|| rejection(404, "update not found"))?;
        Self::check_token(record, token)?;
        if request.is_invalid {
            record.checkpoint_invalid = true;
            return Ok(());
        }
        if request.version != CHECKPOINT_VERSION {
            return Err(rejection(400, "unsupported checkpoint version"));
        }
        // The request carries the whole snapshot; the latest accepted write
        // simply replaces whatever was stored.
        record.checkpoint = request.deployment;
        record.checkpoint_invalid = false;
        Ok(())
    }

    async fn cancel_update(&self, update: &UpdateIdentifier) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .updates
            .get_mut(&update.update_id)
            .ok_or_else(|| rejection(404, "update not found"))?;
        if record.terminal.is_none() {
            record.terminal = Some(MockTerminal::Canceled);
        }
        Ok(())
    }

    async fn complete_update(
        &self,
        update: &UpdateIdentifier,
        status: UpdateStatus,
        token: &LeaseToken,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .updates
            .get_mut(&update.update_id)
            .ok_or_else(|| rejection(404, "update not found"))?;
        Self::check_token(record, token)?;
        if record.terminal.is_none() {
            record.terminal = Some(MockTerminal::Completed(status));
            let config = record.config.clone();
            let stack = record.stack.clone();
            if let Some(stack_record) = state.stacks.get_mut(&stack) {
                stack_record.latest_config = Some(config);
            }
        }
        Ok(())
    }

    async fn record_events(
        &self,
        update: &UpdateIdentifier,
        batch: EngineEventBatch,
        token: &LeaseToken,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .updates
            .get_mut(&update.update_id)
            .ok_or_else(|| rejection(404, "update not found"))?;
        Self::check_token(record, token)?;
        record.events.extend(batch.events);
        Ok(())
    }

    async fn get_events(
        &self,
        update: &UpdateIdentifier,
        continuation_token: Option<String>,
    ) -> Result<UpdateResults> {
        let state = self.state.lock();
        let record = state
            .updates
            .get(&update.update_id)
            .ok_or_else(|| rejection(404, "update not found"))?;
        let status = match record.terminal {
            Some(MockTerminal::Completed(status)) => status,
            Some(MockTerminal::Canceled) => UpdateStatus::Failed,
            None if record.started => UpdateStatus::Running,
            None => UpdateStatus::NotStarted,
        };
        let start = match continuation_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| rejection(400, "malformed continuation token"))?,
            None => 0,
        };
        let page = state.page_size.unwrap_or(usize::MAX);
        let end = start.saturating_add(page).min(record.events.len());
        let events = record.events[start.min(record.events.len())..end].to_vec();
        let continuation_token = (end < record.events.len()).then(|| end.to_string());
        Ok(UpdateResults {
            status,
            events,
            continuation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_and_fetched_stacks_match() {
        let mock = MockBackend::new();
        let id = StackIdentifier::new("acme", "website", "prod");
        let mut tags = TagMap::new();
        tags.insert("env".to_owned(), "production".to_owned());

        let created = mock.create_stack(&id, tags.clone()).await.unwrap();
        let fetched = mock.get_stack(&id).await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.org_name, "acme");
        assert_eq!(fetched.project_name, "website");
        assert_eq!(fetched.stack_name, "prod");
        assert_eq!(fetched.tags, tags);
    }

    #[tokio::test]
    async fn delete_distinguishes_resource_bearing_stacks() {
        let mock = MockBackend::new();
        let id = StackIdentifier::new("acme", "website", "prod");
        mock.create_stack(&id, TagMap::new()).await.unwrap();
        mock.set_resource_count(&id, 4);

        let err = mock.delete_stack(&id, false).await.unwrap_err();
        assert!(matches!(err, BackendError::StackHasResources));

        mock.delete_stack(&id, true).await.unwrap();
        let err = mock.get_stack(&id).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[tokio::test]
    async fn latest_configuration_distinguishes_first_run() {
        let mock = MockBackend::new();
        let id = StackIdentifier::new("acme", "website", "prod");
        mock.create_stack(&id, TagMap::new()).await.unwrap();

        let err = mock.get_latest_configuration(&id).await.unwrap_err();
        assert!(matches!(err, BackendError::NoPreviousDeployment));
    }
}
