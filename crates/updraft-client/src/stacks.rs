//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST backend binding for the deployment service."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use async_trait::async_trait;
use tracing::debug;

use updraft_api::wire::{
    ConfigMap, CreateStackRequest, DecryptValueRequest, DecryptValueResponse, EncryptValueRequest,
    EncryptValueResponse, GetHistoryResponse, ImportStackResponse, LatestUpdateResponse,
    ListStacksResponse, Stack, StackRenameRequest, StackSummary, TagMap, UntypedDeployment,
    UpdateInfo,
};
use updraft_api::{
    validate_stack_name, validate_stack_properties, validate_stack_tags, StackIdentifier,
    UpdateIdentifier, UpdateKind,
};
use updraft_core::{BackendError, Result, StackBackend};
use updraft_transport::{CallOptions, Method, TransportError};

use crate::paths::{project_path, stack_path};
use crate::RestBackend;

/// The one backend rejection callers are expected to recover from by
/// offering a force-delete. Distinguished by status plus the fixed message,
/// which is all the wire contract provides.
fn classify_delete_rejection(err: TransportError) -> BackendError {
    match &err {
        TransportError::Api { status: 400, message }
            if message == "Bad Request: Stack still contains resources." =>
        {
            BackendError::StackHasResources
        }
        _ => BackendError::Transport(err),
    }
}

/// Optional filters when listing stacks.
#[derive(Debug, Clone, Default)]
pub struct ListStacksFilter {
    pub project: Option<String>,
    pub organization: Option<String>,
    pub tag_name: Option<String>,
    pub tag_value: Option<String>,
}

#[async_trait]
impl StackBackend for RestBackend {
    async fn create_stack(&self, stack: &StackIdentifier, tags: TagMap) -> Result<Stack> {
        validate_stack_properties(&stack.stack, &tags)?;
        let request = CreateStackRequest {
            stack_name: stack.stack.clone(),
            tags: tags.clone(),
        };
        self.caller()
            .call_unit(
                Method::POST,
                &project_path(stack),
                &[],
                Some(&request),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?;
        debug!(stack = %stack, "stack created");
        Ok(Stack {
            org_name: stack.owner.clone(),
            project_name: stack.project.clone(),
            stack_name: stack.stack.clone(),
            tags,
        })
    }

    async fn get_stack(&self, stack: &StackIdentifier) -> Result<Stack> {
        Ok(self
            .caller()
            .call(
                Method::GET,
                &stack_path(stack, &[]),
                &[],
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await?)
    }

    async fn delete_stack(&self, stack: &StackIdentifier, force: bool) -> Result<()> {
        self.caller()
            .call_unit(
                Method::DELETE,
                &stack_path(stack, &[]),
                &[("force", force.to_string())],
                Option::<&()>::None,
                self.account(),
                CallOptions::non_retryable(),
            )
            .await
            .map_err(classify_delete_rejection)
    }

    async fn get_latest_configuration(&self, stack: &StackIdentifier) -> Result<ConfigMap> {
        let latest: LatestUpdateResponse = self
            .caller()
            .call(
                Method::GET,
                &stack_path(stack, &["updates", "latest"]),
                &[],
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await
            .map_err(|err| match err.status() {
                Some(404) => BackendError::NoPreviousDeployment,
                _ => BackendError::Transport(err),
            })?;
        Ok(latest.info.config)
    }
}

impl RestBackend {
    /// List stacks the account can access, optionally filtered.
    pub async fn list_stacks(&self, filter: ListStacksFilter) -> Result<Vec<StackSummary>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(project) = filter.project {
            query.push(("project", project));
        }
        if let Some(organization) = filter.organization {
            query.push(("organization", organization));
        }
        if let Some(tag_name) = filter.tag_name {
            query.push(("tagName", tag_name));
        }
        if let Some(tag_value) = filter.tag_value {
            query.push(("tagValue", tag_value));
        }
        let response: ListStacksResponse = self
            .caller()
            .call(
                Method::GET,
                "/api/user/stacks",
                &query,
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await?;
        Ok(response.stacks)
    }

    /// Rename a stack in place.
    pub async fn rename_stack(&self, stack: &StackIdentifier, new_name: &str) -> Result<()> {
        validate_stack_name(new_name)?;
        let request = StackRenameRequest {
            new_name: new_name.to_owned(),
        };
        Ok(self
            .caller()
            .call_unit(
                Method::POST,
                &stack_path(stack, &["rename"]),
                &[],
                Some(&request),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?)
    }

    /// All recorded updates for the stack, newest last.
    pub async fn get_stack_updates(&self, stack: &StackIdentifier) -> Result<Vec<UpdateInfo>> {
        let response: GetHistoryResponse = self
            .caller()
            .call(
                Method::GET,
                &stack_path(stack, &["updates"]),
                &[],
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await?;
        Ok(response.updates)
    }

    /// Replace the stack's tag set outside of an update.
    pub async fn update_stack_tags(&self, stack: &StackIdentifier, tags: TagMap) -> Result<()> {
        validate_stack_tags(&tags)?;
        Ok(self
            .caller()
            .call_unit(
                Method::PATCH,
                &stack_path(stack, &["tags"]),
                &[],
                Some(&tags),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?)
    }

    /// Export the stack's deployment snapshot for out-of-band backup.
    pub async fn export_deployment(&self, stack: &StackIdentifier) -> Result<UntypedDeployment> {
        Ok(self
            .caller()
            .call(
                Method::GET,
                &stack_path(stack, &["export"]),
                &[],
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await?)
    }

    /// Import a previously exported deployment snapshot. Returns the
    /// identifier of the import update the backend runs to adopt it.
    pub async fn import_deployment(
        &self,
        stack: &StackIdentifier,
        deployment: &UntypedDeployment,
    ) -> Result<UpdateIdentifier> {
        let response: ImportStackResponse = self
            .caller()
            .call(
                Method::POST,
                &stack_path(stack, &["import"]),
                &[],
                Some(deployment),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?;
        Ok(UpdateIdentifier {
            stack: stack.clone(),
            kind: UpdateKind::Import,
            update_id: response.update_id,
        })
    }

    /// Encrypt a value in the context of the stack. Input and output are
    /// opaque blobs; encryption happens remotely.
    pub async fn encrypt_value(&self, stack: &StackIdentifier, plaintext: String) -> Result<String> {
        let response: EncryptValueResponse = self
            .caller()
            .call(
                Method::POST,
                &stack_path(stack, &["encrypt"]),
                &[],
                Some(&EncryptValueRequest { plaintext }),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?;
        Ok(response.ciphertext)
    }

    /// Decrypt a value in the context of the stack.
    pub async fn decrypt_value(&self, stack: &StackIdentifier, ciphertext: String) -> Result<String> {
        let response: DecryptValueResponse = self
            .caller()
            .call(
                Method::POST,
                &stack_path(stack, &["decrypt"]),
                &[],
                Some(&DecryptValueRequest { ciphertext }),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?;
        Ok(response.plaintext)
    }
}
