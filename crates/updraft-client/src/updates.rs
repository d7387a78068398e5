//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST backend binding for the deployment service."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;

use updraft_api::wire::{
    CompleteUpdateRequest, EngineEventBatch, PatchCheckpointRequest, RenewLeaseRequest,
    RenewLeaseResponse, StartUpdateRequest, StartUpdateResponse, TagMap, UpdateProgramRequest,
    UpdateProgramResponse, UpdateResults, UpdateStatus,
};
use updraft_api::{validate_stack_properties, StackIdentifier, UpdateIdentifier, UpdateKind};
use updraft_core::{LeaseToken, Result, UpdateBackend};
use updraft_transport::{AccessToken, CallOptions, Method};

use crate::paths::{stack_path, update_path};
use crate::RestBackend;

#[async_trait]
impl UpdateBackend for RestBackend {
    async fn create_update(
        &self,
        stack: &StackIdentifier,
        kind: UpdateKind,
        request: UpdateProgramRequest,
    ) -> Result<UpdateProgramResponse> {
        Ok(self
            .caller()
            .call(
                Method::POST,
                &stack_path(stack, &[kind.path_segment()]),
                &[],
                Some(&request),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?)
    }

    async fn start_update(
        &self,
        update: &UpdateIdentifier,
        tags: TagMap,
    ) -> Result<StartUpdateResponse> {
        validate_stack_properties(&update.stack.stack, &tags)?;
        Ok(self
            .caller()
            .call(
                Method::POST,
                &update_path(update, &[]),
                &[],
                Some(&StartUpdateRequest { tags }),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?)
    }

    async fn renew_lease(
        &self,
        update: &UpdateIdentifier,
        token: &LeaseToken,
        duration: Duration,
    ) -> Result<LeaseToken> {
        let request = RenewLeaseRequest {
            token: token.as_str().to_owned(),
            duration: duration.as_secs(),
        };
        // Renewal happens many times across a long-running update and the
        // session fails outright when it cannot renew, so the POST is
        // declared retry-safe.
        let response: RenewLeaseResponse = self
            .caller()
            .call(
                Method::POST,
                &update_path(update, &["renew_lease"]),
                &[],
                Some(&request),
                self.account(),
                CallOptions::retryable(),
            )
            .await?;
        Ok(LeaseToken::new(response.token))
    }

    async fn patch_checkpoint(
        &self,
        update: &UpdateIdentifier,
        request: PatchCheckpointRequest,
        token: &LeaseToken,
    ) -> Result<()> {
        // Retry-safe either way: the body is the whole snapshot or the
        // invalidation marker, never a delta. Snapshots can be large, so
        // they travel compressed.
        let options = if request.is_invalid {
            CallOptions::retryable()
        } else {
            CallOptions::retryable_gzip()
        };
        Ok(self
            .caller()
            .call_unit(
                Method::PATCH,
                &update_path(update, &["checkpoint"]),
                &[],
                Some(&request),
                &AccessToken::Lease(token.as_str().to_owned()),
                options,
            )
            .await?)
    }

    async fn cancel_update(&self, update: &UpdateIdentifier) -> Result<()> {
        Ok(self
            .caller()
            .call_unit(
                Method::POST,
                &update_path(update, &["cancel"]),
                &[],
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await?)
    }

    async fn complete_update(
        &self,
        update: &UpdateIdentifier,
        status: UpdateStatus,
        token: &LeaseToken,
    ) -> Result<()> {
        Ok(self
            .caller()
            .call_unit(
                Method::POST,
                &update_path(update, &["complete"]),
                &[],
                Some(&CompleteUpdateRequest { status }),
                &AccessToken::Lease(token.as_str().to_owned()),
                CallOptions::retryable(),
            )
            .await?)
    }

    async fn record_events(
        &self,
        update: &UpdateIdentifier,
        batch: EngineEventBatch,
        token: &LeaseToken,
    ) -> Result<()> {
        Ok(self
            .caller()
            .call_unit(
                Method::POST,
                &update_path(update, &["events", "batch"]),
                &[],
                Some(&batch),
                &AccessToken::Lease(token.as_str().to_owned()),
                CallOptions::retryable_gzip(),
            )
            .await?)
    }

    async fn get_events(
        &self,
        update: &UpdateIdentifier,
        continuation_token: Option<String>,
    ) -> Result<UpdateResults> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(token) = continuation_token {
            query.push(("continuationToken", token));
        }
        Ok(self
            .caller()
            .call(
                Method::GET,
                &update_path(update, &[]),
                &query,
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await?)
    }
}
