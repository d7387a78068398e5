//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST backend binding for the deployment service."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use tracing::info;

use updraft_api::wire::{ApplyPolicyPackRequest, CreatePolicyPackRequest, CreatePolicyPackResponse};
use updraft_core::Result;
use updraft_transport::{CallOptions, Method};

use crate::RestBackend;

fn policy_packs_path(org: &str) -> String {
    format!("/api/orgs/{org}/policypacks")
}

fn apply_path(org: &str, name: &str, version: u32) -> String {
    format!("/api/orgs/{org}/policypacks/{name}/versions/{version}/apply")
}

fn publish_complete_path(org: &str, name: &str, version: u32) -> String {
    format!("/api/orgs/{org}/policypacks/{name}/versions/{version}/complete")
}

impl RestBackend {
    /// Publish a policy pack: register the metadata, upload the archive to
    /// the presigned location the backend hands out, then signal completion.
    /// Returns the published version.
    pub async fn publish_policy_pack(
        &self,
        org: &str,
        request: CreatePolicyPackRequest,
        archive: Vec<u8>,
    ) -> Result<u32> {
        let name = request.name.clone();
        let created: CreatePolicyPackResponse = self
            .caller()
            .call(
                Method::POST,
                &policy_packs_path(org),
                &[],
                Some(&request),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?;
        info!(org, name = %name, version = created.version, "policy pack registered");

        self.caller().put_raw(&created.upload_uri, archive).await?;

        self.caller()
            .call_unit(
                Method::POST,
                &publish_complete_path(org, &name, created.version),
                &[],
                Option::<&()>::None,
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?;
        info!(org, name = %name, version = created.version, "policy pack published");
        Ok(created.version)
    }

    /// Apply a published policy pack version to the organization.
    pub async fn apply_policy_pack(&self, org: &str, name: &str, version: u32) -> Result<()> {
        let request = ApplyPolicyPackRequest {
            name: name.to_owned(),
            version,
        };
        Ok(self
            .caller()
            .call_unit(
                Method::POST,
                &apply_path(org, name, version),
                &[],
                Some(&request),
                self.account(),
                CallOptions::non_retryable(),
            )
            .await?)
    }

    /// Download a policy pack archive from the location recorded in a
    /// required-policy entry.
    pub async fn download_policy_pack(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.caller().get_raw(url).await?)
    }
}
