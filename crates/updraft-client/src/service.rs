//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST backend binding for the deployment service."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use serde::de::Error as _;

use updraft_api::wire::{CliVersionResponse, ServiceUserResponse};
use updraft_core::Result;
use updraft_transport::{CallOptions, Method, TransportError};

use crate::RestBackend;

/// CLI version guidance advertised by the service.
#[derive(Debug, Clone)]
pub struct CliVersionInfo {
    /// Newest released version.
    pub latest: semver::Version,
    /// Oldest version that does not trigger an upgrade warning.
    pub oldest_without_warning: semver::Version,
}

fn decode_error(message: &str) -> TransportError {
    TransportError::Decode(serde_json::Error::custom(message))
}

impl RestBackend {
    /// Account name implied by the configured access token. Resolved once
    /// and cached for the lifetime of this client.
    pub async fn get_account_name(&self) -> Result<String> {
        if let Some(user) = self.cached_user().lock().clone() {
            return Ok(user);
        }
        let response: ServiceUserResponse = self
            .caller()
            .call(
                Method::GET,
                "/api/user",
                &[],
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await?;
        if response.github_login.is_empty() {
            return Err(decode_error("response missing githubLogin").into());
        }
        *self.cached_user().lock() = Some(response.github_login.clone());
        Ok(response.github_login)
    }

    /// Version guidance for client binaries: the newest release and the
    /// oldest release that should not warn about upgrading.
    pub async fn get_cli_version_info(&self) -> Result<CliVersionInfo> {
        let response: CliVersionResponse = self
            .caller()
            .call(
                Method::GET,
                "/api/cli/version",
                &[],
                Option::<&()>::None,
                self.account(),
                CallOptions::retryable(),
            )
            .await?;
        let latest = semver::Version::parse(response.latest_version.trim_start_matches('v'))
            .map_err(|err| decode_error(&format!("invalid latestVersion: {err}")))?;
        let oldest_without_warning = semver::Version::parse(
            response.oldest_without_warning.trim_start_matches('v'),
        )
        .map_err(|err| decode_error(&format!("invalid oldestWithoutWarning: {err}")))?;
        Ok(CliVersionInfo {
            latest,
            oldest_without_warning,
        })
    }
}
