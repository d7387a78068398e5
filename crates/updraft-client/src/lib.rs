//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST backend binding for the deployment service."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
//! REST binding of the Updraft backend capabilities. [`RestBackend`]
//! implements the `updraft-core` traits over the transport adapter and adds
//! the stack, deployment, account, and policy pack operations that sit
//! outside a single update's lifecycle.

mod paths;
mod policy;
mod service;
mod stacks;
mod updates;

use std::time::Duration;

use parking_lot::Mutex;

use updraft_common::config::ClientConfig;
use updraft_transport::{AccessToken, RestCaller, RetryPolicy, TransportError};

pub use service::CliVersionInfo;
pub use stacks::ListStacksFilter;

/// REST client for the deployment backend.
///
/// Holds the account token; lease-authorized calls receive their token per
/// call from the session's lease reader.
#[derive(Debug)]
pub struct RestBackend {
    caller: RestCaller,
    account: AccessToken,
    user: Mutex<Option<String>>,
}

impl RestBackend {
    /// Construct a backend client from explicit parts.
    pub fn new(
        api_url: impl Into<String>,
        account_token: impl Into<String>,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            caller: RestCaller::new(api_url, request_timeout, retry)?,
            account: AccessToken::Account(account_token.into()),
            user: Mutex::new(None),
        })
    }

    /// Construct a backend client from loaded configuration, resolving the
    /// account token from the configured environment variable.
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let token = config.resolve_access_token()?;
        Ok(Self::new(
            config.api_url.clone(),
            token,
            config.request_timeout,
            RetryPolicy::from(&config.retry),
        )?)
    }

    /// Base URL of the backend this client talks to.
    pub fn api_url(&self) -> &str {
        self.caller.api_url()
    }

    pub(crate) fn caller(&self) -> &RestCaller {
        &self.caller
    }

    pub(crate) fn account(&self) -> &AccessToken {
        &self.account
    }

    pub(crate) fn cached_user(&self) -> &Mutex<Option<String>> {
        &self.user
    }
}
