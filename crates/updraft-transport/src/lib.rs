//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST transport adapter for the deployment backend."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
//! The transport adapter underneath every backend interaction: issue an
//! authenticated REST call, get back a typed result or a typed error.
//! Operation authors declare idempotence per call; only calls declared
//! retry-safe are ever retried.

mod call;
mod error;

pub use call::{AccessToken, CallOptions, Idempotency, RestCaller, RetryPolicy};
pub use error::TransportError;
pub use reqwest::Method;
