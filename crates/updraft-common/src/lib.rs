//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Shared runtime primitives for the Updraft workspace."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
//! Shared runtime primitives for the Updraft client workspace.
//! This crate exposes configuration loading, tracing initialisation, and
//! operation counters consumed across the workspace.

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{ClientConfig, LeaseConfig, LoadedClientConfig, LoggingConfig, RetryConfig};
pub use logging::{init_tracing, LogFormat};
