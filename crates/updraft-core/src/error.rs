//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Update session lifecycle, lease renewal, and checkpointing."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use updraft_api::ValidationError;
use updraft_transport::TransportError;

/// Result alias used throughout the lifecycle core.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Error type for backend interactions and session lifecycle violations.
///
/// Distinguished backend conditions get their own variants so callers can
/// branch on them instead of inspecting strings.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Malformed stack name or tags; raised before any request is sent and
    /// never retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The stack has no deployment history yet. First-run callers branch on
    /// this rather than treating it as failure.
    #[error("no previous deployment")]
    NoPreviousDeployment,
    /// Delete was refused because the stack still contains resources;
    /// recoverable by retrying with force.
    #[error("stack still contains resources")]
    StackHasResources,
    /// The update lease could not be renewed before it expired. Fatal to the
    /// session: no further mutating calls are authorized.
    #[error("update lease expired")]
    LeaseExpired,
    /// The session already reached a terminal state and refuses further
    /// checkpoint or event submissions.
    #[error("update session is closed")]
    Closed,
    /// Any other transport or backend failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl BackendError {
    /// Auth-style rejection of a stale lease token, as the backend surfaces it.
    pub fn stale_token() -> Self {
        BackendError::Transport(TransportError::Api {
            status: 401,
            message: "update access token expired".to_owned(),
        })
    }
}
