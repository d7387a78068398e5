//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST transport adapter for the deployment backend."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
/// Error type for the transport adapter.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    /// The backend answered with a non-success status. `message` carries the
    /// structured error body when one was present.
    #[error("backend rejected the call ({status}): {message}")]
    Api { status: u16, message: String },
    /// The response body did not match the expected shape.
    #[error("failed decoding backend response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Request body compression failed.
    #[error("failed compressing request body: {0}")]
    Compress(#[from] std::io::Error),
}

impl TransportError {
    /// HTTP status of a backend rejection, when this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a retry of an idempotent call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            TransportError::Decode(_) | TransportError::Compress(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_side_statuses_are_transient() {
        for status in [429, 500, 502, 503, 504] {
            let err = TransportError::Api {
                status,
                message: "unavailable".to_owned(),
            };
            assert!(err.is_transient(), "status {status} should be transient");
        }
    }

    #[test]
    fn client_side_statuses_are_permanent() {
        for status in [400, 401, 403, 404, 409] {
            let err = TransportError::Api {
                status,
                message: "rejected".to_owned(),
            };
            assert!(!err.is_transient(), "status {status} should be permanent");
        }
    }
}
