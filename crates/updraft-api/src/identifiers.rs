//! ---
//! updraft_section: "02-api-data-model"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Identifier and wire model definitions."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Uniquely names a deployable stack within an organization and project.
///
/// Immutable once constructed; the backend owns the stack's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackIdentifier {
    /// Owning organization.
    pub owner: String,
    /// Project the stack belongs to.
    pub project: String,
    /// Stack name within the project.
    pub stack: String,
}

impl StackIdentifier {
    /// Construct an identifier from raw components.
    pub fn new(
        owner: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            project: project.into(),
            stack: stack.into(),
        }
    }
}

impl fmt::Display for StackIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.project, self.stack)
    }
}

/// The kind of operation an update performs against a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    /// Apply changes to reach the desired deployment state.
    Update,
    /// Dry-run showing the changes an update would make.
    Preview,
    /// Reconcile recorded state with the actual deployment.
    Refresh,
    /// Tear the deployment down.
    Destroy,
    /// Adopt an externally produced deployment snapshot.
    Import,
}

impl UpdateKind {
    /// Endpoint path segment for this kind.
    pub fn path_segment(self) -> &'static str {
        match self {
            UpdateKind::Update => "update",
            UpdateKind::Preview => "preview",
            UpdateKind::Refresh => "refresh",
            UpdateKind::Destroy => "destroy",
            UpdateKind::Import => "import",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Identifies exactly one update attempt against a stack.
///
/// Created once the backend accepts an update request; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateIdentifier {
    /// Target stack.
    pub stack: StackIdentifier,
    /// Operation kind, fixed at creation.
    pub kind: UpdateKind,
    /// Opaque update ID assigned by the backend.
    pub update_id: String,
}

impl fmt::Display for UpdateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.stack, self.kind, self.update_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_identifier_display_joins_components() {
        let stack = StackIdentifier::new("acme", "website", "prod");
        assert_eq!(stack.to_string(), "acme/website/prod");
    }

    #[test]
    fn update_kind_serializes_as_path_segment() {
        for kind in [
            UpdateKind::Update,
            UpdateKind::Preview,
            UpdateKind::Refresh,
            UpdateKind::Destroy,
            UpdateKind::Import,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.path_segment()));
        }
    }
}
