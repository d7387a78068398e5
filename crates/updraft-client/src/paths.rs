//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST backend binding for the deployment service."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use updraft_api::{StackIdentifier, UpdateIdentifier};

/// Path to a stack root, with optional trailing components.
pub(crate) fn stack_path(stack: &StackIdentifier, components: &[&str]) -> String {
    let mut path = format!(
        "/api/stacks/{}/{}/{}",
        stack.owner, stack.project, stack.stack
    );
    for component in components {
        path.push('/');
        path.push_str(component);
    }
    path
}

/// Path to the project root a stack is created under.
pub(crate) fn project_path(stack: &StackIdentifier) -> String {
    format!("/api/stacks/{}/{}", stack.owner, stack.project)
}

/// Path to an update root, with optional trailing components.
pub(crate) fn update_path(update: &UpdateIdentifier, components: &[&str]) -> String {
    let mut path = stack_path(&update.stack, &["updates", &update.update_id]);
    for component in components {
        path.push('/');
        path.push_str(component);
    }
    path
}
