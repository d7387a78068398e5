//! ---
//! updraft_section: "02-api-data-model"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Identifier and wire model definitions."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
//! Strongly typed identifiers and the JSON wire model exchanged with the
//! deployment backend. All payload types are plain serde models; the
//! transport and session layers decide how they travel.

pub mod identifiers;
pub mod validate;
pub mod wire;

pub use identifiers::{StackIdentifier, UpdateIdentifier, UpdateKind};
pub use validate::{
    validate_stack_name, validate_stack_properties, validate_stack_tags, ValidationError,
};
