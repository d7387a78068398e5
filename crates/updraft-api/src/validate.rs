//! ---
//! updraft_section: "02-api-data-model"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Identifier and wire model definitions."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use indexmap::IndexMap;

/// Maximum permitted stack name length.
pub const MAX_STACK_NAME_LENGTH: usize = 100;
/// Maximum permitted tag name length.
pub const MAX_TAG_NAME_LENGTH: usize = 40;
/// Maximum permitted tag value length.
pub const MAX_TAG_VALUE_LENGTH: usize = 256;

/// Validation failures for stack names and tags.
///
/// These are fatal to the attempted call and are raised before any request
/// leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Stack name is empty, too long, or contains forbidden characters.
    #[error("invalid stack name {name:?}: {reason}")]
    StackName { name: String, reason: String },
    /// Tag name is empty or too long.
    #[error("invalid tag name {name:?}: {reason}")]
    TagName { name: String, reason: String },
    /// Tag value exceeds the permitted length.
    #[error("invalid value for tag {name:?}: {reason}")]
    TagValue { name: String, reason: String },
}

/// Validate a stack name: 1..=100 characters drawn from alphanumerics,
/// hyphens, underscores, and periods.
pub fn validate_stack_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::StackName {
            name: name.to_owned(),
            reason: "may not be empty".to_owned(),
        });
    }
    if name.len() > MAX_STACK_NAME_LENGTH {
        return Err(ValidationError::StackName {
            name: name.to_owned(),
            reason: format!("may not exceed {MAX_STACK_NAME_LENGTH} characters"),
        });
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ValidationError::StackName {
            name: name.to_owned(),
            reason: format!("character {bad:?} is not allowed"),
        });
    }
    Ok(())
}

/// Validate a replacement tag set.
pub fn validate_stack_tags(tags: &IndexMap<String, String>) -> Result<(), ValidationError> {
    for (name, value) in tags {
        if name.is_empty() {
            return Err(ValidationError::TagName {
                name: name.clone(),
                reason: "may not be empty".to_owned(),
            });
        }
        if name.len() > MAX_TAG_NAME_LENGTH {
            return Err(ValidationError::TagName {
                name: name.clone(),
                reason: format!("may not exceed {MAX_TAG_NAME_LENGTH} characters"),
            });
        }
        if value.len() > MAX_TAG_VALUE_LENGTH {
            return Err(ValidationError::TagValue {
                name: name.clone(),
                reason: format!("may not exceed {MAX_TAG_VALUE_LENGTH} characters"),
            });
        }
    }
    Ok(())
}

/// Validate the combination submitted with create-stack and start-update.
pub fn validate_stack_properties(
    stack_name: &str,
    tags: &IndexMap<String, String>,
) -> Result<(), ValidationError> {
    validate_stack_name(stack_name)?;
    validate_stack_tags(tags)
}
