//! ---
//! updraft_section: "02-api-data-model"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Identifier and wire model definitions."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
//! JSON payloads exchanged with the deployment backend. Field names follow
//! the backend's camelCase wire contract.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::identifiers::UpdateKind;

/// Checkpoint schema version for the current protocol generation. Constant
/// per generation; not a sequence number the client advances.
pub const CHECKPOINT_VERSION: u16 = 3;

/// Structured error body returned by the backend on rejected calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code echoed in the body.
    pub code: u16,
    /// Machine-readable-ish message describing the rejection.
    pub message: String,
}

/// A single configuration entry, tagged plaintext-or-secret.
///
/// Secret values are opaque ciphertext; this client only forwards them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    /// Raw value, or ciphertext when `secret` is set.
    #[serde(rename = "string")]
    pub value: String,
    /// Whether the value is an encrypted secret.
    pub secret: bool,
}

impl ConfigValue {
    /// A plaintext configuration value.
    pub fn plaintext(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: false,
        }
    }

    /// An encrypted configuration value carried opaquely.
    pub fn secret(ciphertext: impl Into<String>) -> Self {
        Self {
            value: ciphertext.into(),
            secret: true,
        }
    }
}

/// Mapping from configuration key to tagged value.
pub type ConfigMap = IndexMap<String, ConfigValue>;

/// Replacement tag set for a stack.
pub type TagMap = IndexMap<String, String>;

// --- stacks -----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStackRequest {
    pub stack_name: String,
    #[serde(default)]
    pub tags: TagMap,
}

/// Stack record as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub org_name: String,
    pub project_name: String,
    pub stack_name: String,
    #[serde(default)]
    pub tags: TagMap,
}

/// Abbreviated stack record used in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackSummary {
    pub org_name: String,
    pub project_name: String,
    pub stack_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListStacksResponse {
    pub stacks: Vec<StackSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackRenameRequest {
    pub new_name: String,
}

/// Deployment snapshot in its raw exported form, tagged with the schema
/// version it was produced under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntypedDeployment {
    pub version: u16,
    pub deployment: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStackResponse {
    #[serde(rename = "updateID")]
    pub update_id: String,
}

// --- updates ----------------------------------------------------------------

/// Program metadata and options submitted when creating an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgramRequest {
    pub name: String,
    pub runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: ConfigMap,
    pub options: UpdateOptions,
    pub metadata: UpdateMetadata,
}

/// Operational options for an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOptions {
    /// Preview only; make no changes.
    #[serde(default)]
    pub dry_run: bool,
    /// Degree of parallelism the engine may use.
    #[serde(default)]
    pub parallel: u32,
    /// Policy packs that must run locally against this update.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_policy_pack_paths: Vec<String>,
}

/// Caller-supplied annotations recorded with the update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMetadata {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub environment: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgramResponse {
    #[serde(rename = "updateID")]
    pub update_id: String,
    #[serde(default)]
    pub required_policies: Vec<RequiredPolicy>,
}

/// Policy pack the backend requires this update to satisfy. Read-only to the
/// client; passed through to the caller before the update starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredPolicy {
    pub name: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartUpdateRequest {
    #[serde(default)]
    pub tags: TagMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartUpdateResponse {
    /// New version of the stack after the tag replacement.
    pub version: u64,
    /// Lease token authorizing mutating calls for this update.
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewLeaseRequest {
    /// Currently held token.
    pub token: String,
    /// Requested lease duration in seconds.
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewLeaseResponse {
    pub token: String,
}

/// Checkpoint submission. Always carries the entire deployment snapshot,
/// never a diff, which is what makes blind retries safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchCheckpointRequest {
    #[serde(default)]
    pub version: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<JsonValue>,
    #[serde(default)]
    pub is_invalid: bool,
}

impl PatchCheckpointRequest {
    /// A full-snapshot checkpoint write.
    pub fn snapshot(deployment: JsonValue) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            deployment: Some(deployment),
            is_invalid: false,
        }
    }

    /// Marks the stored checkpoint as unusable.
    pub fn invalidate() -> Self {
        Self {
            version: 0,
            deployment: None,
            is_invalid: true,
        }
    }
}

/// Final status reported when completing an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteUpdateRequest {
    pub status: UpdateStatus,
}

/// One engine event. The payload is opaque to this client; the sequence
/// number is the downstream deduplication key for retried batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: JsonValue,
}

/// Ordered batch of engine events shipped in one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineEventBatch {
    pub events: Vec<EngineEvent>,
}

/// Page of recorded events plus the marker to resume from, if any. The
/// backend omits `continuation_token` at end of stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResults {
    pub status: UpdateStatus,
    #[serde(default)]
    pub events: Vec<EngineEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Summary of one past update, as recorded in stack history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub kind: UpdateKind,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub environment: IndexMap<String, String>,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<UpdateStatus>,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetHistoryResponse {
    pub updates: Vec<UpdateInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestUpdateResponse {
    pub info: UpdateInfo,
}

// --- secrets ----------------------------------------------------------------

// Plaintext/ciphertext travel as opaque base64 blobs; the client never
// inspects them.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptValueRequest {
    pub plaintext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptValueResponse {
    pub ciphertext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptValueRequest {
    pub ciphertext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptValueResponse {
    pub plaintext: String,
}

// --- account & service metadata ---------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUserResponse {
    #[serde(default)]
    pub github_login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliVersionResponse {
    pub latest_version: String,
    pub oldest_without_warning: String,
}

// --- policy packs -----------------------------------------------------------

/// One policy within a pack, as advertised at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enforcement_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyPackRequest {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub policies: Vec<PolicySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyPackResponse {
    pub version: u32,
    pub upload_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPolicyPackRequest {
    pub name: String,
    pub version: u32,
}
