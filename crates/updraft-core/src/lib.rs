//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Update session lifecycle, lease renewal, and checkpointing."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
//! The update-session lifecycle core: drive one remote update from creation
//! through lease-backed execution to exactly one terminal state.
//!
//! Everything here talks to the backend through the capability traits in
//! [`backend`]; components receive the backend at construction and never
//! consult process-wide state. The in-memory implementation in [`testing`]
//! exists so lifecycle behaviour can be exercised without a network.

pub mod backend;
pub mod checkpoint;
pub mod error;
pub mod events;
pub mod lease;
pub mod session;
pub mod testing;

pub use backend::{StackBackend, UpdateBackend};
pub use checkpoint::CheckpointWriter;
pub use error::{BackendError, Result};
pub use events::{read_all_events, EventRecorder};
pub use lease::{LeaseKeeper, LeaseReader, LeaseToken};
pub use session::{RunningUpdate, StartedUpdate, TerminalState, UpdateSession};
