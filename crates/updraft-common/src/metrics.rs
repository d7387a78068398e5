//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Shared runtime primitives for the Updraft workspace."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

/// Total lease renewals successfully completed across all sessions.
pub static LEASE_RENEWALS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "updraft_lease_renewals_total",
        "Total number of successful update lease renewals"
    )
    .expect("metric registration to succeed")
});

/// Total checkpoint snapshots accepted by the backend.
pub static CHECKPOINT_PATCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "updraft_checkpoint_patches_total",
        "Total number of deployment checkpoints patched"
    )
    .expect("metric registration to succeed")
});

/// Total engine event batches shipped to the backend.
pub static EVENT_BATCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "updraft_event_batches_total",
        "Total number of engine event batches recorded"
    )
    .expect("metric registration to succeed")
});

/// Total transport-level retries of retry-safe calls.
pub static TRANSPORT_RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "updraft_transport_retries_total",
        "Total number of retried transport calls"
    )
    .expect("metric registration to succeed")
});
