//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Update session lifecycle, lease renewal, and checkpointing."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use updraft_api::UpdateIdentifier;
use updraft_common::metrics::LEASE_RENEWALS_TOTAL;

use crate::backend::UpdateBackend;
use crate::error::{BackendError, Result};

/// Opaque, time-bounded token authorizing mutating calls for one update.
///
/// The renewal loop is the sole writer; every other call site reads the
/// freshest value through a [`LeaseReader`].
#[derive(Clone, PartialEq, Eq)]
pub struct LeaseToken(String);

impl LeaseToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LeaseToken {
    // Token values are credentials; keep them out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LeaseToken(..)")
    }
}

#[derive(Debug, Clone)]
enum LeaseState {
    Active(LeaseToken),
    Expired,
}

/// Read side of the lease cell.
#[derive(Debug, Clone)]
pub struct LeaseReader {
    state: watch::Receiver<LeaseState>,
}

impl LeaseReader {
    /// The freshest token, or [`BackendError::LeaseExpired`] once renewal
    /// has failed past the lease deadline.
    pub fn current(&self) -> Result<LeaseToken> {
        match &*self.state.borrow() {
            LeaseState::Active(token) => Ok(token.clone()),
            LeaseState::Expired => Err(BackendError::LeaseExpired),
        }
    }
}

/// Background task keeping the lease valid for the whole `Running` window.
///
/// Renews at half the lease duration. A renewal that cannot succeed before
/// the lease's hard deadline flips the shared cell to expired and stops the
/// loop; it never keeps sending doomed requests.
#[derive(Debug)]
pub struct LeaseKeeper {
    state: watch::Receiver<LeaseState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LeaseKeeper {
    /// Spawn the renewal loop holding `initial` as the current token.
    pub fn spawn(
        backend: Arc<dyn UpdateBackend>,
        update: UpdateIdentifier,
        initial: LeaseToken,
        duration: Duration,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(LeaseState::Active(initial.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(renewal_loop(
            backend,
            update,
            state_tx,
            shutdown_rx,
            initial,
            duration,
        ));
        Self {
            state: state_rx,
            shutdown: shutdown_tx,
            task,
        }
    }

    /// Handle for reading the freshest token.
    pub fn reader(&self) -> LeaseReader {
        LeaseReader {
            state: self.state.clone(),
        }
    }

    /// Stop renewing and wait for the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn renewal_loop(
    backend: Arc<dyn UpdateBackend>,
    update: UpdateIdentifier,
    state_tx: watch::Sender<LeaseState>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut token: LeaseToken,
    duration: Duration,
) {
    let renew_interval = duration / 2;
    let failure_pause = (renew_interval / 4).max(Duration::from_millis(50));
    let mut deadline = Instant::now() + duration;
    let mut next_attempt = Instant::now() + renew_interval;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!(update = %update, "lease keeper stopping");
                break;
            }
            _ = tokio::time::sleep_until(next_attempt) => {
                match backend.renew_lease(&update, &token, duration).await {
                    Ok(new_token) => {
                        deadline = Instant::now() + duration;
                        next_attempt = Instant::now() + renew_interval;
                        token = new_token.clone();
                        LEASE_RENEWALS_TOTAL.inc();
                        debug!(update = %update, "lease renewed");
                        if state_tx.send(LeaseState::Active(new_token)).is_err() {
                            // every reader is gone; nothing left to renew for
                            break;
                        }
                    }
                    Err(err) if Instant::now() >= deadline => {
                        warn!(update = %update, error = %err, "lease expired; halting renewals");
                        let _ = state_tx.send(LeaseState::Expired);
                        break;
                    }
                    Err(err) => {
                        warn!(update = %update, error = %err, "lease renewal failed; retrying before expiry");
                        next_attempt = Instant::now() + failure_pause;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StackBackend;
    use crate::session::UpdateSession;
    use crate::testing::{minimal_program_request, MockBackend};
    use updraft_api::wire::TagMap;
    use updraft_api::{StackIdentifier, UpdateKind};
    use updraft_transport::TransportError;

    async fn started_update(mock: &Arc<MockBackend>) -> (UpdateIdentifier, LeaseToken) {
        let stack = StackIdentifier::new("acme", "website", "prod");
        mock.create_stack(&stack, TagMap::new()).await.unwrap();
        let session = UpdateSession::create(
            mock.clone(),
            stack,
            UpdateKind::Update,
            minimal_program_request(),
        )
        .await
        .unwrap();
        let update = session.update().clone();
        let started = session.start(TagMap::new()).await.unwrap();
        let token = started.token().clone();
        (update, token)
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_rotates_the_token() {
        let mock = Arc::new(MockBackend::new());
        let (update, token) = started_update(&mock).await;

        let keeper = LeaseKeeper::spawn(
            mock.clone(),
            update.clone(),
            token.clone(),
            Duration::from_secs(60),
        );
        let reader = keeper.reader();

        tokio::time::sleep(Duration::from_secs(31)).await;

        let fresh = reader.current().unwrap();
        assert_ne!(fresh.as_str(), token.as_str());
        assert_eq!(
            mock.current_token(&update.update_id).as_deref(),
            Some(fresh.as_str())
        );
        keeper.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stale_token_is_rejected_once_rotated() {
        let mock = Arc::new(MockBackend::new());
        let (update, initial) = started_update(&mock).await;

        // First renewal succeeds and rotates the backend's current token.
        let fresh = mock
            .renew_lease(&update, &initial, Duration::from_secs(60))
            .await
            .unwrap();
        assert_ne!(fresh.as_str(), initial.as_str());

        // Renewing with the superseded token is an auth failure.
        let err = mock
            .renew_lease(&update, &initial, Duration::from_secs(60))
            .await
            .unwrap_err();
        match err {
            BackendError::Transport(TransportError::Api { status, .. }) => {
                assert_eq!(status, 401, "stale token surfaces as an auth rejection");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_failure_past_deadline_expires_the_lease() {
        let mock = Arc::new(MockBackend::new());
        let (update, token) = started_update(&mock).await;
        mock.set_fail_renewals(true);

        let keeper = LeaseKeeper::spawn(mock.clone(), update, token, Duration::from_secs(60));
        let reader = keeper.reader();

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(matches!(
            reader.current(),
            Err(BackendError::LeaseExpired)
        ));
        keeper.stop().await;
    }
}
