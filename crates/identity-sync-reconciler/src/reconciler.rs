//! The reconciler: auth signals in, at-most-one upsert per identity out.
//!
//! Signals arrive through the [`AuthSignalObserver`] callback, land on a
//! bounded queue, and are drained sequentially by a single worker task. The
//! guard's NotStarted → InFlight transition happens synchronously before
//! the upsert is awaited, so duplicate or re-entrant signal delivery can
//! never double-dispatch for the same identity.

use crate::sync_fsm::{SyncGuard, SyncState};
use auth_signal::{AuthSignalObserver, AuthSnapshot};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use user_sync_sink::UserUpserter;

/// Configuration for the reconciler's signal queue.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Capacity of the in-memory signal queue. Signals published while the
    /// queue is full are dropped with a warning; the next auth change
    /// re-delivers the state anyway.
    pub signal_queue_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            signal_queue_capacity: 256,
        }
    }
}

/// Session-scoped reconciler between the auth provider and the user store.
///
/// On every observed auth signal the reconciler consults its [`SyncGuard`];
/// if the signal is admitted it invokes the [`UserUpserter`] and records the
/// outcome. Failures are recovered locally: they are logged as a
/// `sync_failure` event and leave the identity eligible for retry on the
/// next external signal. No retry is scheduled by the reconciler itself.
///
/// # Lifecycle
///
/// 1. Create with [`IdentitySyncReconciler::new()`]
/// 2. Call [`IdentitySyncReconciler::start()`] to spawn the worker task
/// 3. Register it with an `AuthSignalSource` (or call
///    [`handle_signal`](Self::handle_signal) directly)
/// 4. Drop it at session end; the worker exits once the queue drains
///
/// # Thread Safety
///
/// The guard sits behind a `std::sync::Mutex` that is only held across
/// synchronous state transitions, never across an await.
pub struct IdentitySyncReconciler {
    guard: Arc<Mutex<SyncGuard>>,
    upserter: Arc<dyn UserUpserter>,
    sender: mpsc::Sender<AuthSnapshot>,
    receiver: Mutex<Option<mpsc::Receiver<AuthSnapshot>>>,
}

impl IdentitySyncReconciler {
    /// Creates a new reconciler dispatching through the given upserter.
    pub fn new(config: ReconcilerConfig, upserter: Arc<dyn UserUpserter>) -> Self {
        let (sender, receiver) = mpsc::channel(config.signal_queue_capacity);
        Self {
            guard: Arc::new(Mutex::new(SyncGuard::new())),
            upserter,
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Starts the worker task that drains the signal queue.
    ///
    /// The worker processes signals one at a time and exits when the
    /// reconciler (the only sender) is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn start(&self) {
        let mut receiver = self
            .receiver
            .lock()
            .expect("lock poisoned")
            .take()
            .expect("reconciler already started");

        let guard = self.guard.clone();
        let upserter = self.upserter.clone();

        tokio::spawn(async move {
            while let Some(snapshot) = receiver.recv().await {
                reconcile_snapshot(&guard, upserter.as_ref(), snapshot).await;
            }
            debug!("identity sync worker stopped (channel closed)");
        });
    }

    /// Processes a single auth signal inline.
    ///
    /// Hosts that already run on the reconciler's logical flow (and tests)
    /// can drive signals through here instead of the queue. An admitted
    /// signal awaits the upsert before returning; a rejected one is an
    /// idempotent no-op.
    pub async fn handle_signal(&self, snapshot: AuthSnapshot) {
        reconcile_snapshot(&self.guard, self.upserter.as_ref(), snapshot).await;
    }

    /// Returns the tracked sync state for an identity id.
    pub fn sync_state(&self, identity_id: &str) -> SyncState {
        self.guard
            .lock()
            .expect("lock poisoned")
            .state_of(identity_id)
    }
}

impl AuthSignalObserver for IdentitySyncReconciler {
    /// Enqueues an observed auth signal for the worker.
    ///
    /// Never blocks the publisher. A full queue drops the signal (the
    /// provider's next change carries the same state); a closed queue means
    /// the worker is gone and the session is over.
    fn auth_state_changed(&self, snapshot: AuthSnapshot) {
        match self.sender.try_send(snapshot) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("identity sync signal queue full, dropping signal");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("identity sync worker channel is closed");
            }
        }
    }
}

/// Runs one signal through the guard and, if admitted, through the upserter.
///
/// The guard lock is released before the upsert is awaited and re-acquired
/// only to record the outcome. The structured `sync_success`/`sync_failure`
/// events emitted here are the subsystem's only output besides the upsert
/// call itself; rejected signals produce no events at all.
async fn reconcile_snapshot(
    guard: &Mutex<SyncGuard>,
    upserter: &dyn UserUpserter,
    snapshot: AuthSnapshot,
) {
    let admitted = guard.lock().expect("lock poisoned").should_sync(&snapshot);
    let Some(identity) = admitted else {
        return;
    };

    match upserter.upsert(&identity).await {
        Ok(record) => {
            guard
                .lock()
                .expect("lock poisoned")
                .mark_result(&identity.id, true);
            info!(
                event = "sync_success",
                identity_id = %identity.id,
                last_synced_at = %record.last_synced_at,
                "user record synced"
            );
        }
        Err(err) => {
            guard
                .lock()
                .expect("lock poisoned")
                .mark_result(&identity.id, false);
            warn!(
                event = "sync_failure",
                identity_id = %identity.id,
                error = %err,
                "user record sync failed"
            );
        }
    }
}
