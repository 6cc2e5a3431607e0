//! Auth signal source for the identity sync subsystem.
//!
//! This crate defines the identity types supplied by the external auth
//! provider and an explicit observer registration seam for propagating auth
//! state changes. The provider's client SDK (or whatever host layer wraps
//! it) publishes an [`AuthSnapshot`] on every change; registered observers
//! re-evaluate on each publish.
//!
//! The source is deliberately decoupled from any UI lifecycle: hosts call
//! [`AuthSignalSource::publish`] from wherever their auth state change
//! callback fires.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// The authenticated user's stable attributes, as supplied by the external
/// auth provider.
///
/// Immutable from the reconciler's perspective within one session: the
/// subsystem treats whatever attributes arrive with the first admitted
/// signal as the session's truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque stable identifier, unique per user.
    pub id: String,
    /// Primary email address, if the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_email: Option<String>,
    /// Display name, if the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A point-in-time view of the auth provider's state.
///
/// `is_loaded` is false while the provider is still initializing; consumers
/// must not act on the identity field until it is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    /// The signed-in identity, or None when unauthenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    /// Whether the auth provider has finished loading its state.
    pub is_loaded: bool,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}

impl AuthSnapshot {
    /// The provider is still initializing; nothing is known yet.
    pub fn loading() -> Self {
        Self {
            identity: None,
            is_loaded: false,
        }
    }

    /// The provider finished loading and a user is signed in.
    pub fn signed_in(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            is_loaded: true,
        }
    }

    /// The provider finished loading with no signed-in user.
    pub fn signed_out() -> Self {
        Self {
            identity: None,
            is_loaded: true,
        }
    }

    /// Returns true if the provider is loaded and a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.is_loaded && self.identity.is_some()
    }
}

/// Observer of auth state changes.
///
/// Implementors receive every published snapshot, including duplicates.
/// Deduplication is the observer's responsibility; the source makes no
/// guarantee beyond in-order delivery per observer.
pub trait AuthSignalObserver: Send + Sync {
    /// Called on every published auth state change.
    ///
    /// Must not block: observers that need to do real work should hand the
    /// snapshot off to their own queue.
    fn auth_state_changed(&self, snapshot: AuthSnapshot);
}

/// An observer that discards all snapshots.
///
/// Useful as a placeholder while wiring hosts up.
#[derive(Debug, Default)]
pub struct NullObserver;

impl AuthSignalObserver for NullObserver {
    fn auth_state_changed(&self, _snapshot: AuthSnapshot) {}
}

/// An observer that records all snapshots for testing.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    snapshots: Mutex<Vec<AuthSnapshot>>,
}

impl RecordingObserver {
    /// Creates a new recording observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded snapshots.
    pub fn snapshots(&self) -> Vec<AuthSnapshot> {
        self.snapshots.lock().expect("lock poisoned").clone()
    }

    /// Returns the number of recorded snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.lock().expect("lock poisoned").len()
    }

    /// Returns true if no snapshots have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuthSignalObserver for RecordingObserver {
    fn auth_state_changed(&self, snapshot: AuthSnapshot) {
        self.snapshots
            .lock()
            .expect("lock poisoned")
            .push(snapshot);
    }
}

/// Observer list and latest snapshot, guarded together so registration
/// orders with publish.
#[derive(Default)]
struct SourceState {
    observers: Vec<Arc<dyn AuthSignalObserver>>,
    current: AuthSnapshot,
}

/// Fan-out publisher for auth state changes.
///
/// Owns the registered observers and the latest published snapshot. Hosts
/// hold one source per session and publish into it from their auth
/// provider's change callback.
///
/// # Thread Safety
///
/// Registration and publish may happen from different threads; observer
/// callbacks run on the publishing thread, in registration order. The
/// catch-up delivery and the registration itself happen atomically with
/// respect to publishes, so a newly registered observer receives every
/// snapshot exactly once: either through catch-up or through the fan-out,
/// never neither.
#[derive(Default)]
pub struct AuthSignalSource {
    state: Mutex<SourceState>,
}

impl AuthSignalSource {
    /// Creates a new source with no observers, in the loading state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for all future publishes.
    ///
    /// The observer immediately receives the current snapshot so that late
    /// registration cannot miss an already-published sign-in. The catch-up
    /// call runs under the source's internal lock; observers must not call
    /// back into the source from the callback.
    pub fn register(&self, observer: Arc<dyn AuthSignalObserver>) {
        let mut state = self.state.lock().expect("lock poisoned");
        observer.auth_state_changed(state.current.clone());
        state.observers.push(observer);
    }

    /// Publishes a snapshot to all registered observers.
    pub fn publish(&self, snapshot: AuthSnapshot) {
        debug!(
            is_loaded = snapshot.is_loaded,
            authenticated = snapshot.identity.is_some(),
            "publishing auth snapshot"
        );
        // Store and take the observer list under one lock so concurrent
        // registration either catches up with this snapshot or lands in
        // the list before the fan-out below.
        let observers = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.current = snapshot.clone();
            state.observers.clone()
        };
        for observer in observers {
            observer.auth_state_changed(snapshot.clone());
        }
    }

    /// Returns the most recently published snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.lock().expect("lock poisoned").current.clone()
    }
}
