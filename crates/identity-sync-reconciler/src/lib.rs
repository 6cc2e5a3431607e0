//! # Identity Sync Reconciler
//!
//! Per-session reconciliation between an external auth provider and the
//! downstream user store: when a sign-in signal arrives, guarantee the user
//! record exists and is up to date, exactly once, without duplicate writes
//! under rapid re-delivery and without losing retry eligibility on failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐      ┌──────────────┐
//! │ AuthSignalSource │─────▶│    Reconciler    │─────▶│  User store  │
//! │  (observer seam) │      │ (guard + worker) │      │ (UserUpserter)│
//! └──────────────────┘      └────────┬─────────┘      └──────────────┘
//!                                    │
//!                           ┌────────▼─────────┐
//!                           │    SyncGuard     │
//!                           │ (per-identity    │
//!                           │  state machine)  │
//!                           └──────────────────┘
//! ```
//!
//! ## Key properties
//!
//! - **At most one in-flight upsert per identity**: the guard transitions
//!   to InFlight synchronously before the upsert is awaited.
//! - **Idempotent no-op on replay**: once an identity is Done, repeated
//!   signals produce zero network calls for the rest of the session.
//! - **Signal-driven retry**: a failed upsert reverts the identity to
//!   NotStarted; nothing is rescheduled until the next external signal.
//! - **Local failure recovery**: upsert errors never propagate to the host;
//!   the only observable outputs are structured `sync_success` and
//!   `sync_failure` tracing events.
//!
//! ## Example
//!
//! ```ignore
//! use auth_signal::{AuthSignalSource, AuthSnapshot, Identity};
//! use identity_sync_reconciler::{IdentitySyncReconciler, ReconcilerConfig};
//! use user_sync_sink::UserSyncSink;
//!
//! let sink = Arc::new(UserSyncSink::new(api_url, anon_key));
//! let reconciler = Arc::new(IdentitySyncReconciler::new(
//!     ReconcilerConfig::default(),
//!     sink.clone(),
//! ));
//! reconciler.start();
//!
//! let source = AuthSignalSource::new();
//! source.register(reconciler);
//!
//! // From the auth provider's change callback:
//! source.publish(AuthSnapshot::signed_in(identity));
//! ```

mod reconciler;
mod sync_fsm;

pub use reconciler::{IdentitySyncReconciler, ReconcilerConfig};
pub use sync_fsm::{SyncGuard, SyncMachine, SyncMachineInput, SyncMachineState, SyncState};
