//! Per-identity sync state machine using rust-fsm.
//!
//! This module defines an explicit finite state machine for sync progress,
//! replacing implicit "have we synced yet" flags.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │   NotStarted    │ (initial)
//! └────────┬────────┘
//!          │ Dispatch
//!          ▼
//! ┌─────────────────┐
//! │    InFlight     │
//! └────────┬────────┘
//!          │ Succeeded              Failed
//!          ▼                          │
//! ┌─────────────────┐                 ▼
//! │      Done       │            NotStarted
//! └─────────────────┘       (re-enterable, retry on
//!   (terminal for              the next signal)
//!    the session)
//! ```

use auth_signal::{AuthSnapshot, Identity};
use rust_fsm::*;
use std::collections::HashMap;

// Define the FSM using rust-fsm's declarative macro.
// This generates a module `sync_machine` with:
// - sync_machine::State (enum)
// - sync_machine::Input (enum)
// - sync_machine::StateMachine (type alias)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub sync_machine(NotStarted)

    NotStarted => {
        Dispatch => InFlight
    },
    InFlight => {
        Succeeded => Done,
        Failed => NotStarted
    }
}

// Re-export the generated types with clearer names
pub use sync_machine::Input as SyncMachineInput;
pub use sync_machine::State as SyncMachineState;
pub use sync_machine::StateMachine as SyncMachine;

/// Simplified view of an identity's sync progress for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No upsert has been attempted, or the last one failed.
    NotStarted,
    /// An upsert is currently awaiting completion.
    InFlight,
    /// An upsert succeeded; terminal for the session.
    Done,
}

impl From<&SyncMachineState> for SyncState {
    fn from(state: &SyncMachineState) -> Self {
        match state {
            SyncMachineState::NotStarted => SyncState::NotStarted,
            SyncMachineState::InFlight => SyncState::InFlight,
            SyncMachineState::Done => SyncState::Done,
        }
    }
}

/// Session-scoped admission control for sync attempts.
///
/// Tracks one state machine per identity id and decides whether an incoming
/// auth signal should trigger an upsert. The guard is pure state-table
/// manipulation: it performs no I/O, emits no log events, and has no error
/// conditions.
///
/// The map lives exactly as long as the guard. Dropping it at session end
/// discards all progress, which is what makes a fresh session re-sync.
#[derive(Default)]
pub struct SyncGuard {
    states: HashMap<String, SyncMachine>,
}

impl SyncGuard {
    /// Creates a guard with no tracked identities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a sync attempt should proceed for this snapshot.
    ///
    /// Returns None when the source is not loaded, the identity is absent,
    /// or the identity's state is InFlight or Done. Otherwise transitions
    /// the state to InFlight and returns the identity to upsert.
    ///
    /// The transition happens synchronously, before the caller reaches any
    /// suspension point, so duplicate signal delivery cannot admit a second
    /// in-flight upsert for the same id.
    pub fn should_sync(&mut self, snapshot: &AuthSnapshot) -> Option<Identity> {
        if !snapshot.is_loaded {
            return None;
        }
        let identity = snapshot.identity.as_ref()?;

        let machine = self
            .states
            .entry(identity.id.clone())
            .or_insert_with(SyncMachine::new);
        match machine.consume(&SyncMachineInput::Dispatch) {
            Ok(_) => Some(identity.clone()),
            // InFlight and Done both reject Dispatch.
            Err(_) => None,
        }
    }

    /// Records the outcome of an upsert.
    ///
    /// Success moves InFlight to Done; failure moves InFlight back to
    /// NotStarted so a future signal can retry. Any other combination is
    /// ignored: mark_result is only meaningful after an admission.
    pub fn mark_result(&mut self, identity_id: &str, success: bool) {
        let Some(machine) = self.states.get_mut(identity_id) else {
            return;
        };
        let input = if success {
            SyncMachineInput::Succeeded
        } else {
            SyncMachineInput::Failed
        };
        let _ = machine.consume(&input);
    }

    /// Returns the current sync state for an identity id.
    ///
    /// Identities that have never been admitted report NotStarted.
    pub fn state_of(&self, identity_id: &str) -> SyncState {
        self.states
            .get(identity_id)
            .map(|machine| SyncState::from(machine.state()))
            .unwrap_or(SyncState::NotStarted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            primary_email: None,
            display_name: None,
        }
    }

    #[test]
    fn initial_state_is_not_started() {
        let machine = SyncMachine::new();
        assert_eq!(*machine.state(), SyncMachineState::NotStarted);
    }

    #[test]
    fn dispatch_then_success_reaches_done() {
        let mut machine = SyncMachine::new();
        machine.consume(&SyncMachineInput::Dispatch).unwrap();
        assert_eq!(*machine.state(), SyncMachineState::InFlight);

        machine.consume(&SyncMachineInput::Succeeded).unwrap();
        assert_eq!(*machine.state(), SyncMachineState::Done);
    }

    #[test]
    fn failure_returns_to_not_started() {
        let mut machine = SyncMachine::new();
        machine.consume(&SyncMachineInput::Dispatch).unwrap();
        machine.consume(&SyncMachineInput::Failed).unwrap();
        assert_eq!(*machine.state(), SyncMachineState::NotStarted);
    }

    #[test]
    fn done_rejects_further_dispatch() {
        let mut machine = SyncMachine::new();
        machine.consume(&SyncMachineInput::Dispatch).unwrap();
        machine.consume(&SyncMachineInput::Succeeded).unwrap();

        assert!(machine.consume(&SyncMachineInput::Dispatch).is_err());
        assert_eq!(*machine.state(), SyncMachineState::Done);
    }

    #[test]
    fn guard_rejects_unloaded_source() {
        let mut guard = SyncGuard::new();
        let snapshot = AuthSnapshot {
            identity: Some(identity("u1")),
            is_loaded: false,
        };
        assert!(guard.should_sync(&snapshot).is_none());
        assert_eq!(guard.state_of("u1"), SyncState::NotStarted);
    }

    #[test]
    fn guard_rejects_absent_identity() {
        let mut guard = SyncGuard::new();
        assert!(guard.should_sync(&AuthSnapshot::signed_out()).is_none());
        assert!(guard.should_sync(&AuthSnapshot::loading()).is_none());
    }

    #[test]
    fn guard_admits_first_signal_and_marks_in_flight() {
        let mut guard = SyncGuard::new();
        let admitted = guard.should_sync(&AuthSnapshot::signed_in(identity("u1")));
        assert_eq!(admitted.unwrap().id, "u1");
        assert_eq!(guard.state_of("u1"), SyncState::InFlight);
    }

    #[test]
    fn guard_blocks_while_in_flight() {
        let mut guard = SyncGuard::new();
        let snapshot = AuthSnapshot::signed_in(identity("u1"));
        assert!(guard.should_sync(&snapshot).is_some());
        assert!(guard.should_sync(&snapshot).is_none());
        assert!(guard.should_sync(&snapshot).is_none());
        assert_eq!(guard.state_of("u1"), SyncState::InFlight);
    }

    #[test]
    fn guard_blocks_after_success() {
        let mut guard = SyncGuard::new();
        let snapshot = AuthSnapshot::signed_in(identity("u1"));
        assert!(guard.should_sync(&snapshot).is_some());
        guard.mark_result("u1", true);
        assert_eq!(guard.state_of("u1"), SyncState::Done);
        assert!(guard.should_sync(&snapshot).is_none());
    }

    #[test]
    fn guard_readmits_after_failure() {
        let mut guard = SyncGuard::new();
        let snapshot = AuthSnapshot::signed_in(identity("u2"));
        assert!(guard.should_sync(&snapshot).is_some());
        guard.mark_result("u2", false);
        assert_eq!(guard.state_of("u2"), SyncState::NotStarted);

        // Retry eligibility restored: next signal admits exactly once.
        assert!(guard.should_sync(&snapshot).is_some());
        assert!(guard.should_sync(&snapshot).is_none());
    }

    #[test]
    fn mark_result_for_unknown_identity_is_a_no_op() {
        let mut guard = SyncGuard::new();
        guard.mark_result("never-seen", true);
        assert_eq!(guard.state_of("never-seen"), SyncState::NotStarted);
    }

    #[test]
    fn identities_are_tracked_independently() {
        let mut guard = SyncGuard::new();
        assert!(guard
            .should_sync(&AuthSnapshot::signed_in(identity("u1")))
            .is_some());
        guard.mark_result("u1", true);

        // u1 being Done does not affect u2.
        assert!(guard
            .should_sync(&AuthSnapshot::signed_in(identity("u2")))
            .is_some());
        assert_eq!(guard.state_of("u1"), SyncState::Done);
        assert_eq!(guard.state_of("u2"), SyncState::InFlight);
    }
}
