//! Lifecycle owner that bound camera sessions follow.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

/// State of a [`LifecycleOwner`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created but never started.
    #[default]
    Initialized,
    /// Active: bound use-cases should run.
    Started,
    /// Inactive: bound use-cases should pause.
    Stopped,
    /// Terminal: bound use-cases are torn down.
    Destroyed,
}

impl LifecycleState {
    /// Whether bound use-cases should be running.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Started)
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<LifecycleState>,
    changed: Condvar,
}

/// Cloneable handle to a lifecycle that camera bindings observe.
///
/// The application drives transitions; binders only read the state and wait
/// for changes. Once destroyed, the owner never leaves that state.
#[derive(Debug, Clone, Default)]
pub struct LifecycleOwner {
    shared: Arc<Shared>,
}

impl LifecycleOwner {
    /// Create an owner in the [`LifecycleState::Initialized`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the owner has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.state() == LifecycleState::Destroyed
    }

    /// Move to [`LifecycleState::Started`]. Returns `false` if destroyed.
    pub fn start(&self) -> bool {
        self.transition(LifecycleState::Started)
    }

    /// Move to [`LifecycleState::Stopped`]. Returns `false` if destroyed.
    pub fn stop(&self) -> bool {
        self.transition(LifecycleState::Stopped)
    }

    /// Move to [`LifecycleState::Destroyed`].
    pub fn destroy(&self) {
        self.transition(LifecycleState::Destroyed);
    }

    fn transition(&self, to: LifecycleState) -> bool {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *state == LifecycleState::Destroyed {
            return false;
        }
        if *state != to {
            debug!(from = ?*state, ?to, "Lifecycle transition");
            *state = to;
            self.shared.changed.notify_all();
        }
        true
    }

    /// Block until the owner is started or destroyed and return that state.
    pub fn wait_until_active(&self) -> LifecycleState {
        let state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = self
            .shared
            .changed
            .wait_while(state, |s| {
                !s.is_active() && *s != LifecycleState::Destroyed
            })
            .unwrap_or_else(PoisonError::into_inner);
        *state
    }

    /// Block until the state differs from `seen` or `timeout` elapses.
    pub fn wait_for_change(&self, seen: LifecycleState, timeout: Duration) -> LifecycleState {
        let state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (state, _) = self
            .shared
            .changed
            .wait_timeout_while(state, timeout, |s| *s == seen)
            .unwrap_or_else(PoisonError::into_inner);
        *state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_transitions() {
        let owner = LifecycleOwner::new();
        assert_eq!(owner.state(), LifecycleState::Initialized);
        assert!(owner.start());
        assert!(owner.state().is_active());
        assert!(owner.stop());
        assert_eq!(owner.state(), LifecycleState::Stopped);
        owner.destroy();
        assert!(owner.is_destroyed());
    }

    #[test]
    fn test_destroyed_is_terminal() {
        let owner = LifecycleOwner::new();
        owner.destroy();
        assert!(!owner.start());
        assert!(!owner.stop());
        assert!(owner.is_destroyed());
    }

    #[test]
    fn test_clones_share_state() {
        let owner = LifecycleOwner::new();
        let observer = owner.clone();
        owner.start();
        assert_eq!(observer.state(), LifecycleState::Started);
    }

    #[test]
    fn test_wait_until_active_wakes_on_start() {
        let owner = LifecycleOwner::new();
        let waiter = owner.clone();
        let handle = thread::spawn(move || waiter.wait_until_active());
        owner.start();
        let state = handle.join().expect("waiter thread panicked");
        assert_eq!(state, LifecycleState::Started);
    }

    #[test]
    fn test_wait_until_active_wakes_on_destroy() {
        let owner = LifecycleOwner::new();
        owner.stop();
        let waiter = owner.clone();
        let handle = thread::spawn(move || waiter.wait_until_active());
        owner.destroy();
        let state = handle.join().expect("waiter thread panicked");
        assert_eq!(state, LifecycleState::Destroyed);
    }

    #[test]
    fn test_wait_for_change_times_out() {
        let owner = LifecycleOwner::new();
        let state = owner.wait_for_change(LifecycleState::Initialized, Duration::from_millis(10));
        assert_eq!(state, LifecycleState::Initialized);
    }
}
