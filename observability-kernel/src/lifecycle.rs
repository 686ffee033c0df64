//! Lifecycle state machine for the observability extension.

use thiserror::Error;
use tracing::debug;

/// States the extension moves through while the host platform runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionState {
    /// Extension object built; nothing hooked into the host yet.
    Constructed,
    /// Hooks are installed; no background work is running.
    Loaded,
    /// Trace files are open and the scheduler is flushing them.
    Running,
    /// Scheduler stopped and trace files closed.
    Stopped,
}

impl ExtensionState {
    /// Returns `true` while background work is running.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` once the extension stopped.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Host notifications that drive lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The host loaded the extension.
    Load,
    /// The host finished starting and is serving requests.
    Start,
    /// The host is shutting down.
    Shutdown,
}

/// Tracks the state of one named extension.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    name: String,
    state: ExtensionState,
}

impl Lifecycle {
    /// Starts tracking an extension in [`ExtensionState::Constructed`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ExtensionState::Constructed,
        }
    }

    /// Returns the extension name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ExtensionState {
        self.state
    }

    /// Returns the state `event` would lead to, without applying it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn check(&self, event: LifecycleEvent) -> LifecycleResult<ExtensionState> {
        match (self.state, event) {
            (ExtensionState::Constructed, LifecycleEvent::Load) => Ok(ExtensionState::Loaded),
            (ExtensionState::Loaded, LifecycleEvent::Start) => Ok(ExtensionState::Running),
            (_, LifecycleEvent::Shutdown) => Ok(ExtensionState::Stopped),
            _ => Err(LifecycleError::InvalidTransition {
                extension: self.name.clone(),
                from: self.state,
                event,
            }),
        }
    }

    /// Applies a lifecycle event, returning the resulting state.
    ///
    /// Shutdown is accepted from every state; repeating it is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: LifecycleEvent) -> LifecycleResult<ExtensionState> {
        let next_state = self.check(event)?;
        if next_state != self.state {
            debug!(
                extension = %self.name,
                ?self.state,
                ?next_state,
                ?event,
                "extension lifecycle transition"
            );
            self.state = next_state;
        }

        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid lifecycle transition from {from:?} via {event:?} for extension {extension}")]
    InvalidTransition {
        /// Name of the extension whose transition failed.
        extension: String,
        /// State prior to the attempted transition.
        from: ExtensionState,
        /// Event that triggered the failure.
        event: LifecycleEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_start_shutdown_flow() {
        let mut lifecycle = Lifecycle::new("observability");

        assert_eq!(lifecycle.state(), ExtensionState::Constructed);
        lifecycle.transition(LifecycleEvent::Load).unwrap();
        assert_eq!(lifecycle.state(), ExtensionState::Loaded);
        lifecycle.transition(LifecycleEvent::Start).unwrap();
        assert!(lifecycle.state().is_running());
        lifecycle.transition(LifecycleEvent::Shutdown).unwrap();
        assert!(lifecycle.state().is_terminal());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut lifecycle = Lifecycle::new("observability");
        lifecycle.transition(LifecycleEvent::Shutdown).unwrap();
        assert_eq!(
            lifecycle.transition(LifecycleEvent::Shutdown).unwrap(),
            ExtensionState::Stopped
        );
    }

    #[test]
    fn start_before_load_errors() {
        let mut lifecycle = Lifecycle::new("observability");
        let err = lifecycle
            .transition(LifecycleEvent::Start)
            .expect_err("start should fail before load");

        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: ExtensionState::Constructed,
                event: LifecycleEvent::Start,
                ..
            }
        ));
    }

    #[test]
    fn check_leaves_the_state_alone() {
        let mut lifecycle = Lifecycle::new("observability");
        lifecycle.transition(LifecycleEvent::Load).unwrap();

        assert_eq!(
            lifecycle.check(LifecycleEvent::Start).unwrap(),
            ExtensionState::Running
        );
        assert_eq!(lifecycle.state(), ExtensionState::Loaded);
        assert!(lifecycle.check(LifecycleEvent::Load).is_err());
    }

    #[test]
    fn stopped_extension_cannot_restart() {
        let mut lifecycle = Lifecycle::new("observability");
        lifecycle.transition(LifecycleEvent::Load).unwrap();
        lifecycle.transition(LifecycleEvent::Shutdown).unwrap();
        assert!(lifecycle.transition(LifecycleEvent::Start).is_err());
        assert!(lifecycle.transition(LifecycleEvent::Load).is_err());
    }
}
