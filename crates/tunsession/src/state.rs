//! Lifecycle states and the operations that move between them.

use std::fmt;

/// Lifecycle state of a tunnel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LifecycleState {
    /// No configuration stored, no device.
    #[default]
    Uninitialized,
    /// Configuration stored, device not yet created.
    Initialized,
    /// Device open, configured and up.
    Running,
    /// Device closed, configuration retained for a restart.
    Stopped,
    /// Unrecoverable internal fault. Reserved; no transition enters it.
    Error,
}

impl LifecycleState {
    /// Get the state name.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Error => "error",
        }
    }

    /// Check whether `operation` is legal from this state.
    ///
    /// `cleanup` is legal everywhere; `read`/`write` only while running.
    pub fn permits(&self, operation: Operation) -> bool {
        use LifecycleState::*;
        match operation {
            Operation::Init => matches!(self, Uninitialized | Stopped),
            Operation::Start => matches!(self, Initialized | Stopped),
            Operation::Stop | Operation::Read | Operation::Write => *self == Running,
            Operation::Cleanup => true,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Public operations on a tunnel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Init,
    Start,
    Stop,
    Cleanup,
    Read,
    Write,
}

impl Operation {
    /// Get the operation name.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Cleanup => "cleanup",
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [LifecycleState; 5] = [
        LifecycleState::Uninitialized,
        LifecycleState::Initialized,
        LifecycleState::Running,
        LifecycleState::Stopped,
        LifecycleState::Error,
    ];

    #[test]
    fn test_transition_table() {
        use LifecycleState::*;

        assert!(Uninitialized.permits(Operation::Init));
        assert!(Initialized.permits(Operation::Start));
        assert!(Running.permits(Operation::Stop));
        assert!(Stopped.permits(Operation::Start));
        assert!(Stopped.permits(Operation::Init));

        assert!(!Initialized.permits(Operation::Init));
        assert!(!Running.permits(Operation::Init));
        assert!(!Running.permits(Operation::Start));
        assert!(!Uninitialized.permits(Operation::Start));
        assert!(!Initialized.permits(Operation::Stop));
        assert!(!Stopped.permits(Operation::Stop));
    }

    #[test]
    fn test_cleanup_legal_everywhere() {
        for state in ALL_STATES {
            assert!(state.permits(Operation::Cleanup));
        }
    }

    #[test]
    fn test_io_only_while_running() {
        for state in ALL_STATES {
            let running = state == LifecycleState::Running;
            assert_eq!(state.permits(Operation::Read), running);
            assert_eq!(state.permits(Operation::Write), running);
        }
    }

    #[test]
    fn test_error_state_is_terminal() {
        let state = LifecycleState::Error;
        assert!(!state.permits(Operation::Init));
        assert!(!state.permits(Operation::Start));
        assert!(!state.permits(Operation::Stop));
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecycleState::Running.to_string(), "running");
        assert_eq!(Operation::Cleanup.to_string(), "cleanup");
    }
}
