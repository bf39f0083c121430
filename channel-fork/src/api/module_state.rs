//! Externally reported module state and stop reasons.

use std::fmt::{Display, Formatter};

/// Lifecycle state published under the `module-state` attribute.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EngineState {
    Starting,
    Running,
    Error,
    Stopped,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Starting => "STARTING",
            EngineState::Running => "RUNNING",
            EngineState::Error => "ERROR",
            EngineState::Stopped => "STOPPED",
        }
    }

    /// `true` for the states a run ends in.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Error | EngineState::Stopped)
    }
}

impl Display for EngineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a running module was asked to stop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StopReason {
    UserDirected,
    NodeShutdown,
    EndOfInput,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StopReason::UserDirected => "USER_DIRECTED",
            StopReason::NodeShutdown => "NODE_SHUTDOWN",
            StopReason::EndOfInput => "END_OF_INPUT",
        };
        f.write_str(label)
    }
}
