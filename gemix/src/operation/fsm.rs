//! Command-scoped lifecycle state machine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::GemixError;

/// Where a cluster is within the current command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    /// Nothing done yet
    Pending,

    Stopping,
    Stopped,
    Uninstalling,
    Uninstalled,
    Installing,
    Installed,
    Starting,
    Running,

    /// A stage failed; see [`ClusterFsm::error`]
    Failed,
}

impl ClusterState {
    /// States in which a stage is executing
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ClusterState::Stopping
                | ClusterState::Uninstalling
                | ClusterState::Installing
                | ClusterState::Starting
        )
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterState::Pending => "pending",
            ClusterState::Stopping => "stopping",
            ClusterState::Stopped => "stopped",
            ClusterState::Uninstalling => "uninstalling",
            ClusterState::Uninstalled => "uninstalled",
            ClusterState::Installing => "installing",
            ClusterState::Installed => "installed",
            ClusterState::Starting => "starting",
            ClusterState::Running => "running",
            ClusterState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Stage transitions
#[derive(Debug, Clone)]
pub enum ClusterEvent {
    Stop,
    Stopped,
    Uninstall,
    Uninstalled,
    Install,
    Installed,
    Start,
    Started,

    /// The active stage failed
    Fail(String),
}

/// Tracks stage progress of one lifecycle command
#[derive(Debug, Clone)]
pub struct ClusterFsm {
    state: ClusterState,
    error: Option<String>,
    failed_in: Option<ClusterState>,
}

impl ClusterFsm {
    pub fn new() -> Self {
        Self {
            state: ClusterState::Pending,
            error: None,
            failed_in: None,
        }
    }

    pub fn state(&self) -> ClusterState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The active state the machine was in when it failed
    pub fn failed_in(&self) -> Option<ClusterState> {
        self.failed_in
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ClusterEvent) -> Result<(), GemixError> {
        use ClusterEvent as E;
        use ClusterState as S;

        let new_state = match (self.state, &event) {
            (S::Pending, E::Stop) => S::Stopping,
            (S::Pending, E::Uninstall) => S::Uninstalling,
            (S::Pending, E::Install) => S::Installing,
            (S::Pending, E::Start) => S::Starting,

            (S::Stopping, E::Stopped) => S::Stopped,
            (S::Stopped, E::Uninstall) => S::Uninstalling,
            (S::Stopped, E::Start) => S::Starting,

            (S::Uninstalling, E::Uninstalled) => S::Uninstalled,
            (S::Uninstalled, E::Install) => S::Installing,

            (S::Installing, E::Installed) => S::Installed,
            (S::Installed, E::Start) => S::Starting,

            (S::Starting, E::Started) => S::Running,
            (S::Running, E::Stop) => S::Stopping,

            (state, E::Fail(err)) if state.is_active() => {
                self.error = Some(err.clone());
                self.failed_in = Some(state);
                S::Failed
            }

            (state, event) => {
                return Err(GemixError::Internal(format!(
                    "Invalid transition: {:?} -> {:?}",
                    state, event
                )));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for ClusterFsm {
    fn default() -> Self {
        Self::new()
    }
}
