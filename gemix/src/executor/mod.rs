//! Remote execution capability
//!
//! Everything gemix does on a target host goes through an [`Executor`]. The
//! production implementation shells out to the system `ssh`/`scp` binaries;
//! tests plug in an in-memory double through the [`Connector`] seam.

pub mod actions;
pub mod commands;
pub mod pool;
pub mod ssh;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::GemixError;
use crate::executor::ssh::RemoteHost;

/// Direction of a file transfer, seen from the control machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Output of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Trimmed stdout
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Runs commands and moves files on one host
#[async_trait]
pub trait Executor: Send + Sync {
    /// Host this executor is bound to
    fn host(&self) -> &str;

    /// Run `cmd` on the host. A non-zero exit status is an error carrying stderr.
    async fn execute(&self, cmd: &str, sudo: bool) -> Result<CommandOutput, GemixError>;

    /// Copy `src` to `dst`
    async fn transfer(&self, src: &str, dst: &str, direction: Direction)
        -> Result<(), GemixError>;
}

/// Opens executors for hosts
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a session with `host`, failing with a connection error when
    /// the host cannot be reached or authentication is rejected.
    async fn connect(&self, host: &RemoteHost) -> Result<Arc<dyn Executor>, GemixError>;
}
