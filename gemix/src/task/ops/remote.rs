//! Leaves that act on a remote host through its executor

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::GemixError;
use crate::executor::commands::{gen_mkdir_command, gen_remove_dir_command, gen_user_create_command};
use crate::executor::ssh::RemoteHost;
use crate::task::{Task, TaskContext};

/// Paths uninstall never removes
const PROTECTED_DIRS: [&str; 2] = ["/", "/root"];

/// Opens a session to a host and registers it in the executor pool
pub struct SshConnect {
    host: RemoteHost,
}

impl SshConnect {
    pub fn new(host: RemoteHost) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Task for SshConnect {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        if ctx.executors().contains(&self.host.ip).await {
            return Ok(());
        }
        ctx.progress(format!("connecting to {}:{}", self.host.ip, self.host.ssh_port));
        let executor = ctx.connector().connect(&self.host).await?;
        ctx.executors().insert(&self.host.ip, executor).await;
        Ok(())
    }
}

impl fmt::Display for SshConnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SSHConnect: user={}, host={}, port={}",
            self.host.user, self.host.ip, self.host.ssh_port
        )
    }
}

/// `mkdir -p` a set of directories
pub struct Mkdir {
    host: String,
    dirs: Vec<String>,
    sudo: bool,
}

impl Mkdir {
    pub fn new(host: impl Into<String>, dirs: Vec<String>, sudo: bool) -> Self {
        Self {
            host: host.into(),
            dirs,
            sudo,
        }
    }
}

#[async_trait]
impl Task for Mkdir {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        if self.dirs.is_empty() {
            return Ok(());
        }
        let executor = ctx.executor(&self.host).await?;
        executor
            .execute(&gen_mkdir_command(&self.dirs), self.sudo)
            .await?;
        Ok(())
    }
}

impl fmt::Display for Mkdir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mkdir: host={}, directories='{}'", self.host, self.dirs.join("','"))
    }
}

/// Arbitrary command
pub struct Shell {
    host: String,
    command: String,
    sudo: bool,
}

impl Shell {
    pub fn new(host: impl Into<String>, command: impl Into<String>, sudo: bool) -> Self {
        Self {
            host: host.into(),
            command: command.into(),
            sudo,
        }
    }
}

#[async_trait]
impl Task for Shell {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let executor = ctx.executor(&self.host).await?;
        let output = executor.execute(&self.command, self.sudo).await?;
        debug!("[{}] {} => {}", self.host, self.command, output.trimmed());
        Ok(())
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shell: host={}, sudo={}, command=`{}`", self.host, self.sudo, self.command)
    }
}

/// Creates the run-as user when it does not exist yet
pub struct UserCreate {
    host: String,
    user: String,
}

impl UserCreate {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
        }
    }
}

#[async_trait]
impl Task for UserCreate {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        ctx.progress(format!("ensuring user {}", self.user));
        let executor = ctx.executor(&self.host).await?;
        executor
            .execute(&gen_user_create_command(&self.user), true)
            .await?;
        Ok(())
    }
}

impl fmt::Display for UserCreate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserCreate: host={}, user={}", self.host, self.user)
    }
}

/// Whether uninstall may `rm -rf` this path
pub fn is_removable_dir(dir: &str) -> bool {
    let trimmed = dir.trim();
    let normalized = match trimmed.trim_end_matches('/') {
        "" => "/",
        other => other,
    };
    !trimmed.is_empty() && !PROTECTED_DIRS.contains(&normalized)
}

/// `rm -rf` a versioned install directory
pub struct RemoveInstallDir {
    host: String,
    dir: String,
}

impl RemoveInstallDir {
    pub fn new(host: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl Task for RemoveInstallDir {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        if !is_removable_dir(&self.dir) {
            return Err(GemixError::ValidationError(format!(
                "refusing to remove {} on {}",
                self.dir, self.host
            )));
        }
        ctx.progress(format!("removing {}", self.dir));
        let executor = ctx.executor(&self.host).await?;
        executor
            .execute(&gen_remove_dir_command(&self.dir), false)
            .await?;
        info!("[{}] removed {}", self.host, self.dir);
        Ok(())
    }
}

impl fmt::Display for RemoveInstallDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoveInstallDir: host={}, dir={}", self.host, self.dir)
    }
}
