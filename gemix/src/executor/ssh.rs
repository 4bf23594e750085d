//! SSH executor backed by the system `ssh` and `scp` binaries

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::debug;

use crate::app::options::SshOptions;
use crate::errors::GemixError;
use crate::executor::{CommandOutput, Connector, Direction, Executor};

/// How to authenticate against target hosts
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// Private key file on the control machine
    Key(String),

    /// Password, handed to `sshpass` through its environment
    Password(SecretString),
}

/// Connection descriptor for one host
#[derive(Debug, Clone)]
pub struct RemoteHost {
    pub ip: String,
    pub ssh_port: u16,
    pub user: String,
    pub auth: SshAuth,
}

impl RemoteHost {
    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.ip)
    }
}

/// Opens [`SshExecutor`]s
#[derive(Debug, Clone)]
pub struct SshConnector {
    options: SshOptions,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, host: &RemoteHost) -> Result<Arc<dyn Executor>, GemixError> {
        let executor = SshExecutor::new(host.clone(), self.options.clone());
        // Dial once so unreachable hosts and bad credentials surface before
        // anything is changed remotely.
        executor.execute("true", false).await.map_err(|e| {
            GemixError::ConnectionError(format!(
                "failed to connect to {}:{}: {}",
                host.ip, host.ssh_port, e
            ))
        })?;
        debug!("Connected to {}:{}", host.ip, host.ssh_port);
        Ok(Arc::new(executor))
    }
}

/// Executor that runs each command in a fresh `ssh` process
#[derive(Debug, Clone)]
pub struct SshExecutor {
    host: RemoteHost,
    options: SshOptions,
}

impl SshExecutor {
    pub fn new(host: RemoteHost, options: SshOptions) -> Self {
        Self { host, options }
    }

    fn common_options(&self) -> Vec<String> {
        let mut opts = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.timeout.as_secs().clamp(1, 30)),
        ];
        match &self.host.auth {
            SshAuth::Key(path) => {
                opts.push("-o".to_string());
                opts.push("BatchMode=yes".to_string());
                opts.push("-i".to_string());
                opts.push(path.clone());
            }
            SshAuth::Password(_) => {
                opts.push("-o".to_string());
                opts.push("PubkeyAuthentication=no".to_string());
            }
        }
        opts
    }

    /// Build the command, prefixed with `sshpass -e` for password auth
    fn command(&self, program: &str) -> Command {
        let mut cmd = match &self.host.auth {
            SshAuth::Key(_) => Command::new(program),
            SshAuth::Password(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg(program);
                cmd.env("SSHPASS", password.expose_secret());
                cmd
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(
        &self,
        mut cmd: Command,
        what: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, GemixError> {
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| GemixError::Timeout(timeout, format!("{} on {}", what, self.host.ip)))??;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(GemixError::ExecutionError(format!(
                "{} on {} exited with {}: {}",
                what,
                self.host.ip,
                output.status,
                result.stderr.trim()
            )));
        }
        Ok(result)
    }
}

/// Wrap `cmd` so it runs under `sudo` in a login-free shell
pub fn sudo_wrap(cmd: &str) -> String {
    format!("sudo -H bash -c '{}'", cmd.replace('\'', r"'\''"))
}

#[async_trait]
impl Executor for SshExecutor {
    fn host(&self) -> &str {
        &self.host.ip
    }

    async fn execute(&self, cmd: &str, sudo: bool) -> Result<CommandOutput, GemixError> {
        let remote_cmd = if sudo { sudo_wrap(cmd) } else { cmd.to_string() };
        debug!("[{}] exec: {}", self.host.ip, remote_cmd);

        let mut command = self.command("ssh");
        command
            .args(self.common_options())
            .arg("-p")
            .arg(self.host.ssh_port.to_string())
            .arg(self.host.destination())
            .arg(&remote_cmd);

        self.run(command, &format!("`{}`", cmd), self.options.timeout).await
    }

    async fn transfer(
        &self,
        src: &str,
        dst: &str,
        direction: Direction,
    ) -> Result<(), GemixError> {
        let (from, to) = match direction {
            Direction::Upload => (src.to_string(), format!("{}:{}", self.host.destination(), dst)),
            Direction::Download => (format!("{}:{}", self.host.destination(), src), dst.to_string()),
        };
        debug!("[{}] scp {} -> {}", self.host.ip, from, to);

        let mut command = self.command("scp");
        command
            .args(self.common_options())
            .arg("-P")
            .arg(self.host.ssh_port.to_string())
            .arg(&from)
            .arg(&to);

        self.run(command, &format!("transfer {}", src), self.options.transfer_timeout)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sudo_wrap_escapes_quotes() {
        assert_eq!(sudo_wrap("echo hi"), "sudo -H bash -c 'echo hi'");
        assert_eq!(
            sudo_wrap("echo 'x'"),
            r"sudo -H bash -c 'echo '\''x'\'''"
        );
    }

    #[test]
    fn test_key_auth_uses_batch_mode() {
        let executor = SshExecutor::new(
            RemoteHost {
                ip: "10.0.0.1".to_string(),
                ssh_port: 22,
                user: "gemini".to_string(),
                auth: SshAuth::Key("/home/gemini/.ssh/id_rsa".to_string()),
            },
            SshOptions::default(),
        );
        let opts = executor.common_options();
        assert!(opts.contains(&"BatchMode=yes".to_string()));
        assert!(opts.contains(&"/home/gemini/.ssh/id_rsa".to_string()));
        assert!(opts.contains(&"ConnectTimeout=30".to_string()));
    }
}
