//! Per-host action descriptors and their execution

use tracing::{debug, info, warn};

use crate::errors::GemixError;
use crate::executor::commands::{
    gen_check_process_command, gen_file_exists_command, gen_kill_command, parse_yes_no,
};
use crate::executor::{Direction, Executor};

/// Launch one component through the uploaded install script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAction {
    pub host: String,
    pub script_path: String,
    pub component: String,
    pub log_dir: String,
    pub bin_path: String,
    pub conf_path: String,
    pub pid_path: String,
    pub extra_log_path: String,
}

impl RunAction {
    /// `bash <script> <component> <log-dir> <bin-path> <conf-path> <pid-path> <extra-log-path>`.
    /// The script reads its arguments by position.
    pub fn command(&self) -> String {
        format!(
            "bash {} {} {} {} {} {} {}",
            self.script_path,
            self.component,
            self.log_dir,
            self.bin_path,
            self.conf_path,
            self.pid_path,
            self.extra_log_path
        )
    }
}

/// Kill the named processes on one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopAction {
    pub host: String,
    pub process_names: Vec<String>,
}

/// Copy `<local_dir>/<file_name>` to `<remote_dir>/<file_name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAction {
    pub local_dir: String,
    pub remote_dir: String,
    pub file_name: String,
}

impl UploadAction {
    pub fn local_path(&self) -> String {
        format!("{}/{}", self.local_dir.trim_end_matches('/'), self.file_name)
    }

    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), self.file_name)
    }
}

/// Outcome of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    /// The remote file already existed and was left untouched
    Skipped,
}

/// Run the install script for one component and return its stdout
pub async fn exec_run_action(
    executor: &dyn Executor,
    action: &RunAction,
) -> Result<String, GemixError> {
    let command = action.command();
    debug!("[{}] run: {}", action.host, command);
    let output = executor.execute(&command, false).await.map_err(|e| {
        GemixError::ExecutionError(format!(
            "failed to start {} on {}: {}",
            action.component, action.host, e
        ))
    })?;
    Ok(output.stdout)
}

/// Stop every process of `action`. A process that is not running is
/// reported as not found and is not an error. Every name is attempted;
/// failures are returned together once the list is exhausted.
pub async fn exec_stop_action(
    executor: &dyn Executor,
    action: &StopAction,
) -> Result<Vec<String>, GemixError> {
    let mut messages = Vec::with_capacity(action.process_names.len());
    let mut failures = Vec::new();
    for name in &action.process_names {
        let running = match executor.execute(&gen_check_process_command(name), false).await {
            Ok(output) => parse_yes_no(&output.stdout),
            Err(e) => {
                warn!("[{}] unable to check {}: {}", action.host, name, e);
                failures.push(format!("{}: {}", name, e));
                continue;
            }
        };
        if !running {
            messages.push(format!("Process {} not found", name));
            continue;
        }
        match executor.execute(&gen_kill_command(name), false).await {
            Ok(_) => {
                info!("[{}] stopped {}", action.host, name);
                messages.push(format!("Process {} stopped", name));
            }
            Err(e) => {
                warn!("[{}] unable to stop {}: {}", action.host, name, e);
                failures.push(format!("{}: {}", name, e));
            }
        }
    }
    if !failures.is_empty() {
        return Err(GemixError::ExecutionError(format!(
            "failed to stop processes on {}: {}",
            action.host,
            failures.join("; ")
        )));
    }
    Ok(messages)
}

/// Upload a file unless the remote side already has it
pub async fn exec_upload_action(
    executor: &dyn Executor,
    action: &UploadAction,
) -> Result<UploadOutcome, GemixError> {
    let remote = action.remote_path();
    let exists = executor
        .execute(&gen_file_exists_command(&remote), false)
        .await?;
    if parse_yes_no(&exists.stdout) {
        debug!("[{}] {} already present", executor.host(), remote);
        return Ok(UploadOutcome::Skipped);
    }
    executor
        .transfer(&action.local_path(), &remote, Direction::Upload)
        .await?;
    Ok(UploadOutcome::Uploaded)
}
