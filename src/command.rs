//! Shell command task action.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use tickwork_scheduler::TaskAction;

/// Runs a command line through `sh -c` each time the task fires.
///
/// A non-zero exit status or running past the timeout is reported as an
/// error, with captured stderr in the message.
#[derive(Debug, Clone)]
pub struct CommandAction {
    task: String,
    command: String,
    timeout: Duration,
    work_dir: Option<PathBuf>,
}

impl CommandAction {
    pub fn new(task: impl Into<String>, command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            task: task.into(),
            command: command.into(),
            timeout,
            work_dir: None,
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl TaskAction for CommandAction {
    async fn run(&self) -> anyhow::Result<()> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Command timed out after {:?}: {}",
                    self.timeout,
                    self.command
                )
            })?
            .with_context(|| format!("Failed to spawn command: {}", self.command))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("[{}] stdout: {}", self.task, stdout.trim_end());
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Command failed with exit code {}: {}",
                code,
                stderr.trim_end()
            );
        }

        Ok(())
    }
}
