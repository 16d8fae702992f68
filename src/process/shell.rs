//! Shell-command process controller.
//!
//! Drives the proxy process through configured start/stop commands and
//! answers OS-level liveness questions by probing the pid recorded in each
//! process's pid file with a null signal.

use super::ProcessController;
use crate::config::ProcessConfig;
use crate::error::{Result, WardenError};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

/// [`ProcessController`] backed by shell commands and pid files.
pub struct ShellProcessController {
    config: ProcessConfig,
}

impl ShellProcessController {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    async fn run_command(&self, command: &str) -> Result<()> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .await
            .map_err(|e| WardenError::ProcessControl(format!("{}: {}", command, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(WardenError::ProcessControl(format!(
                "{} exited with {}",
                command, status
            )))
        }
    }

    fn pid_alive(pid_file: &str) -> bool {
        let Ok(content) = std::fs::read_to_string(Path::new(pid_file)) else {
            return false;
        };
        let Ok(pid) = content.trim().parse::<i32>() else {
            warn!(pid_file, "Pid file holds a non-numeric pid");
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // SAFETY: kill with signal 0 performs only an existence/permission
        // check on the target pid.
        unsafe { libc::kill(pid, 0) == 0 }
    }
}

#[async_trait]
impl ProcessController for ShellProcessController {
    async fn start_proxy(&self) -> Result<()> {
        info!(command = %self.config.proxy_start_command, "Starting proxy process");
        self.run_command(&self.config.proxy_start_command).await
    }

    async fn stop_proxy(&self) -> Result<()> {
        info!(command = %self.config.proxy_stop_command, "Stopping proxy process");
        self.run_command(&self.config.proxy_stop_command).await
    }

    async fn proxy_process_running(&self) -> bool {
        Self::pid_alive(&self.config.proxy_pid_file)
    }

    async fn storage_process_running(&self) -> bool {
        Self::pid_alive(&self.config.storage_pid_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_pid_file_means_not_running() {
        let controller = ShellProcessController::new(ProcessConfig {
            proxy_pid_file: "/nonexistent/warden-test.pid".to_string(),
            ..ProcessConfig::default()
        });
        assert!(!controller.proxy_process_running().await);
    }

    #[tokio::test]
    async fn own_pid_counts_as_running() {
        let dir = std::env::temp_dir();
        let pid_file = dir.join(format!("warden-test-{}.pid", std::process::id()));
        std::fs::write(&pid_file, format!("{}\n", std::process::id())).unwrap();

        let controller = ShellProcessController::new(ProcessConfig {
            proxy_pid_file: pid_file.to_string_lossy().into_owned(),
            ..ProcessConfig::default()
        });
        assert!(controller.proxy_process_running().await);
        std::fs::remove_file(&pid_file).unwrap();
    }

    #[tokio::test]
    async fn failed_command_surfaces_error() {
        let controller = ShellProcessController::new(ProcessConfig {
            proxy_start_command: "exit 3".to_string(),
            ..ProcessConfig::default()
        });
        let err = controller.start_proxy().await.unwrap_err();
        assert!(matches!(err, WardenError::ProcessControl(_)));
    }

    #[tokio::test]
    async fn successful_command() {
        let controller = ShellProcessController::new(ProcessConfig {
            proxy_start_command: "true".to_string(),
            ..ProcessConfig::default()
        });
        controller.start_proxy().await.unwrap();
    }
}
