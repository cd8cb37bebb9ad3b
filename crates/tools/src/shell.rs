//! Shell tool — execute system commands.
//!
//! Supports command allowlisting and a per-call timeout.

use std::time::Duration;

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{ParamType, ParameterSchema, Tool, ToolArgs};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::{failed, str_arg, usize_arg};

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    default_timeout_secs: u64,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>, default_timeout_secs: u64) -> Self {
        Self {
            allowed_commands,
            default_timeout_secs,
        }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }

        // Extract the base command (first word)
        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();

        self.allowed_commands.iter().any(|a| a == base_cmd)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for running programs, builds, tests and git operations."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("command", ParamType::String, "The shell command to execute")
            .optional(
                "timeout_secs",
                ParamType::Number,
                Some(Value::from(self.default_timeout_secs)),
                "Kill the command after this many seconds",
            )
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let command = str_arg(&args, "command")?;
        let timeout_secs = usize_arg(&args, "timeout_secs")
            .map(|n| n as u64)
            .unwrap_or(self.default_timeout_secs);

        if !self.is_command_allowed(command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, timeout_secs, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: "shell".into(),
                timeout_secs,
            })?
            .map_err(|e| failed("shell", e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            let text = if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            return Ok(Value::String(text.trim().to_string()));
        }

        let code = output.status.code().unwrap_or(-1);
        warn!(command = %command, exit_code = code, "Command failed");
        Err(failed(
            "shell",
            format!("[exit code: {code}]\n{stdout}\n{stderr}").trim().to_string(),
        ))
    }
}
