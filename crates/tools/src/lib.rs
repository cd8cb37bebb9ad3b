//! Built-in tool implementations for Forgeloop.
//!
//! Tools give the agent the ability to inspect and act on a workspace:
//! read files, list directories, search file contents and run allowlisted
//! shell commands.
//!
//! Every tool receives arguments that were already coerced against its
//! [`ParameterSchema`](forgeloop_core::tool::ParameterSchema), so numbers
//! arrive as JSON numbers and lists as JSON arrays.

pub mod list_directory;
pub mod read_file;
pub mod search_files;
pub mod shell;

use std::sync::Arc;

use forgeloop_config::ToolsConfig;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{ToolArgs, ToolRegistry};

pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use search_files::SearchFilesTool;
pub use shell::ShellTool;

/// Create a tool registry with all built-in tools.
///
/// The shell tool is restricted to `config.shell_allowlist`.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(ReadFileTool))
        .with(Arc::new(ListDirectoryTool))
        .with(Arc::new(SearchFilesTool))
        .with(Arc::new(ShellTool::new(
            config.shell_allowlist.clone(),
            config.shell_timeout_secs,
        )))
}

/// Fetch a required string argument.
pub(crate) fn str_arg<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

pub(crate) fn bool_arg(args: &ToolArgs, key: &str) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Numbers may arrive as integers or floats; negative values are ignored.
pub(crate) fn usize_arg(args: &ToolArgs, key: &str) -> Option<usize> {
    let value = args.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .map(|n| n as usize)
}

pub(crate) fn failed(tool_name: &str, reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason: reason.into(),
    }
}
