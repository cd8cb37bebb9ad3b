//! Directory listing tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{ParamType, ParameterSchema, Tool, ToolArgs};
use serde_json::Value;
use tracing::debug;

use crate::{bool_arg, failed, str_arg};

/// Directories skipped during recursive listing.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Upper bound on returned entries.
const MAX_ENTRIES: usize = 2000;

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory. Directories are suffixed with '/'. Set recursive to walk subdirectories."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("path", ParamType::String, "Directory to list")
            .optional(
                "recursive",
                ParamType::Boolean,
                Some(Value::Bool(false)),
                "Walk subdirectories (skips .git, target and node_modules)",
            )
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let root = PathBuf::from(str_arg(&args, "path")?);
        let recursive = bool_arg(&args, "recursive");

        debug!(path = %root.display(), recursive, "Listing directory");

        let mut entries = Vec::new();
        let mut pending = vec![root.clone()];

        'walk: while let Some(dir) = pending.pop() {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| failed(self.name(), format!("cannot list {}: {e}", dir.display())))?;

            while let Some(entry) = reader
                .next_entry()
                .await
                .map_err(|e| failed(self.name(), e.to_string()))?
            {
                let path = entry.path();
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);

                let mut display = relative(&root, &path);
                if is_dir {
                    display.push('/');
                    let skipped = entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name));
                    if recursive && !skipped {
                        pending.push(path);
                    }
                }
                entries.push(display);

                if entries.len() >= MAX_ENTRIES {
                    break 'walk;
                }
            }
        }

        entries.sort();
        Ok(Value::String(entries.join("\n")))
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
