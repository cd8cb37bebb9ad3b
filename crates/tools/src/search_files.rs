//! Content search tool — grep-like regex search over files and directories.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{ParamType, ParameterSchema, Tool, ToolArgs};
use regex_lite::RegexBuilder;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{failed, str_arg};

const MAX_MATCHES: usize = 200;
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search files for lines matching a regular expression. Returns path:line: text for each match."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("pattern", ParamType::String, "Regular expression to search for")
            .required(
                "paths",
                ParamType::array_of(ParamType::String),
                "Files or directories to search",
            )
            .optional(
                "case_sensitive",
                ParamType::Boolean,
                Some(Value::Bool(true)),
                "Match case exactly",
            )
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let pattern = str_arg(&args, "pattern")?;
        let case_sensitive = args
            .get("case_sensitive")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let paths: Vec<PathBuf> = args
            .get("paths")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'paths' argument".into()))?
            .iter()
            .filter_map(|v| v.as_str().map(PathBuf::from))
            .collect();

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| ToolError::InvalidArguments(format!("invalid pattern: {e}")))?;

        debug!(pattern = %pattern, paths = paths.len(), "Searching files");

        let mut files = Vec::new();
        for path in &paths {
            collect_files(path, &mut files)
                .await
                .map_err(|e| failed(self.name(), format!("{}: {e}", path.display())))?;
        }

        let mut matches = Vec::new();
        'files: for file in files {
            let Ok(content) = tokio::fs::read_to_string(&file).await else {
                trace!(file = %file.display(), "Skipping unreadable or binary file");
                continue;
            };
            for (idx, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(format!("{}:{}: {}", file.display(), idx + 1, line.trim_end()));
                    if matches.len() >= MAX_MATCHES {
                        break 'files;
                    }
                }
            }
        }

        if matches.is_empty() {
            return Ok(Value::String(format!("No matches for '{pattern}'")));
        }
        Ok(Value::String(matches.join("\n")))
    }
}

async fn collect_files(root: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let metadata = tokio::fs::metadata(root).await?;
    if metadata.is_file() {
        out.push(root.to_path_buf());
        return Ok(());
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut reader = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                let skipped = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name));
                if !skipped {
                    pending.push(entry.path());
                }
            } else if file_type.is_file() {
                out.push(entry.path());
            }
        }
    }
    out.sort();
    Ok(())
}
