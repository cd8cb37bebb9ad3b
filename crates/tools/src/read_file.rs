//! File read tool — return the contents of a text file.

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{ParamType, ParameterSchema, Tool, ToolArgs};
use serde_json::Value;
use tracing::debug;

use crate::{failed, str_arg, usize_arg};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Use max_lines to read only the beginning of large files."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("path", ParamType::String, "The file path to read")
            .optional(
                "max_lines",
                ParamType::Number,
                None,
                "Return at most this many lines",
            )
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let path = str_arg(&args, "path")?;
        let max_lines = usize_arg(&args, "max_lines");

        debug!(path = %path, ?max_lines, "Reading file");

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| failed(self.name(), format!("cannot read {path}: {e}")))?;

        let Some(limit) = max_lines else {
            return Ok(Value::String(content));
        };

        let total = content.lines().count();
        let mut head = content.lines().take(limit).collect::<Vec<_>>().join("\n");
        if total > limit {
            head.push_str(&format!("\n[... {} more lines]", total - limit));
        }
        Ok(Value::String(head))
    }
}
