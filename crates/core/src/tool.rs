//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! execute shell commands, read files, search a code base, etc.
//!
//! Every tool declares its parameters with explicit [`ParamType`] tags. The
//! same schema drives two things: the tool listing in the system prompt and
//! the coercion of the model's textual arguments into typed JSON values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ToolError;

/// Declared type of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "lowercase")]
pub enum ParamType {
    Number,
    Boolean,
    String,
    Array(Box<ParamType>),
    Optional(Box<ParamType>),
}

impl ParamType {
    pub fn array_of(inner: ParamType) -> Self {
        ParamType::Array(Box::new(inner))
    }

    pub fn optional(inner: ParamType) -> Self {
        ParamType::Optional(Box::new(inner))
    }

    /// The type with any `Optional` wrappers removed.
    pub fn unwrap_optional(&self) -> &ParamType {
        match self {
            ParamType::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamType::Number => f.write_str("number"),
            ParamType::Boolean => f.write_str("boolean"),
            ParamType::String => f.write_str("string"),
            ParamType::Array(inner) => write!(f, "array<{inner}>"),
            ParamType::Optional(inner) => write!(f, "optional<{inner}>"),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: ParamType,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    #[serde(default)]
    pub description: String,
}

/// Ordered list of declared parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    fields: Vec<ParamSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare a required parameter.
    pub fn required(
        mut self,
        name: impl Into<String>,
        ty: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(ParamSpec {
            name: name.into(),
            ty,
            required: true,
            default: None,
            description: description.into(),
        });
        self
    }

    /// Declare an optional parameter. The type is wrapped in
    /// [`ParamType::Optional`] unless it already is.
    pub fn optional(
        mut self,
        name: impl Into<String>,
        ty: ParamType,
        default: Option<serde_json::Value>,
        description: impl Into<String>,
    ) -> Self {
        let ty = match ty {
            ParamType::Optional(_) => ty,
            other => ParamType::optional(other),
        };
        self.fields.push(ParamSpec {
            name: name.into(),
            ty,
            required: false,
            default,
            description: description.into(),
        });
        self
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamSpec> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Typed arguments handed to [`Tool::execute`].
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// The core Tool trait.
///
/// Each capability (shell, read_file, search_files, etc.) implements this
/// trait. Tools are registered in a [`ToolRegistry`] that is injected into the
/// agent loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Declared parameters.
    fn parameters(&self) -> ParameterSchema;

    /// Execute the tool with coerced arguments.
    ///
    /// A returned string value is fed back to the model verbatim; any other
    /// value is serialized as JSON.
    async fn execute(&self, args: ToolArgs) -> std::result::Result<serde_json::Value, ToolError>;
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. List tools and their schemas in the system prompt
/// 2. Look up and execute tools when the model requests them
///
/// Registries are constructed explicitly and injected; there is no
/// process-wide instance.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Builder-style registration.
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All registered tools, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    /// List all registered tool names, in name order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> ParameterSchema {
            ParameterSchema::new().required("text", ParamType::String, "Text to echo")
        }
        async fn execute(&self, args: ToolArgs) -> std::result::Result<serde_json::Value, ToolError> {
            Ok(args.get("text").cloned().unwrap_or_default())
        }
    }

    struct ListTool;

    #[async_trait]
    impl Tool for ListTool {
        fn name(&self) -> &str {
            "a_list"
        }
        fn description(&self) -> &str {
            "Lists"
        }
        fn parameters(&self) -> ParameterSchema {
            ParameterSchema::new()
        }
        async fn execute(&self, _args: ToolArgs) -> std::result::Result<serde_json::Value, ToolError> {
            Ok(serde_json::json!([]))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::new().with(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_names_are_sorted() {
        let registry = ToolRegistry::new()
            .with(Arc::new(EchoTool))
            .with(Arc::new(ListTool));
        assert_eq!(registry.names(), vec!["a_list", "echo"]);
    }

    #[tokio::test]
    async fn registered_tool_executes() {
        let registry = ToolRegistry::new().with(Arc::new(EchoTool));
        let mut args = ToolArgs::new();
        args.insert("text".into(), serde_json::json!("hello world"));
        let out = registry.get("echo").unwrap().execute(args).await.unwrap();
        assert_eq!(out, serde_json::json!("hello world"));
    }

    #[test]
    fn optional_wraps_type_once() {
        let schema = ParameterSchema::new()
            .optional("n", ParamType::Number, Some(serde_json::json!(5)), "")
            .optional("m", ParamType::optional(ParamType::Boolean), None, "");
        assert_eq!(schema.get("n").unwrap().ty, ParamType::optional(ParamType::Number));
        assert_eq!(schema.get("m").unwrap().ty, ParamType::optional(ParamType::Boolean));
        assert!(!schema.get("n").unwrap().required);
    }

    #[test]
    fn param_type_display() {
        let ty = ParamType::optional(ParamType::array_of(ParamType::String));
        assert_eq!(ty.to_string(), "optional<array<string>>");
        assert_eq!(ty.unwrap_optional(), &ParamType::array_of(ParamType::String));
    }
}
