//! Tool dispatch.
//!
//! The only place tools are invoked. Failures never escape as errors: they
//! are recorded in the outcome so the loop can feed them back to the model.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use forgeloop_core::protocol::ToolCallRequest;
use forgeloop_core::tool::ToolRegistry;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::coerce::coerce_params;

/// Result of running one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolExecutionOutcome {
    pub tool_name: String,
    pub success: bool,
    /// Serialized result on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure message on error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolExecutionOutcome {
    fn succeeded(tool_name: &str, result: String) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    fn failed(tool_name: &str, error: String) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Aggregate of a parallel dispatch.
///
/// Keys are tool names; a name used more than once in the batch gets a
/// `#2`, `#3`… suffix on its later occurrences.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParallelOutcome {
    /// True when no call failed
    pub success: bool,
    pub results: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
}

/// Resolves, coerces and executes tool calls against an injected registry.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one call.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolExecutionOutcome {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return ToolExecutionOutcome::failed(
                &call.name,
                format!(
                    "Tool '{}' not found. Available tools: {}",
                    call.name,
                    self.registry.names().join(", ")
                ),
            );
        };

        let args = coerce_params(&call.raw_parameters, &tool.parameters());
        let shown = Value::Object(args.clone());
        debug!(tool = %call.name, args = %shown, "Executing tool");

        let start = Instant::now();
        let result = tool.execute(args).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                debug!(tool = %call.name, duration_ms, "Tool succeeded");
                ToolExecutionOutcome::succeeded(&call.name, render(value))
            }
            Err(e) => {
                warn!(tool = %call.name, duration_ms, error = %e, "Tool execution failed");
                ToolExecutionOutcome::failed(&call.name, e.to_string())
            }
        }
    }

    /// Execute all calls concurrently. Every call runs to completion; one
    /// failure does not cancel its siblings. Outcomes are in call order.
    pub async fn execute_all(&self, calls: &[ToolCallRequest]) -> Vec<ToolExecutionOutcome> {
        join_all(calls.iter().map(|call| self.execute(call))).await
    }

    /// [`execute_all`](Self::execute_all), folded into one [`ParallelOutcome`].
    pub async fn execute_parallel(&self, calls: &[ToolCallRequest]) -> ParallelOutcome {
        aggregate(self.execute_all(calls).await)
    }
}

/// Strings are fed back verbatim; other values as compact JSON.
fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Fold per-call outcomes into name-keyed results and errors.
pub fn aggregate(outcomes: Vec<ToolExecutionOutcome>) -> ParallelOutcome {
    let mut aggregate = ParallelOutcome {
        success: true,
        ..ParallelOutcome::default()
    };
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();

    for outcome in outcomes {
        let n = seen.entry(outcome.tool_name.clone()).or_insert(0);
        *n += 1;
        let key = if *n == 1 {
            outcome.tool_name.clone()
        } else {
            format!("{}#{n}", outcome.tool_name)
        };

        match (outcome.success, outcome.result, outcome.error) {
            (true, Some(result), _) => {
                aggregate.results.insert(key, result);
            }
            (_, _, error) => {
                aggregate.success = false;
                aggregate
                    .errors
                    .insert(key, error.unwrap_or_else(|| "unknown error".into()));
            }
        }
    }

    aggregate
}
