//! MCP-backed [`Tool`] implementation.

use crate::traits::{BoxedTool, Tool, ToolError, ToolOutput};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use toolbridge_mcp_client::BoundTool;

/// A tool discovered from an MCP server, exposed under its
/// `mcp__<server>__<tool>` name.
pub struct McpTool {
    name: String,
    bound: BoundTool,
}

impl McpTool {
    pub fn new(bound: BoundTool) -> Self {
        Self {
            name: bound.info().qualified_name(),
            bound,
        }
    }

    pub fn server_name(&self) -> &str {
        self.bound.server_name()
    }
}

/// Wrap every bound tool for consumption by an agent framework.
pub fn adapt_tools(tools: Vec<BoundTool>) -> Vec<BoxedTool> {
    tools
        .into_iter()
        .map(|bound| Arc::new(McpTool::new(bound)) as BoxedTool)
        .collect()
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.bound.info().description
    }

    fn input_schema(&self) -> Value {
        self.bound.info().input_schema.clone()
    }

    async fn invoke(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let result = self
            .bound
            .invoke(input)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                message: e.to_string(),
            })?;

        normalize_output(result)
    }
}

/// Flatten a `tools/call` result into text where the content allows it.
fn normalize_output(result: Value) -> Result<ToolOutput, ToolError> {
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let content = result
        .get("content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let text = content
        .iter()
        .filter_map(|entry| {
            if entry.get("type").and_then(Value::as_str) == Some("text") {
                entry.get("text").and_then(Value::as_str)
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    if is_error {
        return Err(ToolError::ExecutionFailed { message: text });
    }

    if text.is_empty() {
        Ok(ToolOutput::json(result))
    } else {
        Ok(ToolOutput::text(text))
    }
}
