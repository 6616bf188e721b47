//! Tool trait and output types.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {name}")]
    NotFound { name: String },

    #[error("invalid tool input: {message}")]
    InvalidInput { message: String },

    #[error("tool execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// What a tool invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }
}

/// One callable capability, however it was discovered.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's input.
    fn input_schema(&self) -> Value;

    async fn invoke(&self, input: Value) -> Result<ToolOutput, ToolError>;
}

/// A boxed tool for dynamic dispatch.
pub type BoxedTool = Arc<dyn Tool>;
