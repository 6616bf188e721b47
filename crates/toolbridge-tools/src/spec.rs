//! Per-framework wire-spec rendering.

use crate::traits::Tool;
use serde_json::{json, Value};

/// Which agent framework the tool spec is rendered for.
///
/// An explicit tag, selected by the caller, decides the shape; tools
/// themselves stay framework-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFormat {
    /// Anthropic-style `{name, description, input_schema}`.
    Anthropic,
    /// OpenAI function-calling `{type: "function", function: {...}}`.
    OpenAi,
}

impl ToolFormat {
    /// Render the declaration an agent framework sends to its model.
    pub fn render(&self, tool: &dyn Tool) -> Value {
        match self {
            ToolFormat::Anthropic => json!({
                "name": tool.name(),
                "description": tool.description(),
                "input_schema": tool.input_schema(),
            }),
            ToolFormat::OpenAi => json!({
                "type": "function",
                "function": {
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.input_schema(),
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ToolError, ToolOutput};
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "mcp__demo__echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"message": {"type": "string"}}})
        }

        async fn invoke(&self, input: Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::json(input))
        }
    }

    #[test]
    fn renders_anthropic_shape() {
        let spec = ToolFormat::Anthropic.render(&EchoTool);
        assert_eq!(spec["name"], "mcp__demo__echo");
        assert_eq!(spec["description"], "Echo the input back");
        assert!(spec["input_schema"]["properties"]["message"].is_object());
        assert!(spec.get("function").is_none());
    }

    #[test]
    fn renders_openai_function_shape() {
        let spec = ToolFormat::OpenAi.render(&EchoTool);
        assert_eq!(spec["type"], "function");
        assert_eq!(spec["function"]["name"], "mcp__demo__echo");
        assert!(spec["function"]["parameters"]["properties"]["message"].is_object());
    }
}
