use crate::error::McpError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Descriptor for one tool exposed by a server, as reported by
/// `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInfo {
    /// Name of the owning server.
    pub server_name: String,
    /// Tool name as the server reports it.
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's input.
    pub input_schema: Value,
}

impl ToolInfo {
    /// Parse one entry of a `tools/list` response.
    pub(crate) fn from_listing(server_name: &str, raw: &Value) -> Result<Self, McpError> {
        let name = raw
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidResponse("tool missing name".to_string()))?
            .to_string();

        let description = raw
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let input_schema = raw.get("inputSchema").cloned().unwrap_or_else(|| json!({}));

        Ok(Self {
            server_name: server_name.to_string(),
            name,
            description,
            input_schema,
        })
    }

    /// Collision-free name for aggregated tool lists.
    pub fn qualified_name(&self) -> String {
        format!("mcp__{}__{}", self.server_name, self.name)
    }
}
