use crate::error::McpError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Launch description for one MCP server. Pure data; the session does the
/// command resolution and spawning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Unique server name, used as key and in diagnostics.
    pub name: String,
    /// Executable name or path. The literal `npx` is resolved against
    /// PATH when the session starts, not here.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides merged over the inherited environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(rename = "mcpServers")]
    mcp_servers: IndexMap<String, ServerEntry>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

/// Load and validate the `mcpServers` document at `path`.
///
/// The whole load fails on the first problem; a partial server list is
/// never returned. Server order follows document order.
pub fn load_servers_file(path: &Path) -> Result<Vec<ServerConfig>, McpError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            McpError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            McpError::ConfigMalformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        }
    })?;

    let document: ConfigDocument =
        serde_json::from_str(&content).map_err(|e| McpError::ConfigMalformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut servers = Vec::with_capacity(document.mcp_servers.len());
    for (name, entry) in document.mcp_servers {
        if entry.command.trim().is_empty() {
            return Err(McpError::InvalidConfig {
                server: name,
                message: "command must not be empty".to_string(),
            });
        }

        servers.push(ServerConfig {
            name,
            command: entry.command,
            args: entry.args,
            env: entry.env,
        });
    }

    Ok(servers)
}
