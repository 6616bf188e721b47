use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the MCP client runtime.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("MCP config not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("failed to parse MCP config {}: {message}", path.display())]
    ConfigMalformed { path: PathBuf, message: String },

    #[error("invalid MCP server '{server}': {message}")]
    InvalidConfig { server: String, message: String },

    #[error("command '{command}' for MCP server '{server}' not found on PATH")]
    CommandNotFound { server: String, command: String },

    #[error("failed to spawn MCP server '{server}': {message}")]
    SpawnFailed { server: String, message: String },

    #[error("handshake with MCP server '{server}' timed out")]
    HandshakeTimeout { server: String },

    #[error("MCP server '{server}' rejected the handshake: {message}")]
    HandshakeRejected { server: String, message: String },

    #[error("MCP server '{server}' is not initialized")]
    NotInitialized { server: String },

    #[error("JSON-RPC timeout calling '{method}' on '{server}'")]
    RequestTimeout { server: String, method: String },

    #[error("JSON-RPC transport closed for '{server}'")]
    TransportClosed { server: String },

    #[error("MCP protocol error ({code}): {message}")]
    Protocol { code: i64, message: String },

    #[error("invalid MCP response: {0}")]
    InvalidResponse(String),

    #[error("failed to serialize JSON-RPC message: {0}")]
    Serialization(String),

    #[error("failed to shut down MCP server '{server}': {message}")]
    CleanupFailed { server: String, message: String },
}
