//! Client runtime for MCP (Model Context Protocol) tool servers.
//!
//! Each configured server runs as a child process speaking JSON-RPC over
//! stdio. [`ConnectionManager`] loads the server list, drives every
//! [`ServerSession`] through its handshake and tool discovery, and hands
//! back [`BoundTool`]s that stay callable for as long as their owning
//! session is alive.

mod channel;
mod config;
mod error;
mod framing;
mod manager;
mod session;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{Channel, StdioTransport, Transport};
pub use config::{load_servers_file, ServerConfig};
pub use error::McpError;
pub use manager::{BoundTool, ConnectionManager, FailurePhase, FailureReport};
pub use session::{ServerSession, SessionState};
pub use types::ToolInfo;
