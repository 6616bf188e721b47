//! Uniform tool representation over MCP-discovered tools.
//!
//! The agent framework consuming these tools is an external collaborator;
//! this crate exposes one [`Tool`] trait plus an explicit [`ToolFormat`]
//! selecting the wire spec each framework expects.

mod mcp;
mod spec;
mod traits;

pub use mcp::{adapt_tools, McpTool};
pub use spec::ToolFormat;
pub use traits::{BoxedTool, Tool, ToolError, ToolOutput};
