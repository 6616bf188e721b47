//! Orchestration across every configured server.

use crate::channel::{StdioTransport, Transport};
use crate::config::{load_servers_file, ServerConfig};
use crate::error::McpError;
use crate::session::ServerSession;
use crate::types::ToolInfo;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// A discovered tool plus the invocation binding to its owning session.
///
/// Holding a `BoundTool` keeps the session (and its channel) alive, so
/// the tool stays callable until the manager shuts the group down.
#[derive(Clone)]
pub struct BoundTool {
    session: Arc<ServerSession>,
    info: ToolInfo,
    timeout: Duration,
}

impl BoundTool {
    pub fn info(&self) -> &ToolInfo {
        &self.info
    }

    pub fn server_name(&self) -> &str {
        &self.info.server_name
    }

    /// Call the tool on its server.
    pub async fn invoke(&self, arguments: Value) -> Result<Value, McpError> {
        self.session
            .call_tool(&self.info.name, arguments, self.timeout)
            .await
    }
}

/// Which lifecycle step a failure report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Start,
    Cleanup,
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePhase::Start => write!(f, "failed to start"),
            FailurePhase::Cleanup => write!(f, "failed to clean up"),
        }
    }
}

/// One per-server failure encountered during start or cleanup.
#[derive(Debug)]
pub struct FailureReport {
    pub server: String,
    pub phase: FailurePhase,
    pub error: McpError,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server '{}' {}: {}", self.server, self.phase, self.error)
    }
}

/// Owns every [`ServerSession`] for one configuration document.
///
/// Constructed empty, populated once by [`load_servers`] (or
/// [`load_configs`]), started with [`start`], torn down with the
/// idempotent [`shutdown`].
///
/// [`load_servers`]: ConnectionManager::load_servers
/// [`load_configs`]: ConnectionManager::load_configs
/// [`start`]: ConnectionManager::start
/// [`shutdown`]: ConnectionManager::shutdown
pub struct ConnectionManager {
    sessions: Vec<Arc<ServerSession>>,
    transport: Arc<dyn Transport>,
    handshake_timeout: Duration,
    request_timeout: Duration,
    failures: Vec<FailureReport>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            transport: Arc::new(StdioTransport),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failures: Vec::new(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Populate the session list from the `mcpServers` document at
    /// `path`. A load failure leaves the session list empty.
    pub fn load_servers(&mut self, path: &Path) -> Result<(), McpError> {
        let configs = load_servers_file(path)?;
        self.load_configs(configs);
        Ok(())
    }

    /// Populate the session list from already-parsed configs, in order.
    pub fn load_configs(&mut self, configs: Vec<ServerConfig>) {
        self.sessions = configs
            .into_iter()
            .map(|config| Arc::new(ServerSession::new(config)))
            .collect();
    }

    pub fn sessions(&self) -> &[Arc<ServerSession>] {
        &self.sessions
    }

    /// Failures recorded so far, for the caller's human-facing summary.
    pub fn failures(&self) -> &[FailureReport] {
        &self.failures
    }

    /// Start every session in configuration order and aggregate their
    /// tools.
    ///
    /// Fail-fast with rollback: the first session that fails to start
    /// aborts the whole batch — every session, including ones already
    /// ready, is cleaned up and an empty list is returned. The caller
    /// never receives tools from a half-initialized group.
    pub async fn start(&mut self) -> Vec<BoundTool> {
        let mut tools = Vec::new();

        let sessions = self.sessions.clone();
        for session in &sessions {
            let started = async {
                session
                    .initialize(self.transport.as_ref(), self.handshake_timeout)
                    .await?;
                session.create_tools(self.request_timeout).await
            }
            .await;

            match started {
                Ok(infos) => {
                    tools.extend(infos.into_iter().map(|info| BoundTool {
                        session: session.clone(),
                        info,
                        timeout: self.request_timeout,
                    }));
                }
                Err(error) => {
                    tracing::error!(
                        server = %session.name(),
                        error = %error,
                        "MCP server failed to start; rolling back"
                    );
                    self.failures.push(FailureReport {
                        server: session.name().to_string(),
                        phase: FailurePhase::Start,
                        error,
                    });
                    self.cleanup_sessions().await;
                    return Vec::new();
                }
            }
        }

        tools
    }

    /// Best-effort cleanup of every session. Individual failures are
    /// recorded and logged, never propagated; calling this twice is a
    /// safe no-op.
    pub async fn shutdown(&mut self) {
        self.cleanup_sessions().await;
    }

    async fn cleanup_sessions(&mut self) {
        for session in &self.sessions {
            if let Err(error) = session.cleanup().await {
                self.failures.push(FailureReport {
                    server: session.name().to_string(),
                    phase: FailurePhase::Cleanup,
                    error,
                });
            }
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
