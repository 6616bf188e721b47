//! Per-server session lifecycle.
//!
//! A [`ServerSession`] owns exactly one server: its channel never leaves
//! the session, and every observable transition goes through the state
//! machine below. The capability handshake must complete before tools can
//! be listed; discovery is a separate step layered on an initialized
//! channel, never folded into the spawn.

use crate::channel::{Channel, Transport};
use crate::config::ServerConfig;
use crate::error::McpError;
use crate::types::ToolInfo;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Lifecycle of one session.
///
/// `Uninitialized → Starting → Ready → Cleaning → Closed`, with `Failed`
/// reachable from `Starting`. A failed start is cleaned up immediately,
/// so callers observe `Closed` afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Starting,
    Ready,
    Cleaning,
    Closed,
    Failed,
}

struct Inner {
    state: SessionState,
    channel: Option<Box<dyn Channel>>,
    tools: Option<Vec<ToolInfo>>,
}

/// Owns one server process and its channel.
pub struct ServerSession {
    config: ServerConfig,
    // Single guard for channel ownership and lifecycle transitions:
    // concurrent cleanup callers serialize here and the second observes
    // the already-closed state.
    inner: Mutex<Inner>,
}

impl ServerSession {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                channel: None,
                tools: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Connect the channel and perform the capability handshake.
    ///
    /// On any failure the session is cleaned up before the error is
    /// returned.
    pub async fn initialize(
        &self,
        transport: &dyn Transport,
        timeout: Duration,
    ) -> Result<(), McpError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            SessionState::Uninitialized => {}
            SessionState::Ready => return Ok(()),
            _ => {
                return Err(McpError::NotInitialized {
                    server: self.config.name.clone(),
                })
            }
        }
        inner.state = SessionState::Starting;

        let mut channel = match transport.connect(&self.config).await {
            Ok(channel) => channel,
            Err(err) => {
                tracing::error!(server = %self.config.name, error = %err, "session start failed");
                inner.state = SessionState::Failed;
                let _ = Self::teardown(&self.config.name, &mut inner).await;
                return Err(err);
            }
        };

        match self.handshake(channel.as_mut(), timeout).await {
            Ok(()) => {
                inner.channel = Some(channel);
                inner.state = SessionState::Ready;
                tracing::debug!(server = %self.config.name, "session ready");
                Ok(())
            }
            Err(err) => {
                tracing::error!(server = %self.config.name, error = %err, "session start failed");
                // Hand the channel to teardown so the process is released.
                inner.channel = Some(channel);
                inner.state = SessionState::Failed;
                let _ = Self::teardown(&self.config.name, &mut inner).await;
                Err(err)
            }
        }
    }

    async fn handshake(&self, channel: &mut dyn Channel, timeout: Duration) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let result = channel
            .request("initialize", Some(params), timeout)
            .await
            .map_err(|err| match err {
                McpError::RequestTimeout { server, .. } => McpError::HandshakeTimeout { server },
                McpError::Protocol { message, .. } => McpError::HandshakeRejected {
                    server: self.config.name.clone(),
                    message,
                },
                other => other,
            })?;

        if result.get("protocolVersion").is_none() {
            return Err(McpError::HandshakeRejected {
                server: self.config.name.clone(),
                message: "initialize response missing protocolVersion".to_string(),
            });
        }

        channel.notify("notifications/initialized", None).await
    }

    /// Enumerate the server's tools. Requires `Ready`; the result is
    /// cached, so repeated calls do not hit the server again.
    pub async fn create_tools(&self, timeout: Duration) -> Result<Vec<ToolInfo>, McpError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Ready {
            return Err(McpError::NotInitialized {
                server: self.config.name.clone(),
            });
        }

        if let Some(tools) = &inner.tools {
            return Ok(tools.clone());
        }

        let channel = inner
            .channel
            .as_mut()
            .ok_or_else(|| McpError::TransportClosed {
                server: self.config.name.clone(),
            })?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(c) => json!({"cursor": c}),
                None => json!({}),
            };

            let result = channel.request("tools/list", Some(params), timeout).await?;
            let listed = result
                .get("tools")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    McpError::InvalidResponse("tools/list response missing tools".to_string())
                })?;

            for raw in listed {
                tools.push(ToolInfo::from_listing(&self.config.name, raw)?);
            }

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(|s| s.to_string());
            if cursor.is_none() {
                break;
            }
        }

        inner.tools = Some(tools.clone());
        Ok(tools)
    }

    /// Invoke one tool on this session's server. The result is normalized
    /// to `{"isError": bool, "content": [...]}`.
    pub async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Ready {
            return Err(McpError::NotInitialized {
                server: self.config.name.clone(),
            });
        }

        let channel = inner
            .channel
            .as_mut()
            .ok_or_else(|| McpError::TransportClosed {
                server: self.config.name.clone(),
            })?;

        let params = json!({"name": tool, "arguments": arguments});
        let result = channel.request("tools/call", Some(params), timeout).await?;

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let content = result
            .get("content")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(json!({"isError": is_error, "content": content}))
    }

    /// Tear the session down. Safe to call from any state, from multiple
    /// call sites concurrently, and more than once; the underlying
    /// teardown executes at most once.
    pub async fn cleanup(&self) -> Result<(), McpError> {
        let mut inner = self.inner.lock().await;
        Self::teardown(&self.config.name, &mut inner).await
    }

    async fn teardown(name: &str, inner: &mut Inner) -> Result<(), McpError> {
        if inner.state == SessionState::Closed {
            return Ok(());
        }
        inner.state = SessionState::Cleaning;

        let result = match inner.channel.take() {
            Some(mut channel) => channel.close().await,
            None => Ok(()),
        };

        inner.state = SessionState::Closed;
        if let Err(err) = &result {
            tracing::warn!(server = %name, error = %err, "session cleanup failed");
        }
        result
    }
}
