//! Scripted channel and transport fakes for lifecycle tests.

use crate::channel::{Channel, Transport};
use crate::config::ServerConfig;
use crate::error::McpError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted reply for one request.
pub enum Reply {
    Ok(Value),
    Error { code: i64, message: String },
    /// Never answer; the caller's bounded wait elapses.
    Hang,
}

/// In-memory [`Channel`] that replays scripted replies per method.
pub struct FakeChannel {
    name: String,
    replies: HashMap<String, VecDeque<Reply>>,
    requests: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

impl FakeChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: HashMap::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_close: false,
        }
    }

    /// Channel that completes the handshake and lists `tools` once.
    pub fn ready(name: &str, tools: Vec<Value>) -> Self {
        Self::new(name)
            .handshake_ok()
            .on("tools/list", Reply::Ok(json!({"tools": tools})))
    }

    pub fn handshake_ok(self) -> Self {
        self.on(
            "initialize",
            Reply::Ok(json!({"protocolVersion": "2024-11-05", "capabilities": {"tools": {}}})),
        )
    }

    /// Queue `reply` for the next unanswered request to `method`.
    pub fn on(mut self, method: &str, reply: Reply) -> Self {
        self.replies
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Methods requested so far, in order.
    pub fn requests(&self) -> Arc<Mutex<Vec<String>>> {
        self.requests.clone()
    }

    /// How many times `close` has run.
    pub fn close_count(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

#[async_trait]
impl Channel for FakeChannel {
    async fn request(
        &mut self,
        method: &str,
        _params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        self.requests.lock().unwrap().push(method.to_string());

        let reply = self
            .replies
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| McpError::InvalidResponse(format!("unscripted method '{method}'")))?;

        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Error { code, message } => Err(McpError::Protocol { code, message }),
            Reply::Hang => {
                tokio::time::sleep(timeout).await;
                Err(McpError::RequestTimeout {
                    server: self.name.clone(),
                    method: method.to_string(),
                })
            }
        }
    }

    async fn notify(&mut self, method: &str, _params: Option<Value>) -> Result<(), McpError> {
        self.requests.lock().unwrap().push(method.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), McpError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(McpError::CleanupFailed {
                server: self.name.clone(),
                message: "scripted close failure".to_string(),
            });
        }
        Ok(())
    }
}

/// [`Transport`] handing out pre-registered [`FakeChannel`]s by server
/// name. Connecting a server with nothing registered fails like a spawn
/// error would.
pub struct FakeTransport {
    channels: Mutex<HashMap<String, VecDeque<Result<FakeChannel, McpError>>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, server: &str, channel: FakeChannel) {
        self.channels
            .lock()
            .unwrap()
            .entry(server.to_string())
            .or_default()
            .push_back(Ok(channel));
    }

    pub fn fail_connect(&self, server: &str, error: McpError) {
        self.channels
            .lock()
            .unwrap()
            .entry(server.to_string())
            .or_default()
            .push_back(Err(error));
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self, config: &ServerConfig) -> Result<Box<dyn Channel>, McpError> {
        let next = self
            .channels
            .lock()
            .unwrap()
            .get_mut(&config.name)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(channel)) => Ok(Box::new(channel)),
            Some(Err(error)) => Err(error),
            None => Err(McpError::SpawnFailed {
                server: config.name.clone(),
                message: "no fake channel registered".to_string(),
            }),
        }
    }
}
