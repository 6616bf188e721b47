//! Bidirectional JSON-RPC channel to one server process.
//!
//! A [`StdioChannel`] exclusively owns the child process and its pipes. A
//! background task services stdout and routes responses to pending
//! requests by id; stderr is drained to the log. The [`Transport`] and
//! [`Channel`] traits are the seam that lets tests substitute a scripted
//! fake for the real subprocess.

use crate::config::ServerConfig;
use crate::error::McpError;
use crate::framing::{encode_frame, FrameBuffer};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};

/// How long `close` waits for the child to exit before killing it.
const CLOSE_GRACE: Duration = Duration::from_secs(3);

type PendingResponse = oneshot::Sender<Result<Value, McpError>>;
type PendingMap = Arc<Mutex<HashMap<u64, PendingResponse>>>;

/// One live request/response stream to a server.
#[async_trait]
pub trait Channel: Send {
    /// Send a request and wait (bounded) for the matching response.
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpError>;

    /// Send a notification; no response is expected.
    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError>;

    /// Tear the channel down. Must not block indefinitely on a wedged
    /// process.
    async fn close(&mut self) -> Result<(), McpError>;
}

/// Connects a [`ServerConfig`] to a live [`Channel`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, config: &ServerConfig) -> Result<Box<dyn Channel>, McpError>;
}

/// Default transport: spawn the configured command as a child process and
/// speak JSON-RPC over its stdio.
#[derive(Debug, Default)]
pub struct StdioTransport;

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self, config: &ServerConfig) -> Result<Box<dyn Channel>, McpError> {
        let channel = StdioChannel::spawn(config).await?;
        Ok(Box::new(channel))
    }
}

struct StdioChannel {
    server_name: String,
    child: Child,
    // Taken and dropped by `close`; a pipe only delivers EOF when the
    // writing end is actually closed.
    stdin: Option<ChildStdin>,
    pending: PendingMap,
    next_id: u64,
}

impl StdioChannel {
    async fn spawn(config: &ServerConfig) -> Result<Self, McpError> {
        let program = resolve_command(config)?;

        let mut command = Command::new(&program);
        command
            .args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        for (key, value) in &config.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| McpError::SpawnFailed {
            server: config.name.clone(),
            message: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::SpawnFailed {
            server: config.name.clone(),
            message: "failed to capture stdin".to_string(),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| McpError::SpawnFailed {
            server: config.name.clone(),
            message: "failed to capture stdout".to_string(),
        })?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        spawn_stdout_task(config.name.clone(), stdout, pending.clone());

        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_task(config.name.clone(), stderr);
        }

        Ok(Self {
            server_name: config.name.clone(),
            child,
            stdin: Some(stdin),
            pending,
            next_id: 1,
        })
    }

    async fn send_frame(&mut self, message: &Value) -> Result<(), McpError> {
        let payload = encode_frame(message).map_err(|e| McpError::Serialization(e.to_string()))?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(McpError::TransportClosed {
                server: self.server_name.clone(),
            });
        };

        let write = async {
            stdin.write_all(&payload).await?;
            stdin.flush().await
        };

        write.await.map_err(|e| McpError::TransportClosed {
            server: format!("{} ({e})", self.server_name),
        })
    }
}

#[async_trait]
impl Channel for StdioChannel {
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params.unwrap_or_else(|| json!({})),
        });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(err) = self.send_frame(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(McpError::TransportClosed {
                server: self.server_name.clone(),
            }),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::RequestTimeout {
                    server: self.server_name.clone(),
                    method: method.to_string(),
                })
            }
        }
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.unwrap_or_else(|| json!({})),
        });

        self.send_frame(&notification).await
    }

    async fn close(&mut self) -> Result<(), McpError> {
        // Dropping stdin closes the pipe and delivers EOF, asking a
        // well-behaved server to exit on its own. `shutdown()` would only
        // flush here and leave the descriptor open.
        drop(self.stdin.take());

        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            _ => {
                self.child
                    .kill()
                    .await
                    .map_err(|e| McpError::CleanupFailed {
                        server: self.server_name.clone(),
                        message: e.to_string(),
                    })?;
                let _ = self.child.wait().await;
                Ok(())
            }
        }
    }
}

fn resolve_command(config: &ServerConfig) -> Result<String, McpError> {
    // Only the `npx` launcher is located on PATH here; everything else is
    // handed to the OS loader as configured.
    if config.command != "npx" {
        return Ok(config.command.clone());
    }

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_in_path_var(&config.command, &path_var)
        .map(|p| p.to_string_lossy().into_owned())
        .ok_or_else(|| McpError::CommandNotFound {
            server: config.name.clone(),
            command: config.command.clone(),
        })
}

fn find_in_path_var(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn spawn_stdout_task(server_name: String, mut stdout: ChildStdout, pending: PendingMap) {
    tokio::spawn(async move {
        let mut frames = FrameBuffer::new();
        let mut read_buf = [0u8; 8192];

        loop {
            match stdout.read(&mut read_buf).await {
                Ok(0) | Err(_) => {
                    fail_all_pending(&pending, &server_name).await;
                    break;
                }
                Ok(n) => {
                    frames.push(&read_buf[..n]);
                    while let Some(frame) = frames.next_frame() {
                        dispatch_frame(&server_name, &frame, &pending).await;
                    }
                }
            }
        }
    });
}

async fn dispatch_frame(server_name: &str, frame: &[u8], pending: &PendingMap) {
    let parsed: Value = match serde_json::from_slice(frame) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(server = %server_name, error = %e, "failed to parse server message");
            return;
        }
    };

    // Server-initiated notifications and requests carry no numeric id we
    // are waiting on; ignore them.
    let Some(id) = parsed.get("id").and_then(Value::as_u64) else {
        return;
    };

    if let Some(error) = parsed.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32000);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();

        if let Some(tx) = pending.lock().await.remove(&id) {
            let _ = tx.send(Err(McpError::Protocol { code, message }));
        }
        return;
    }

    if let Some(result) = parsed.get("result") {
        if let Some(tx) = pending.lock().await.remove(&id) {
            let _ = tx.send(Ok(result.clone()));
        }
    }
}

fn spawn_stderr_task(server_name: String, stderr: tokio::process::ChildStderr) {
    tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(server = %server_name, "server stderr: {}", line);
        }
    });
}

async fn fail_all_pending(pending: &PendingMap, server_name: &str) {
    let drained = std::mem::take(&mut *pending.lock().await);
    for (_, tx) in drained {
        let _ = tx.send(Err(McpError::TransportClosed {
            server: server_name.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn config(name: &str, command: &str) -> ServerConfig {
        ServerConfig {
            name: name.to_string(),
            command: command.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    #[test]
    fn non_npx_commands_are_passed_through() {
        let resolved = resolve_command(&config("a", "/usr/local/bin/custom-server")).unwrap();
        assert_eq!(resolved, "/usr/local/bin/custom-server");
    }

    #[cfg(unix)]
    #[test]
    fn finds_executable_on_constructed_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("npx");
        std::fs::write(&exe, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let path_var = std::env::join_paths([dir.path()]).unwrap();
        let found = find_in_path_var("npx", &path_var).unwrap();
        assert_eq!(found, exe);
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_files_are_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("npx");
        std::fs::write(&exe, "").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o644)).unwrap();

        let path_var = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_in_path_var("npx", &path_var).is_none());
    }

    #[test]
    fn missing_executable_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_in_path_var("npx", &path_var).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn close_delivers_eof_without_waiting_out_the_grace() {
        let cfg = config("cat", "/bin/cat");
        let mut channel = StdioTransport.connect(&cfg).await.unwrap();

        let started = std::time::Instant::now();
        channel.close().await.unwrap();
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "cat exits on stdin EOF; close should finish well before the kill grace"
        );
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_as_spawn_failed() {
        let cfg = config("ghost", "toolbridge-test-no-such-binary");
        let err = match StdioTransport.connect(&cfg).await {
            Ok(_) => panic!("expected the spawn to fail"),
            Err(err) => err,
        };
        match err {
            McpError::SpawnFailed { server, .. } => assert_eq!(server, "ghost"),
            other => panic!("expected SpawnFailed, got {other:?}"),
        }
    }
}
