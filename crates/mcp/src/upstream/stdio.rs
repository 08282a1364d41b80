// Upstream MCP server running as a child process, JSON-RPC over stdio

use super::{into_result, ToolPages};
use crate::protocol::{CallToolParams, InitializeParams, JsonRpcRequest, JsonRpcResponse};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;
use toolbridge_core::{ProviderError, SyncToolProvider, ToolDescriptor};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioTransportConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Line-delimited JSON-RPC client session.
///
/// Generic over the byte streams so the exchange can run against pipes of a
/// child process or in-memory buffers.
pub struct McpSession<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
    initialized: bool,
}

impl<R: BufRead, W: Write> McpSession<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the `initialize` handshake.
    pub fn initialize(&mut self) -> Result<serde_json::Value, ProviderError> {
        let params = serde_json::to_value(InitializeParams::gateway())
            .map_err(|e| ProviderError::Protocol(e.to_string()))?;
        let result = self.request("initialize", Some(params))?;
        self.send(&JsonRpcRequest::notification("notifications/initialized"))?;
        self.initialized = true;
        Ok(result)
    }

    pub fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        let mut pages = ToolPages::default();
        loop {
            let result = self.request("tools/list", Some(pages.next_request()?))?;
            if pages.record(result)? {
                return Ok(pages.into_tools());
            }
        }
    }

    pub fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })
        .map_err(|e| ProviderError::Protocol(e.to_string()))?;
        self.request("tools/call", Some(params))
    }

    /// Send a request and wait for the response carrying its id.
    ///
    /// Server notifications and responses to other ids are skipped.
    pub fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&JsonRpcRequest::new(id, method, params))?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| ProviderError::Transport(e.to_string()))?;
            if read == 0 {
                return Err(ProviderError::Transport(
                    "provider closed its output".to_string(),
                ));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: serde_json::Value = serde_json::from_str(trimmed)
                .map_err(|e| ProviderError::Protocol(format!("invalid JSON from provider: {}", e)))?;
            if message.get("method").is_some() {
                tracing::trace!("Ignoring server message: {}", trimmed);
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(message)
                .map_err(|e| ProviderError::Protocol(format!("invalid response: {}", e)))?;
            if response.id != serde_json::Value::from(id) {
                tracing::trace!("Ignoring response to request {}", response.id);
                continue;
            }
            return into_result(response);
        }
    }

    fn send(&mut self, request: &JsonRpcRequest) -> Result<(), ProviderError> {
        let mut payload =
            serde_json::to_string(request).map_err(|e| ProviderError::Protocol(e.to_string()))?;
        payload.push('\n');
        self.writer
            .write_all(payload.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }
}

type PipeSession = McpSession<BufReader<ChildStdout>, ChildStdin>;

/// Synchronous-style provider backed by a child process.
///
/// Requests are serialized; one call runs at a time per process. A process
/// that dies or is interrupted is replaced on the next request, which repeats
/// the MCP handshake.
pub struct StdioProvider {
    id: String,
    config: StdioTransportConfig,
    /// Held for the whole of a request. `None` until a process is running.
    session: Mutex<Option<PipeSession>>,
    /// Separate from `session` so a stalled request can be interrupted.
    child: Mutex<Option<Child>>,
}

impl StdioProvider {
    /// Start the server process. The MCP handshake runs on first use.
    pub fn spawn(id: &str, config: &StdioTransportConfig) -> Result<Self, ProviderError> {
        let provider = Self {
            id: id.to_string(),
            config: config.clone(),
            session: Mutex::new(None),
            child: Mutex::new(None),
        };
        let session = provider.start()?;
        *provider.session.lock().map_err(|_| provider.poisoned())? = Some(session);

        tracing::info!("Started stdio provider '{}' ({})", id, config.command);
        Ok(provider)
    }

    fn start(&self) -> Result<PipeSession, ProviderError> {
        let mut slot = self.child.lock().map_err(|_| self.poisoned())?;
        if let Some(mut old) = slot.take() {
            let _ = old.kill();
            let _ = old.wait();
        }

        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                ProviderError::Transport(format!("failed to start '{}': {}", self.config.command, e))
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProviderError::Transport("child pipes unavailable".to_string()));
            }
        };

        *slot = Some(child);
        Ok(McpSession::new(BufReader::new(stdout), stdin))
    }

    fn stop(&self) {
        if let Ok(mut slot) = self.child.lock() {
            if let Some(mut child) = slot.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }

    fn poisoned(&self) -> ProviderError {
        ProviderError::Transport(format!("session of '{}' is poisoned", self.id))
    }

    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut PipeSession) -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let mut slot = self.session.lock().map_err(|_| self.poisoned())?;
        let session = match slot.take() {
            Some(session) => session,
            None => {
                tracing::info!("Restarting stdio provider '{}'", self.id);
                self.start()?
            }
        };
        let session = slot.insert(session);

        let result = run(session, &self.id, f);
        if let Err(ProviderError::Transport(reason)) = &result {
            tracing::warn!("Stdio provider '{}' lost its process: {}", self.id, reason);
            *slot = None;
            self.stop();
        }
        result
    }
}

fn run<T>(
    session: &mut PipeSession,
    id: &str,
    f: impl FnOnce(&mut PipeSession) -> Result<T, ProviderError>,
) -> Result<T, ProviderError> {
    if !session.is_initialized() {
        session.initialize()?;
        tracing::debug!("Stdio provider '{}' initialized", id);
    }
    f(session)
}

impl SyncToolProvider for StdioProvider {
    fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        self.with_session(|session| session.list_tools())
    }

    fn call_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        self.with_session(|session| session.call_tool(name, input))
    }

    /// Kill the process; the blocked request then fails with end of output and
    /// the next request starts a fresh process.
    fn interrupt(&self) {
        if let Ok(mut slot) = self.child.lock() {
            if let Some(child) = slot.as_mut() {
                tracing::warn!("Killing stdio provider '{}' to abort a stalled request", self.id);
                let _ = child.kill();
            }
        }
    }
}

impl Drop for StdioProvider {
    fn drop(&mut self) {
        self.stop();
    }
}
