// In-memory providers for unit tests

use crate::descriptor::ToolDescriptor;
use crate::error::ProviderError;
use crate::provider::{AsyncToolProvider, SyncToolProvider};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const TEST_SCHEMA: &str = r#"{"type":"object","properties":{}}"#;

fn descriptors(names: &[&str]) -> Vec<ToolDescriptor> {
    names
        .iter()
        .map(|name| ToolDescriptor::new(*name, format!("{} tool", name), TEST_SCHEMA))
        .collect()
}

#[derive(Default)]
pub struct FakeSyncProvider {
    tools: Vec<ToolDescriptor>,
    calls: Mutex<Vec<String>>,
    fail_listing: bool,
    fail_calls: bool,
}

impl FakeSyncProvider {
    pub fn new(names: &[&str]) -> Self {
        Self::with_tools(descriptors(names))
    }

    pub fn with_tools(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            ..Default::default()
        }
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_calls(mut self) -> Self {
        self.fail_calls = true;
        self
    }

    /// Upstream names this provider was called with.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SyncToolProvider for FakeSyncProvider {
    fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        if self.fail_listing {
            return Err(ProviderError::Transport("connection refused".to_string()));
        }
        Ok(self.tools.clone())
    }

    fn call_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        self.calls.lock().unwrap().push(name.to_string());
        if self.fail_calls {
            return Err(ProviderError::Remote {
                code: -32000,
                message: format!("{} exploded", name),
            });
        }
        Ok(json!({ "tool": name, "input": input }))
    }
}

#[derive(Default)]
pub struct FakeAsyncProvider {
    tools: Vec<ToolDescriptor>,
    calls: Mutex<Vec<String>>,
    fail_listing: bool,
    delay: Option<Duration>,
}

impl FakeAsyncProvider {
    pub fn new(names: &[&str]) -> Self {
        Self {
            tools: descriptors(names),
            ..Default::default()
        }
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Delay applied to both listing and calls.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AsyncToolProvider for FakeAsyncProvider {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_listing {
            return Err(ProviderError::Protocol("invalid tools/list response".to_string()));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        self.calls.lock().unwrap().push(name.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(json!({ "tool": name, "input": input }))
    }
}

/// Blocking provider with one session: calls run one at a time and `slow`
/// hangs until the provider is interrupted.
#[derive(Default)]
pub struct StallingProvider {
    session: Mutex<()>,
    interrupted: AtomicBool,
    interrupts: AtomicUsize,
}

impl StallingProvider {
    pub fn interrupts(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }
}

impl SyncToolProvider for StallingProvider {
    fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        Ok(descriptors(&["slow", "fast"]))
    }

    fn call_tool(
        &self,
        name: &str,
        _input: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let _session = self.session.lock().unwrap();
        if name == "slow" {
            while !self.interrupted.swap(false, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            return Err(ProviderError::Transport("interrupted".to_string()));
        }
        Ok(json!({ "tool": name }))
    }

    fn interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        self.interrupted.store(true, Ordering::SeqCst);
    }
}
