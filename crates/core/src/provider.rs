//! Upstream tool providers.
//!
//! A provider is anything that can enumerate tools and run them by their
//! upstream name. Providers come in two call shapes: blocking
//! ([`SyncToolProvider`]) and non-blocking ([`AsyncToolProvider`]). The
//! [`ProviderRegistry`] unifies both behind [`RegisteredProvider`] so nothing
//! past aggregation needs to know which shape a provider has.

use crate::descriptor::ToolDescriptor;
use crate::error::ProviderError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Provider with a blocking interface.
///
/// Calls are driven on the blocking thread pool.
pub trait SyncToolProvider: Send + Sync {
    /// Current tool list, in the provider's own order.
    fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError>;

    /// Run the tool known upstream as `name`.
    fn call_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Abort the request currently in flight, if any.
    ///
    /// Called when the gateway stops waiting for a blocking call. Dropping the
    /// waiting future cannot stop the thread running it, so providers that
    /// serialize requests must release it here. The default does nothing.
    fn interrupt(&self) {}
}

/// Provider with a non-blocking interface.
#[async_trait::async_trait]
pub trait AsyncToolProvider: Send + Sync {
    /// Current tool list, in the provider's own order.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError>;

    /// Run the tool known upstream as `name`.
    async fn call_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// Index of a provider inside its [`ProviderRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderHandle(pub usize);

impl fmt::Display for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Call shape of a registered provider.
#[derive(Clone)]
pub enum ProviderKind {
    Blocking(Arc<dyn SyncToolProvider>),
    NonBlocking(Arc<dyn AsyncToolProvider>),
}

impl ProviderKind {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocking(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Blocking(_) => "sync",
            Self::NonBlocking(_) => "async",
        }
    }
}

/// A provider together with its identity.
#[derive(Clone)]
pub struct RegisteredProvider {
    id: String,
    alias: String,
    kind: ProviderKind,
}

impl RegisteredProvider {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Per-provider alias. Defaults to the id.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    /// Enumerate the provider's tools regardless of its call shape.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        match &self.kind {
            ProviderKind::Blocking(provider) => {
                let provider = provider.clone();
                tokio::task::spawn_blocking(move || provider.list_tools())
                    .await
                    .map_err(|e| ProviderError::Transport(format!("listing task failed: {}", e)))?
            }
            ProviderKind::NonBlocking(provider) => provider.list_tools().await,
        }
    }

    /// Run an upstream tool regardless of the provider's call shape.
    pub async fn call_tool(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        match &self.kind {
            ProviderKind::Blocking(provider) => {
                let provider = provider.clone();
                let name = name.to_string();
                tokio::task::spawn_blocking(move || provider.call_tool(&name, input))
                    .await
                    .map_err(|e| ProviderError::Transport(format!("call task failed: {}", e)))?
            }
            ProviderKind::NonBlocking(provider) => provider.call_tool(name, input).await,
        }
    }

    /// Drive `operation` against this provider for at most `limit`.
    ///
    /// On expiry the operation is dropped, a blocking provider is told to
    /// [`interrupt`](SyncToolProvider::interrupt) and the limit is returned as
    /// the error.
    pub async fn within<T>(
        &self,
        limit: Option<Duration>,
        operation: impl Future<Output = T>,
    ) -> Result<T, Duration> {
        let Some(limit) = limit else {
            return Ok(operation.await);
        };

        match tokio::time::timeout(limit, operation).await {
            Ok(output) => Ok(output),
            Err(_) => {
                if let ProviderKind::Blocking(provider) = &self.kind {
                    tracing::warn!(
                        "Interrupting provider '{}' after {}s without a reply",
                        self.id,
                        limit.as_secs()
                    );
                    provider.interrupt();
                }
                Err(limit)
            }
        }
    }
}

impl fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("id", &self.id)
            .field("alias", &self.alias)
            .field("kind", &self.kind.label())
            .finish()
    }
}

/// Ordered set of upstream providers.
///
/// The registry owns the provider connections; catalog entries refer back to
/// them only through [`ProviderHandle`].
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<RegisteredProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blocking provider
    pub fn register_sync(
        &mut self,
        id: impl Into<String>,
        alias: Option<String>,
        provider: Arc<dyn SyncToolProvider>,
    ) -> ProviderHandle {
        self.push(id.into(), alias, ProviderKind::Blocking(provider))
    }

    /// Register a non-blocking provider
    pub fn register_async(
        &mut self,
        id: impl Into<String>,
        alias: Option<String>,
        provider: Arc<dyn AsyncToolProvider>,
    ) -> ProviderHandle {
        self.push(id.into(), alias, ProviderKind::NonBlocking(provider))
    }

    fn push(&mut self, id: String, alias: Option<String>, kind: ProviderKind) -> ProviderHandle {
        let handle = ProviderHandle(self.providers.len());
        let alias = alias.unwrap_or_else(|| id.clone());
        tracing::debug!("Registered {} provider '{}' as {}", kind.label(), id, handle);
        self.providers.push(RegisteredProvider { id, alias, kind });
        handle
    }

    pub fn get(&self, handle: ProviderHandle) -> Option<&RegisteredProvider> {
        self.providers.get(handle.0)
    }

    /// All providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ProviderHandle, &RegisteredProvider)> {
        self.providers
            .iter()
            .enumerate()
            .map(|(index, provider)| (ProviderHandle(index), provider))
    }

    /// Blocking providers in registration order.
    pub fn sync_providers(&self) -> impl Iterator<Item = (ProviderHandle, &RegisteredProvider)> {
        self.iter().filter(|(_, provider)| provider.kind.is_blocking())
    }

    /// Non-blocking providers in registration order.
    pub fn async_providers(&self) -> impl Iterator<Item = (ProviderHandle, &RegisteredProvider)> {
        self.iter().filter(|(_, provider)| !provider.kind.is_blocking())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAsyncProvider, FakeSyncProvider, StallingProvider};
    use serde_json::json;

    #[test]
    fn test_register_assigns_handles_in_order() {
        let mut registry = ProviderRegistry::new();
        let first = registry.register_sync("files", None, Arc::new(FakeSyncProvider::new(&["a"])));
        let second = registry.register_async(
            "web",
            Some("w".to_string()),
            Arc::new(FakeAsyncProvider::new(&["b"])),
        );

        assert_eq!(first, ProviderHandle(0));
        assert_eq!(second, ProviderHandle(1));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(first).unwrap().alias(), "files");
        assert_eq!(registry.get(second).unwrap().alias(), "w");
        assert!(registry.get(ProviderHandle(2)).is_none());
    }

    #[test]
    fn test_sync_and_async_views() {
        let mut registry = ProviderRegistry::new();
        registry.register_async("a1", None, Arc::new(FakeAsyncProvider::new(&[])));
        registry.register_sync("s1", None, Arc::new(FakeSyncProvider::new(&[])));
        registry.register_async("a2", None, Arc::new(FakeAsyncProvider::new(&[])));

        let sync_ids: Vec<_> = registry.sync_providers().map(|(_, p)| p.id()).collect();
        let async_ids: Vec<_> = registry.async_providers().map(|(_, p)| p.id()).collect();

        assert_eq!(sync_ids, vec!["s1"]);
        assert_eq!(async_ids, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_blocking_provider_runs_through_unified_interface() {
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_sync("files", None, Arc::new(FakeSyncProvider::new(&["read"])));
        let provider = registry.get(handle).unwrap();

        let tools = provider.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "read");

        let result = provider.call_tool("read", json!({"path": "/tmp"})).await.unwrap();
        assert_eq!(result["tool"], "read");
        assert_eq!(result["input"]["path"], "/tmp");
    }

    #[tokio::test]
    async fn test_stalled_blocking_call_is_interrupted() {
        let upstream = Arc::new(StallingProvider::default());
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_sync("stdio", None, upstream.clone());
        let provider = registry.get(handle).unwrap();

        let limit = Some(Duration::from_millis(100));
        let stalled = provider.within(limit, provider.call_tool("slow", json!({}))).await;
        assert_eq!(stalled.unwrap_err(), Duration::from_millis(100));
        assert_eq!(upstream.interrupts(), 1);

        let quick = provider
            .within(Some(Duration::from_secs(5)), provider.call_tool("fast", json!({})))
            .await
            .expect("provider still wedged after interrupt");
        assert_eq!(quick.unwrap(), json!({"tool": "fast"}));
    }

    #[tokio::test]
    async fn test_within_without_limit_waits() {
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_async(
            "web",
            None,
            Arc::new(FakeAsyncProvider::new(&["a"]).with_delay(Duration::from_millis(10))),
        );
        let provider = registry.get(handle).unwrap();

        let tools = provider.within(None, provider.list_tools()).await.unwrap().unwrap();
        assert_eq!(tools.len(), 1);
    }
}
