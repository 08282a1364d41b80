// Delegating tool: published under its effective name, invoked under its upstream name

use crate::descriptor::{ToolContext, ToolDescriptor};
use crate::error::{GatewayError, GatewayResult};
use crate::naming::NamingPolicy;
use crate::provider::{ProviderHandle, ProviderRegistry, RegisteredProvider};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// One catalog entry.
///
/// Exposes the renamed descriptor and forwards invocations to the owning
/// provider under the original name. The provider is referenced by handle
/// through a weak pointer to the registry, so a catalog never keeps provider
/// connections alive.
#[derive(Debug, Clone)]
pub struct DelegatingTool {
    descriptor: ToolDescriptor,
    original_name: String,
    provider: ProviderHandle,
    provider_id: String,
    registry: Weak<ProviderRegistry>,
    timeout: Option<Duration>,
}

impl DelegatingTool {
    pub fn new(
        upstream: &ToolDescriptor,
        handle: ProviderHandle,
        provider: &RegisteredProvider,
        registry: &Arc<ProviderRegistry>,
        policy: &NamingPolicy,
        timeout: Option<Duration>,
    ) -> Self {
        let effective_name = policy.effective_name(&upstream.name, provider.alias());
        Self {
            descriptor: upstream.renamed(effective_name),
            original_name: upstream.name.clone(),
            provider: handle,
            provider_id: provider.id().to_string(),
            registry: Arc::downgrade(registry),
            timeout,
        }
    }

    /// Published descriptor.
    pub fn describe(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    /// Published name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub(crate) fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn provider(&self) -> ProviderHandle {
        self.provider
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Forward a call to the upstream tool and return its result untouched.
    pub async fn invoke(&self, input: serde_json::Value) -> GatewayResult<serde_json::Value> {
        let registry = self
            .registry
            .upgrade()
            .ok_or(GatewayError::ProviderGone(self.provider))?;
        let provider = registry
            .get(self.provider)
            .ok_or(GatewayError::ProviderGone(self.provider))?;

        tracing::debug!(
            tool = %self.descriptor.name,
            upstream = %self.original_name,
            provider = %self.provider_id,
            "Calling tool"
        );

        let call = provider.call_tool(&self.original_name, input);
        let result = provider.within(self.timeout, call).await.map_err(|limit| {
            tracing::warn!(tool = %self.descriptor.name, "Tool call timed out");
            GatewayError::Timeout {
                tool: self.descriptor.name.clone(),
                seconds: limit.as_secs(),
            }
        })?;

        result.map_err(|source| GatewayError::ProviderInvocation {
            provider: self.provider_id.clone(),
            tool: self.original_name.clone(),
            source,
        })
    }

    /// Same as [`invoke`](Self::invoke). The context is accepted but not forwarded.
    pub async fn invoke_with_context(
        &self,
        input: serde_json::Value,
        _context: Option<&ToolContext>,
    ) -> GatewayResult<serde_json::Value> {
        self.invoke(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, PrefixMode};
    use crate::error::ProviderError;
    use crate::testing::{FakeAsyncProvider, FakeSyncProvider, StallingProvider, TEST_SCHEMA};
    use serde_json::json;

    fn static_policy() -> NamingPolicy {
        NamingPolicy::from_config(&GatewayConfig {
            prefix_mode: PrefixMode::Static,
            ..Default::default()
        })
    }

    fn wrap(
        registry: &Arc<ProviderRegistry>,
        handle: ProviderHandle,
        name: &str,
        timeout: Option<Duration>,
    ) -> DelegatingTool {
        let provider = registry.get(handle).unwrap();
        let upstream = ToolDescriptor::new(name, format!("{} tool", name), TEST_SCHEMA);
        DelegatingTool::new(&upstream, handle, provider, registry, &static_policy(), timeout)
    }

    #[test]
    fn test_describe_renames_and_copies_metadata() {
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_sync("p1", None, Arc::new(FakeSyncProvider::new(&["a"])));
        let registry = Arc::new(registry);

        let tool = wrap(&registry, handle, "a", None);
        let descriptor = tool.describe();

        assert_eq!(descriptor.name, "gw_a");
        assert_eq!(descriptor.description, "a tool");
        assert_eq!(descriptor.input_schema, TEST_SCHEMA);
        assert_eq!(tool.original_name(), "a");
        assert_eq!(tool.provider_id(), "p1");
    }

    #[tokio::test]
    async fn test_invoke_uses_original_name() {
        let upstream = Arc::new(FakeSyncProvider::new(&["a"]));
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_sync("p1", None, upstream.clone());
        let registry = Arc::new(registry);

        let tool = wrap(&registry, handle, "a", None);
        let result = tool.invoke(json!({"q": 1})).await.unwrap();

        assert_eq!(result, json!({"tool": "a", "input": {"q": 1}}));
        assert_eq!(upstream.calls(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_async_invoke_uses_original_name() {
        let upstream = Arc::new(FakeAsyncProvider::new(&["search"]));
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_async("web", None, upstream.clone());
        let registry = Arc::new(registry);

        let tool = wrap(&registry, handle, "search", None);
        let result = tool.invoke(json!({"q": "rust"})).await.unwrap();

        assert_eq!(tool.name(), "gw_search");
        assert_eq!(result["tool"], "search");
        assert_eq!(upstream.calls(), vec!["search".to_string()]);
    }

    #[tokio::test]
    async fn test_context_is_ignored() {
        let upstream = Arc::new(FakeSyncProvider::new(&["a"]));
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_sync("p1", None, upstream.clone());
        let registry = Arc::new(registry);
        let tool = wrap(&registry, handle, "a", None);

        let mut context = ToolContext::new();
        context.insert("user".to_string(), json!("alice"));

        let with_context = tool.invoke_with_context(json!({}), Some(&context)).await.unwrap();
        let without = tool.invoke(json!({})).await.unwrap();

        assert_eq!(with_context, without);
        assert_eq!(upstream.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_error_propagated() {
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_sync(
            "p1",
            None,
            Arc::new(FakeSyncProvider::new(&["a"]).failing_calls()),
        );
        let registry = Arc::new(registry);
        let tool = wrap(&registry, handle, "a", None);

        let err = tool.invoke(json!({})).await.unwrap_err();
        match &err {
            GatewayError::ProviderInvocation { provider, tool, .. } => {
                assert_eq!(provider, "p1");
                assert_eq!(tool, "a");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(
            err.provider_error(),
            Some(&ProviderError::Remote {
                code: -32000,
                message: "a exploded".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_enforced() {
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_async(
            "slow",
            None,
            Arc::new(FakeAsyncProvider::new(&["a"]).with_delay(Duration::from_secs(60))),
        );
        let registry = Arc::new(registry);
        let tool = wrap(&registry, handle, "a", Some(Duration::from_secs(5)));

        let err = tool.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout { seconds: 5, .. }));
    }

    #[tokio::test]
    async fn test_timed_out_blocking_call_frees_provider() {
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_sync("stdio", None, Arc::new(StallingProvider::default()));
        let registry = Arc::new(registry);
        let slow = wrap(&registry, handle, "slow", Some(Duration::from_secs(1)));
        let fast = wrap(&registry, handle, "fast", Some(Duration::from_secs(1)));

        let err = slow.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout { seconds: 1, .. }));

        let result = fast.invoke(json!({})).await.unwrap();
        assert_eq!(result, json!({"tool": "fast"}));
    }

    #[tokio::test]
    async fn test_dropped_registry_reports_provider_gone() {
        let mut registry = ProviderRegistry::new();
        let handle = registry.register_sync("p1", None, Arc::new(FakeSyncProvider::new(&["a"])));
        let registry = Arc::new(registry);
        let tool = wrap(&registry, handle, "a", None);
        drop(registry);

        let err = tool.invoke(json!({})).await.unwrap_err();
        assert!(matches!(err, GatewayError::ProviderGone(h) if h == handle));
    }
}
