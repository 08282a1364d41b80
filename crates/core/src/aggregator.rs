// Catalog aggregation across all registered providers

use crate::catalog::{AggregationReport, Catalog, ProviderReport};
use crate::config::{DuplicatePolicy, FailurePolicy, GatewayConfig};
use crate::delegate::DelegatingTool;
use crate::descriptor::ToolDescriptor;
use crate::error::{GatewayError, GatewayResult, ProviderError};
use crate::naming::NamingPolicy;
use crate::provider::{ProviderHandle, ProviderRegistry, RegisteredProvider};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Builds a [`Catalog`] from a provider registry.
///
/// Entry order is: blocking providers in registration order, then
/// non-blocking providers in registration order, each provider's tools in the
/// order it listed them. Non-blocking providers are listed concurrently; the
/// order above still holds.
#[derive(Debug, Clone)]
pub struct CatalogAggregator {
    policy: NamingPolicy,
    timeout: Option<Duration>,
    list_timeout: Option<Duration>,
    on_failure: FailurePolicy,
    duplicates: DuplicatePolicy,
}

type Listing<'a> = (
    ProviderHandle,
    &'a RegisteredProvider,
    Result<Vec<ToolDescriptor>, ProviderError>,
);

impl CatalogAggregator {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            policy: NamingPolicy::from_config(config),
            timeout: config.call_timeout(),
            list_timeout: config.list_timeout(),
            on_failure: config.on_provider_failure,
            duplicates: config.duplicate_names,
        }
    }

    /// Enumerate every provider and wrap each tool in a [`DelegatingTool`].
    pub async fn aggregate(&self, registry: &Arc<ProviderRegistry>) -> GatewayResult<Catalog> {
        let sync_count = registry.sync_providers().count();
        let async_count = registry.async_providers().count();
        tracing::info!(
            "Aggregating tools from {} sync and {} async providers",
            sync_count,
            async_count
        );

        let mut listings: Vec<Listing<'_>> = Vec::with_capacity(registry.len());

        for (handle, provider) in registry.sync_providers() {
            listings.push((handle, provider, self.enumerate(provider).await));
        }

        let pending = registry.async_providers().map(|(handle, provider)| async move {
            (handle, provider, self.enumerate(provider).await)
        });
        listings.extend(join_all(pending).await);

        let mut entries = Vec::new();
        let mut reports = Vec::with_capacity(listings.len());

        for (handle, provider, listing) in listings {
            match listing {
                Ok(tools) => {
                    reports.push(ProviderReport {
                        provider: provider.id().to_string(),
                        kind: provider.kind().label().to_string(),
                        tools: tools.len(),
                        error: None,
                    });
                    entries.extend(tools.iter().map(|tool| {
                        DelegatingTool::new(tool, handle, provider, registry, &self.policy, self.timeout)
                    }));
                }
                Err(source) => match self.on_failure {
                    FailurePolicy::Fail => {
                        tracing::error!("Provider '{}' failed to list tools: {}", provider.id(), source);
                        return Err(GatewayError::ProviderEnumeration {
                            provider: provider.id().to_string(),
                            source,
                        });
                    }
                    FailurePolicy::Skip => {
                        tracing::warn!(
                            "Skipping provider '{}', failed to list tools: {}",
                            provider.id(),
                            source
                        );
                        reports.push(ProviderReport {
                            provider: provider.id().to_string(),
                            kind: provider.kind().label().to_string(),
                            tools: 0,
                            error: Some(source.to_string()),
                        });
                    }
                },
            }
        }

        tracing::debug!("Total tools aggregated: {}", entries.len());

        let report = AggregationReport {
            aggregated_at: Utc::now(),
            providers: reports,
        };
        Ok(Catalog::new(entries, self.duplicates, report))
    }

    /// List one provider's tools; a listing that outlives the limit is a
    /// transport failure like any other.
    async fn enumerate(
        &self,
        provider: &RegisteredProvider,
    ) -> Result<Vec<ToolDescriptor>, ProviderError> {
        provider
            .within(self.list_timeout, provider.list_tools())
            .await
            .unwrap_or_else(|limit| {
                Err(ProviderError::Transport(format!(
                    "tools/list timed out after {}s",
                    limit.as_secs()
                )))
            })
    }
}
