// Published catalog snapshot with explicit re-aggregation

use crate::aggregator::CatalogAggregator;
use crate::catalog::Catalog;
use crate::config::GatewayConfig;
use crate::descriptor::{ToolContext, ToolDescriptor};
use crate::error::{GatewayError, GatewayResult};
use crate::provider::ProviderRegistry;
use std::sync::Arc;
use tokio::sync::RwLock;

enum Snapshot {
    Pending,
    Ready(Arc<Catalog>),
    Failed(String),
}

/// Owns the provider registry and the currently published catalog.
///
/// The catalog is only rebuilt by [`refresh`](Self::refresh). Readers get an
/// `Arc` to the snapshot and never hold the lock while invoking tools.
pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    config: GatewayConfig,
    snapshot: RwLock<Snapshot>,
}

impl Gateway {
    pub fn new(registry: ProviderRegistry, config: GatewayConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
            snapshot: RwLock::new(Snapshot::Pending),
        }
    }

    /// Re-aggregate all providers and publish the result.
    ///
    /// On failure a previously published catalog stays in place.
    pub async fn refresh(&self) -> GatewayResult<Arc<Catalog>> {
        let aggregator = CatalogAggregator::new(&self.config);
        match aggregator.aggregate(&self.registry).await {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                tracing::info!("Published catalog with {} tools", catalog.len());
                *self.snapshot.write().await = Snapshot::Ready(catalog.clone());
                Ok(catalog)
            }
            Err(e) => {
                let mut snapshot = self.snapshot.write().await;
                if matches!(*snapshot, Snapshot::Ready(_)) {
                    tracing::warn!("Re-aggregation failed, keeping previous catalog: {}", e);
                } else {
                    *snapshot = Snapshot::Failed(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Currently published catalog.
    pub async fn catalog(&self) -> GatewayResult<Arc<Catalog>> {
        match &*self.snapshot.read().await {
            Snapshot::Ready(catalog) => Ok(catalog.clone()),
            Snapshot::Pending => Err(GatewayError::CatalogUnavailable(
                "tools have not been aggregated yet".to_string(),
            )),
            Snapshot::Failed(reason) => Err(GatewayError::CatalogUnavailable(reason.clone())),
        }
    }

    /// Published tool descriptors.
    pub async fn list(&self) -> GatewayResult<Vec<ToolDescriptor>> {
        Ok(self.catalog().await?.list())
    }

    /// Invoke a tool by its published name.
    pub async fn call(
        &self,
        name: &str,
        input: serde_json::Value,
        context: Option<&ToolContext>,
    ) -> GatewayResult<serde_json::Value> {
        let catalog = self.catalog().await?;
        catalog.call_with_context(name, input, context).await
    }
}
