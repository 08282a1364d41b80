// Core types and functionality for the Toolbridge tool gateway

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod delegate;
pub mod descriptor;
pub mod error;
pub mod gateway;
pub mod naming;
pub mod provider;

#[cfg(test)]
mod testing;

pub use aggregator::CatalogAggregator;
pub use catalog::{AggregationReport, Catalog, ProviderReport};
pub use config::{AliasSource, DuplicatePolicy, FailurePolicy, GatewayConfig, PrefixMode};
pub use delegate::DelegatingTool;
pub use descriptor::{ToolContext, ToolDescriptor};
pub use error::{GatewayError, GatewayResult, ProviderError};
pub use gateway::Gateway;
pub use naming::{resolve, NamingPolicy};
pub use provider::{
    AsyncToolProvider, ProviderHandle, ProviderKind, ProviderRegistry, RegisteredProvider,
    SyncToolProvider,
};
