// Aggregated tool catalog: read-only listing and invocation by published name

use crate::config::DuplicatePolicy;
use crate::delegate::DelegatingTool;
use crate::descriptor::{ToolContext, ToolDescriptor};
use crate::error::{GatewayError, GatewayResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of enumerating one provider during aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReport {
    pub provider: String,
    pub kind: String,
    pub tools: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub aggregated_at: DateTime<Utc>,
    pub providers: Vec<ProviderReport>,
}

impl AggregationReport {
    /// Providers whose tools are missing from the catalog.
    pub fn failed_providers(&self) -> impl Iterator<Item = &ProviderReport> {
        self.providers.iter().filter(|p| p.error.is_some())
    }
}

/// Immutable snapshot of every published tool.
///
/// Entries keep aggregation order. Entries sharing a published name are all
/// retained; [`lookup`](Self::lookup) resolves them per [`DuplicatePolicy`].
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<DelegatingTool>,
    duplicates: DuplicatePolicy,
    report: AggregationReport,
}

impl Catalog {
    pub fn new(
        entries: Vec<DelegatingTool>,
        duplicates: DuplicatePolicy,
        report: AggregationReport,
    ) -> Self {
        Self {
            entries,
            duplicates,
            report,
        }
    }

    /// Published descriptors in catalog order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(DelegatingTool::describe).collect()
    }

    pub fn entries(&self) -> &[DelegatingTool] {
        &self.entries
    }

    pub fn report(&self) -> &AggregationReport {
        &self.report
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Published names carried by more than one entry, with their counts.
    pub fn duplicate_names(&self) -> Vec<(String, usize)> {
        let mut seen: Vec<(String, usize)> = Vec::new();
        for entry in &self.entries {
            match seen.iter_mut().find(|(name, _)| name == entry.name()) {
                Some((_, count)) => *count += 1,
                None => seen.push((entry.name().to_string(), 1)),
            }
        }
        seen.retain(|(_, count)| *count > 1);
        seen
    }

    /// Find the entry published as `name`.
    pub fn lookup(&self, name: &str) -> GatewayResult<&DelegatingTool> {
        let mut matches = self.entries.iter().filter(|entry| entry.name() == name);
        let first = matches
            .next()
            .ok_or_else(|| GatewayError::UnknownTool(name.to_string()))?;

        let others = matches.count();
        if others == 0 {
            return Ok(first);
        }

        match self.duplicates {
            DuplicatePolicy::First => {
                tracing::warn!(
                    "Tool name '{}' is published by {} entries, using provider '{}'",
                    name,
                    others + 1,
                    first.provider_id()
                );
                Ok(first)
            }
            DuplicatePolicy::Reject => Err(GatewayError::AmbiguousTool {
                name: name.to_string(),
                count: others + 1,
            }),
        }
    }

    /// Invoke the tool published as `name`.
    pub async fn call(&self, name: &str, input: serde_json::Value) -> GatewayResult<serde_json::Value> {
        self.lookup(name)?.invoke(input).await
    }

    pub async fn call_with_context(
        &self,
        name: &str,
        input: serde_json::Value,
        context: Option<&ToolContext>,
    ) -> GatewayResult<serde_json::Value> {
        self.lookup(name)?.invoke_with_context(input, context).await
    }
}
