//! Gateway configuration.
//!
//! Deserialized from the `[gateway]` table of the server configuration file.
//! Every field has a default so an empty table is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How published tool names are derived from upstream names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixMode {
    /// Publish the upstream name unchanged.
    #[default]
    None,
    /// `static_prefix` + delimiter + upstream name.
    Static,
    /// alias + delimiter + upstream name.
    Alias,
}

/// Where the alias used by [`PrefixMode::Alias`] comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasSource {
    /// Every provider shares `fixed_alias`.
    #[default]
    Fixed,
    /// Each provider uses its own alias.
    Provider,
}

/// What aggregation does when one provider cannot list its tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and leave that provider's tools out of the catalog.
    #[default]
    Skip,
    /// Abort the whole aggregation.
    Fail,
}

/// How a lookup resolves a name published by several entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The first registered entry wins.
    #[default]
    First,
    /// The lookup fails with an ambiguity error.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub prefix_mode: PrefixMode,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Per-call timeout for delegated invocations. `0` disables it.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Time allowed for one provider to list its tools. `0` disables it.
    #[serde(default = "default_timeout_seconds")]
    pub list_timeout_seconds: u64,

    #[serde(default)]
    pub alias_source: AliasSource,

    #[serde(default = "default_fixed_alias")]
    pub fixed_alias: String,

    #[serde(default)]
    pub on_provider_failure: FailurePolicy,

    #[serde(default)]
    pub duplicate_names: DuplicatePolicy,
}

fn default_delimiter() -> String {
    "_".to_string()
}

fn default_static_prefix() -> String {
    "gw".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_fixed_alias() -> String {
    "gw".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            prefix_mode: PrefixMode::default(),
            delimiter: default_delimiter(),
            static_prefix: default_static_prefix(),
            timeout_seconds: default_timeout_seconds(),
            list_timeout_seconds: default_timeout_seconds(),
            alias_source: AliasSource::default(),
            fixed_alias: default_fixed_alias(),
            on_provider_failure: FailurePolicy::default(),
            duplicate_names: DuplicatePolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Timeout applied to each delegated call, if enabled.
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Timeout applied to each provider's tool listing, if enabled.
    pub fn list_timeout(&self) -> Option<Duration> {
        (self.list_timeout_seconds > 0).then(|| Duration::from_secs(self.list_timeout_seconds))
    }
}
