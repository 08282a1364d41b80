// Renaming policy for published tool names

use crate::config::{AliasSource, GatewayConfig, PrefixMode};

/// Compute the published name of a tool.
///
/// Total and pure: every input combination yields a name. An empty delimiter
/// concatenates prefix and name directly.
pub fn resolve(
    mode: PrefixMode,
    original_name: &str,
    static_prefix: &str,
    alias_hint: &str,
    delimiter: &str,
) -> String {
    match mode {
        PrefixMode::None => original_name.to_string(),
        PrefixMode::Static => format!("{}{}{}", static_prefix, delimiter, original_name),
        PrefixMode::Alias => format!("{}{}{}", alias_hint, delimiter, original_name),
    }
}

/// Renaming settings bound once per aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    mode: PrefixMode,
    delimiter: String,
    static_prefix: String,
    alias_source: AliasSource,
    fixed_alias: String,
}

impl NamingPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            mode: config.prefix_mode,
            delimiter: config.delimiter.clone(),
            static_prefix: config.static_prefix.clone(),
            alias_source: config.alias_source,
            fixed_alias: config.fixed_alias.clone(),
        }
    }

    pub fn mode(&self) -> PrefixMode {
        self.mode
    }

    /// Alias used for a provider in [`PrefixMode::Alias`].
    pub fn alias_for<'a>(&'a self, provider_alias: &'a str) -> &'a str {
        match self.alias_source {
            AliasSource::Fixed => &self.fixed_alias,
            AliasSource::Provider => provider_alias,
        }
    }

    /// Published name of `original_name` coming from a provider with `provider_alias`.
    pub fn effective_name(&self, original_name: &str, provider_alias: &str) -> String {
        let name = resolve(
            self.mode,
            original_name,
            &self.static_prefix,
            self.alias_for(provider_alias),
            &self.delimiter,
        );
        tracing::trace!("Mapping tool name '{}' to '{}'", original_name, name);
        name
    }
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}
