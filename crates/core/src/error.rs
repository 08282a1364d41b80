//! Error types for the tool gateway.

use crate::provider::ProviderHandle;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure reported by an upstream provider.
///
/// Providers return this from both enumeration and invocation. The gateway
/// never rewrites it; it is carried as the `source` of the corresponding
/// [`GatewayError`] variant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// The provider could not be reached (process died, connection refused, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with something that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The provider answered with an explicit error.
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },
}

/// Error types that can occur while aggregating or invoking tools.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A provider could not be asked for its tool list.
    #[error("failed to list tools of provider '{provider}'")]
    ProviderEnumeration {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// A delegated call failed upstream.
    #[error("provider '{provider}' failed to run tool '{tool}'")]
    ProviderInvocation {
        provider: String,
        tool: String,
        #[source]
        source: ProviderError,
    },

    /// A delegated call did not finish within the configured timeout.
    #[error("tool '{tool}' timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    /// No catalog entry is published under this name.
    #[error("tool not found: {0}")]
    UnknownTool(String),

    /// Several catalog entries share this name and duplicates are rejected.
    #[error("tool name '{name}' is ambiguous ({count} entries)")]
    AmbiguousTool { name: String, count: usize },

    /// The provider registry backing an entry no longer exists.
    #[error("provider {0} is no longer registered")]
    ProviderGone(ProviderHandle),

    /// No catalog snapshot has been built successfully yet.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

impl GatewayError {
    /// The upstream failure wrapped by this error, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::ProviderEnumeration { source, .. } | Self::ProviderInvocation { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
