use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity and metadata of one callable tool.
///
/// `input_schema` is kept as the raw schema text the provider sent and is never
/// interpreted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: String,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: input_schema.into(),
        }
    }

    /// Same metadata, published under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Auxiliary invocation context supplied by the caller.
///
/// Accepted on every invocation path but not forwarded upstream.
pub type ToolContext = HashMap<String, serde_json::Value>;
