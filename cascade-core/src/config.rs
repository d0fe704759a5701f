//! Inspector Configuration
//!
//! Settings for the debug event relay. Every field has a default, so an empty
//! JSON object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::InspectorError;

fn default_source() -> String {
    "cascade-inspector".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_value_len() -> usize {
    256
}

/// Configuration for [`Inspector`](crate::inspector::Inspector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectorConfig {
    /// Source tag written into every envelope, so the extension can tell
    /// relayed messages apart from unrelated traffic.
    #[serde(default = "default_source")]
    pub source: String,

    /// Attach a rendering of the written value to update events.
    #[serde(default = "default_true")]
    pub include_values: bool,

    /// Longest value rendering kept before truncation, in characters.
    #[serde(default = "default_max_value_len")]
    pub max_value_len: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            include_values: true,
            max_value_len: default_max_value_len(),
        }
    }
}

impl InspectorConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, InspectorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InspectorError> {
        if self.source.trim().is_empty() {
            return Err(InspectorError::Config("source must not be empty".to_string()));
        }
        if self.max_value_len == 0 {
            return Err(InspectorError::Config(
                "max_value_len must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
