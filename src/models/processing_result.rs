//! Result payload reported by the external processor on completion.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Schema version this crate writes and understands
pub const PROCESSING_RESULT_SCHEMA_VERSION: u32 = 1;

/// Versioned result schema. Every secondary field is optional and read by
/// name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Name to show for the processed item
    #[serde(default)]
    pub display_name: Option<String>,
    /// Where the processor wrote its output
    #[serde(default)]
    pub output_locator: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Processor-specific extras, passed through untouched
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

fn default_schema_version() -> u32 {
    PROCESSING_RESULT_SCHEMA_VERSION
}

impl Default for ProcessingResult {
    fn default() -> Self {
        Self {
            schema_version: PROCESSING_RESULT_SCHEMA_VERSION,
            display_name: None,
            output_locator: None,
            summary: None,
            attributes: HashMap::new(),
        }
    }
}

impl ProcessingResult {
    /// Whether this crate understands the payload's schema version
    pub fn is_supported_version(&self) -> bool {
        self.schema_version <= PROCESSING_RESULT_SCHEMA_VERSION
    }
}
