//! Option structs for the reconciler and serializer.
//!
//! Both load from JSON so a host can keep them next to its own settings:
//!
//! ```json
//! { "max_depth": 2 }
//! ```

use serde::{Deserialize, Serialize};

/// Reconciler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Levels merged recursively before a changed match is replaced outright
    pub max_depth: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { max_depth: 1 }
    }
}

impl ReconcileConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Serializer settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerOptions {
    /// Render soft-deleted children instead of skipping them
    pub include_removed: bool,
}

impl SerializerOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
