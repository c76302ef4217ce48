//! Update Settings
//!
//! Knobs consulted by the updater. Everything has a default that reproduces
//! the stock behavior, so an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings owned by [`Main`](crate::Main) and applied to every update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    /// Which driver expressions are known not to move values around.
    pub driver_policy: DriverPolicy,

    /// Fan the independent topology passes out on the rayon pool.
    pub parallel_topology: bool,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            driver_policy: DriverPolicy::default(),
            parallel_topology: true,
        }
    }
}

impl UpdateSettings {
    /// Parse settings from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Allow-list for driver expressions that do not force an output change.
///
/// Drivers can copy values around a node tree arbitrarily, so any driver
/// is assumed to change the output unless its expression starts with one of
/// the safe prefixes and the remainder only uses the allowed characters
/// (plain arithmetic on the frame number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverPolicy {
    pub safe_prefixes: Vec<String>,
    pub allowed_trailing_chars: String,
}

impl Default for DriverPolicy {
    fn default() -> Self {
        Self {
            safe_prefixes: vec!["frame".to_string()],
            allowed_trailing_chars: " */+-0123456789.".to_string(),
        }
    }
}

impl DriverPolicy {
    /// Whether the expression cannot change the tree's output structure.
    pub fn is_safe(&self, expression: &str) -> bool {
        self.safe_prefixes.iter().any(|prefix| {
            expression.strip_prefix(prefix.as_str()).is_some_and(|rest| {
                rest.chars()
                    .all(|c| self.allowed_trailing_chars.contains(c))
            })
        })
    }
}
