//! Service configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_SEPARATOR;
use crate::dispatcher::{ConfidencePolicy, DEFAULT_MIN_CONFIDENCE};
use crate::error::{IntentError, Result};

/// Default language for calls that do not name one.
pub const DEFAULT_LANG: &str = "en-us";

/// Characters with a meaning in templates; they cannot be key separators
/// because scoped slot names embed the separator.
const RESERVED: &[char] = &['{', '}', '(', ')', '|'];

/// Configures an [`IntentService`](crate::IntentService).
///
/// ```yaml
/// lang: en-us
/// separator: ":"
/// min_confidence: 0.5
/// confidence_policy: enforce   # or: report
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Language used when a call does not specify one.
    pub lang: String,

    /// Key separator between name and skill id.
    pub separator: char,

    /// Threshold used when a match call does not pass its own.
    pub min_confidence: f64,

    /// Whether the threshold filters results.
    pub confidence_policy: ConfidencePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lang: DEFAULT_LANG.to_string(),
            separator: DEFAULT_SEPARATOR,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            confidence_policy: ConfidencePolicy::default(),
        }
    }
}

impl ServiceConfig {
    /// Parse a config from YAML bytes.
    pub fn from_yaml(data: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(data)?)
    }

    /// Parse a config from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Load a config file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let cfg = match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
            "json" => Self::from_json(&data)?,
            "yaml" | "yml" => Self::from_yaml(&data)?,
            ext => {
                return Err(IntentError::Config(format!(
                    "unsupported config extension {:?}: {}",
                    ext,
                    path.display()
                )));
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the config for values the service cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.lang.trim().is_empty() {
            return Err(IntentError::Config("lang must not be empty".to_string()));
        }
        if self.separator.is_whitespace() || RESERVED.contains(&self.separator) {
            return Err(IntentError::Config(format!(
                "separator {:?} is reserved",
                self.separator
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(IntentError::Config(format!(
                "min_confidence {} outside [0, 1]",
                self.min_confidence
            )));
        }
        Ok(())
    }
}
