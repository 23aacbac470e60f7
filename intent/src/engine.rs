//! Matching engine interface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Raw result of a single engine match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMatch {
    /// Key of the matched intent, as it was added to the engine.
    pub key: String,

    /// Extracted slot values, keyed by slot name as written in the template.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub entities: HashMap<String, String>,
}

/// Pattern store and matcher for one language.
///
/// Engines know nothing about skills or languages: they store opaque keys
/// and their samples. Implementations must make `add_intent` all-or-nothing,
/// so that a failed add leaves the previous templates for that key in place.
pub trait MatchEngine: Send + Sync {
    /// Short identifier reported in match results.
    fn name(&self) -> &str;

    /// Add or replace the samples for an intent key.
    fn add_intent(&mut self, key: &str, samples: &[String]) -> Result<()>;

    /// Add or replace the values for an entity key.
    fn add_entity(&mut self, key: &str, samples: &[String]) -> Result<()>;

    /// Remove an intent key. Unknown keys are ignored.
    fn remove_intent(&mut self, key: &str);

    /// Remove an entity key. Unknown keys are ignored.
    fn remove_entity(&mut self, key: &str);

    /// Match a normalized query against the stored intents.
    fn calc_intent(&self, query: &str) -> Option<RawMatch>;
}

/// Factory creating a fresh engine for a language code.
pub type EngineFactory = dyn Fn(&str) -> Box<dyn MatchEngine> + Send + Sync;
