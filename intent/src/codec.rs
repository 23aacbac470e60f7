//! Namespaced key encoding for (name, skill_id) pairs.
//!
//! Engines have no notion of skill ownership, so every intent and entity is
//! stored under a single key that carries both parts:
//!
//! ```text
//! {name}{sep}{skill_id}      e.g. "current_weather:weather.skill"
//! ```
//!
//! Neither part may contain the separator, which makes the encoding
//! injective: a key decodes to exactly one pair.

use crate::error::{IntentError, Result};

/// Default key separator.
pub const DEFAULT_SEPARATOR: char = ':';

/// Bidirectional encoder between (name, skill_id) and a namespaced key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameCodec {
    sep: char,
}

impl Default for NameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl NameCodec {
    /// Create a codec using the given separator.
    pub fn new(sep: char) -> Self {
        Self { sep }
    }

    /// Return the separator used by this codec.
    pub fn separator(&self) -> char {
        self.sep
    }

    /// Check that `name` can be one half of a key.
    ///
    /// # Errors
    /// Returns `InvalidName` if the name is blank or contains the separator.
    pub fn validate(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() || name.contains(self.sep) {
            return Err(IntentError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Encode a (name, skill_id) pair.
    pub fn encode(&self, name: &str, skill_id: &str) -> Result<String> {
        self.validate(name)?;
        self.validate(skill_id)?;
        Ok(format!("{name}{}{skill_id}", self.sep))
    }

    /// Decode a key back into (name, skill_id).
    ///
    /// # Errors
    /// Returns `MalformedKey` unless the key holds exactly one separator with
    /// a non-empty part on each side.
    pub fn decode(&self, key: &str) -> Result<(String, String)> {
        let malformed = || IntentError::MalformedKey(key.to_string());

        let (name, skill_id) = key.split_once(self.sep).ok_or_else(malformed)?;
        if name.is_empty() || skill_id.is_empty() || skill_id.contains(self.sep) {
            return Err(malformed());
        }
        Ok((name.to_string(), skill_id.to_string()))
    }

    /// Decode a key and return it only if it is owned by `skill_id`.
    pub fn owned_by(&self, key: &str, skill_id: &str) -> Option<String> {
        match self.decode(key) {
            Ok((name, owner)) if owner == skill_id => Some(name),
            _ => None,
        }
    }
}
