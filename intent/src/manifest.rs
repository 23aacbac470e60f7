//! Skill manifests: a file-based description of one skill's intents and
//! entities.
//!
//! YAML/JSON supports `samples` as a list or as a single string:
//!
//! ```yaml
//! skill_id: weather.skill
//! lang: en-us
//! entities:
//!   - name: city
//!     samples: [london, paris, new york]
//! intents:
//!   - name: current_weather
//!     samples:
//!       - what is the weather in {city}
//!       - weather in {city}
//!   - name: forecast
//!     lang: es-es
//!     samples: "pronóstico para {city}"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{IntentError, Result};

/// One intent or entity declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,

    /// Overrides the manifest-level language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,

    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

/// Intents and entities of a single skill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillManifest {
    pub skill_id: String,

    /// Language for entries that do not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<ManifestEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<ManifestEntry>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

impl SkillManifest {
    /// Parse a manifest from YAML bytes.
    pub fn from_yaml(data: &[u8]) -> Result<Self> {
        let m: Self = serde_yaml::from_slice(data)?;
        m.validate()?;
        Ok(m)
    }

    /// Parse a manifest from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let m: Self = serde_json::from_slice(data)?;
        m.validate()?;
        Ok(m)
    }

    /// Load a manifest file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
            "json" => Self::from_json(&data),
            "yaml" | "yml" => Self::from_yaml(&data),
            ext => Err(IntentError::Manifest(format!(
                "unsupported extension {:?}: {}",
                ext,
                path.display()
            ))),
        }
    }

    /// Load every `.json`, `.yaml` and `.yml` manifest under `dir`,
    /// recursively, in path order.
    pub fn load_dir(dir: &Path) -> Result<Vec<Self>> {
        let mut paths = Vec::new();
        walk(dir, &mut paths)?;
        paths.sort();

        let mut manifests = Vec::new();
        for path in paths {
            let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
            if !matches!(ext, "json" | "yaml" | "yml") {
                continue;
            }
            let m = Self::load(&path).map_err(|e| match e {
                IntentError::Manifest(msg) => IntentError::Manifest(format!("{}: {}", path.display(), msg)),
                other => other,
            })?;
            manifests.push(m);
        }
        Ok(manifests)
    }

    fn validate(&self) -> Result<()> {
        if self.skill_id.trim().is_empty() {
            return Err(IntentError::Manifest("skill_id is required".to_string()));
        }
        for entry in self.intents.iter().chain(&self.entities) {
            if entry.name.trim().is_empty() {
                return Err(IntentError::Manifest(format!(
                    "skill {:?}: entry without a name",
                    self.skill_id
                )));
            }
        }
        Ok(())
    }
}

fn walk(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, paths)?;
        } else {
            paths.push(path);
        }
    }
    Ok(())
}
