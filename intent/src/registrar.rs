//! Skill-scoped registration of intents and entities.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::NameCodec;
use crate::error::{IntentError, Result};
use crate::registry::{EngineRegistry, EngineState};

/// Bookkeeping record of one registered intent or entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub skill_id: String,
    pub lang: String,
    pub samples: Vec<String>,
}

/// Authoritative registrar for intents and entities.
///
/// Every add and remove goes through here: names are validated and encoded
/// with the [`NameCodec`], pushed into the language's engine, and recorded in
/// that engine's bookkeeping under the same write lock.
#[derive(Debug)]
pub struct IntentRegistrar {
    registry: Arc<EngineRegistry>,
    codec: NameCodec,
}

impl IntentRegistrar {
    /// Create a registrar pushing into `registry`, encoding keys with `codec`.
    pub fn new(registry: Arc<EngineRegistry>, codec: NameCodec) -> Self {
        Self { registry, codec }
    }

    /// Codec used for every key this registrar writes.
    pub fn codec(&self) -> NameCodec {
        self.codec
    }

    /// Registry holding the per-language engines.
    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Register (or replace) an intent of `skill_id` in `lang`.
    ///
    /// Empty `samples` default to the intent name itself.
    ///
    /// # Errors
    /// `InvalidName` for a blank or separator-containing name, skill id or
    /// slot name;
    /// `Template` if the engine rejects a sample. Either way the previously
    /// registered state is left untouched.
    pub fn register_intent(
        &self,
        skill_id: &str,
        name: &str,
        samples: &[String],
        lang: &str,
    ) -> Result<()> {
        let key = self.codec.encode(name, skill_id)?;
        let samples = normalize_samples(name, samples);
        let scoped = samples
            .iter()
            .map(|s| scope_slots(s, skill_id, self.codec.separator()))
            .collect::<Result<Vec<String>>>()?;

        let handle = self.registry.get_or_create(lang);
        let mut state = handle.write();
        state.engine.add_intent(&key, &scoped)?;
        state.intents.insert(key, samples);

        debug!("intent: registered intent {} for {} ({})", name, skill_id, handle.lang());
        Ok(())
    }

    /// Register (or replace) an entity of `skill_id` in `lang`.
    pub fn register_entity(
        &self,
        skill_id: &str,
        name: &str,
        samples: &[String],
        lang: &str,
    ) -> Result<()> {
        let key = self.codec.encode(name, skill_id)?;
        let samples = normalize_samples(name, samples);

        let handle = self.registry.get_or_create(lang);
        let mut state = handle.write();
        state.engine.add_entity(&key, &samples)?;
        state.entities.insert(key, samples);

        debug!("intent: registered entity {} for {} ({})", name, skill_id, handle.lang());
        Ok(())
    }

    /// Remove an intent from every language. Returns how many languages
    /// actually held it; unknown intents are a no-op.
    pub fn detach_intent(&self, skill_id: &str, name: &str) -> usize {
        let Ok(key) = self.codec.encode(name, skill_id) else {
            return 0;
        };

        let mut removed = 0;
        for handle in self.registry.handles() {
            let mut state = handle.write();
            if state.intents.remove(&key).is_some() {
                state.engine.remove_intent(&key);
                removed += 1;
                debug!("intent: detached intent {} for {} ({})", name, skill_id, handle.lang());
            }
        }
        removed
    }

    /// Remove an entity from every language. Returns how many languages
    /// actually held it.
    pub fn detach_entity(&self, skill_id: &str, name: &str) -> usize {
        let Ok(key) = self.codec.encode(name, skill_id) else {
            return 0;
        };

        let mut removed = 0;
        for handle in self.registry.handles() {
            let mut state = handle.write();
            if state.entities.remove(&key).is_some() {
                state.engine.remove_entity(&key);
                removed += 1;
                debug!("intent: detached entity {} for {} ({})", name, skill_id, handle.lang());
            }
        }
        removed
    }

    /// Remove every intent and entity owned by `skill_id`, in every language.
    ///
    /// Languages are processed one at a time; within a language the whole
    /// skill is removed under a single write lock. Returns the number of
    /// registrations removed.
    pub fn detach_skill(&self, skill_id: &str) -> usize {
        let mut removed = 0;

        for handle in self.registry.handles() {
            let mut state = handle.write();

            let intents: Vec<String> = state
                .intents
                .keys()
                .filter(|k| self.codec.owned_by(k, skill_id).is_some())
                .cloned()
                .collect();
            for key in &intents {
                state.intents.remove(key);
                state.engine.remove_intent(key);
            }

            let entities: Vec<String> = state
                .entities
                .keys()
                .filter(|k| self.codec.owned_by(k, skill_id).is_some())
                .cloned()
                .collect();
            for key in &entities {
                state.entities.remove(key);
                state.engine.remove_entity(key);
            }

            let n = intents.len() + entities.len();
            if n > 0 {
                debug!("intent: detached {} registrations of {} ({})", n, skill_id, handle.lang());
            }
            removed += n;
        }

        removed
    }

    /// All registered intents, sorted by language then key.
    pub fn registered_intents(&self) -> Vec<Registration> {
        self.collect(|state| &state.intents)
    }

    /// All registered entities, sorted by language then key.
    pub fn registered_entities(&self) -> Vec<Registration> {
        self.collect(|state| &state.entities)
    }

    /// Samples of an intent as registered, if present in `lang`.
    pub fn intent_samples(&self, skill_id: &str, name: &str, lang: &str) -> Option<Vec<String>> {
        let key = self.codec.encode(name, skill_id).ok()?;
        let handle = self.registry.get(lang)?;
        let state = handle.read();
        state.intents.get(&key).cloned()
    }

    /// Sorted, de-duplicated ids of skills with at least one registration.
    pub fn skills(&self) -> Vec<String> {
        let mut skills: Vec<String> = self
            .registered_intents()
            .into_iter()
            .chain(self.registered_entities())
            .map(|r| r.skill_id)
            .collect();
        skills.sort();
        skills.dedup();
        skills
    }

    fn collect<F>(&self, pick: F) -> Vec<Registration>
    where
        F: Fn(&EngineState) -> &BTreeMap<String, Vec<String>>,
    {
        let mut out = Vec::new();
        for handle in self.registry.handles() {
            let state = handle.read();
            for (key, samples) in pick(&*state) {
                if let Ok((name, skill_id)) = self.codec.decode(key) {
                    out.push(Registration {
                        name,
                        skill_id,
                        lang: handle.lang().to_string(),
                        samples: samples.clone(),
                    });
                }
            }
        }
        out
    }
}

/// Trim samples and drop blank ones; fall back to the name itself.
fn normalize_samples(name: &str, samples: &[String]) -> Vec<String> {
    let samples: Vec<String> = samples
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if samples.is_empty() {
        return vec![name.trim().to_string()];
    }
    samples
}

/// Scope every `{slot}` in a template to the owning skill, so that slots
/// only resolve against that skill's entities. Malformed braces are left
/// alone for the engine to reject.
///
/// # Errors
/// `InvalidName` if a slot name contains the separator.
pub(crate) fn scope_slots(template: &str, skill_id: &str, sep: char) -> Result<String> {
    let mut out = String::with_capacity(template.len() + skill_id.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };

        let slot = after[..close].trim();
        if slot.contains(sep) {
            return Err(IntentError::InvalidName(slot.to_string()));
        }
        if slot.is_empty() {
            out.push_str(&rest[open..open + close + 2]);
        } else {
            out.push('{');
            out.push_str(slot);
            out.push(sep);
            out.push_str(skill_id);
            out.push('}');
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
