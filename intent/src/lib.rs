//! Skill-scoped, multi-language intent registry.
//!
//! Skills register intents (sample templates) and entities (value lists) per
//! language; utterances are then matched against the engine for their
//! language and resolved back to the owning skill.
//!
//! - Names are namespaced as `{name}:{skill_id}` by [`NameCodec`], so two
//!   skills can reuse the same intent or entity name.
//! - Each language gets its own [`MatchEngine`], created on first use by the
//!   [`EngineRegistry`].
//! - Confidence is a heuristic from the number of segments the utterance
//!   splits into: one segment gives 0.9.
//!
//! Templates understand `{slot}` placeholders and `(a|b)` alternatives; an
//! empty alternative makes a group optional: `turn (on|off) the (|living room) light`.
//!
//! # Example
//!
//! ```rust
//! use giztoy_intent::{IntentService, MatchContext, ServiceConfig};
//!
//! let svc = IntentService::new(ServiceConfig::default()).unwrap();
//!
//! let cities = vec!["london".to_string(), "paris".to_string()];
//! svc.register_entity("weather.skill", "city", Some(cities.as_slice()), None).unwrap();
//!
//! let samples = vec!["what is the weather in {city}".to_string()];
//! svc.register_intent("weather.skill", "current", Some(samples.as_slice()), None).unwrap();
//!
//! let m = svc
//!     .match_utterances(&["What is the weather in Paris"], None, &MatchContext::default())
//!     .unwrap();
//! assert_eq!(m.intent_name, "current");
//! assert_eq!(m.skill_id, "weather.skill");
//! assert_eq!(m.entities["city"], "paris");
//! assert!((m.confidence - 0.9).abs() < 1e-9);
//! ```

mod codec;
mod config;
mod dispatcher;
mod engine;
mod error;
mod manifest;
mod registrar;
mod registry;
mod segment;
mod service;
mod template;

pub use codec::{NameCodec, DEFAULT_SEPARATOR};
pub use config::{ServiceConfig, DEFAULT_LANG};
pub use dispatcher::{
    confidence, normalize_utterance, utterance_remainder, ConfidencePolicy, MatchDispatcher,
    MatchResult, DEFAULT_MIN_CONFIDENCE,
};
pub use engine::{EngineFactory, MatchEngine, RawMatch};
pub use error::{IntentError, Result};
pub use manifest::{ManifestEntry, SkillManifest};
pub use registrar::{IntentRegistrar, Registration};
pub use registry::{normalize_lang, EngineHandle, EngineRegistry, LanguageEngine};
pub use segment::{MarkerSegmenter, NopSegmenter, Segmenter};
pub use service::{IntentService, MatchContext};
pub use template::{TemplateEngine, ENGINE_NAME};

#[cfg(test)]
mod tests;
