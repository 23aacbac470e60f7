//! Utterance dispatch: engine lookup, raw match, and result packaging.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::codec::NameCodec;
use crate::registry::EngineRegistry;
use crate::segment::Segmenter;

/// Default minimum confidence for a match to be returned.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// What to do with the `min_confidence` threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidencePolicy {
    /// Drop results whose confidence is below the threshold.
    #[default]
    Enforce,
    /// Return results regardless of the threshold.
    Report,
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Intent name, without the skill namespace.
    pub intent_name: String,

    /// Skill that registered the intent.
    pub skill_id: String,

    /// Extracted slot values, keyed by plain slot name.
    #[serde(default)]
    pub entities: HashMap<String, String>,

    /// Heuristic confidence in `[0.0, 0.9]`.
    pub confidence: f64,

    /// Normalized utterance that was matched.
    pub utterance: String,

    /// Words of the utterance not covered by the intent's samples.
    #[serde(default)]
    pub utterance_remainder: String,

    /// Language the match was made in.
    pub lang: String,

    /// Engine that produced the match.
    pub matcher: String,
}

/// Confidence for an utterance that splits into `segment_count` segments.
///
/// One segment gives 0.9; every extra segment lowers it, down to 0.0 from
/// eleven segments on.
pub fn confidence(segment_count: usize) -> f64 {
    (1.0 / segment_count.max(1) as f64 - 0.1).max(0.0)
}

/// Trim and lowercase an utterance.
pub fn normalize_utterance(utterance: &str) -> String {
    utterance.trim().to_lowercase()
}

/// Words of `utterance` that appear in none of `samples`.
///
/// Slot placeholders and grouping characters in the samples are ignored.
pub fn utterance_remainder(utterance: &str, samples: &[String]) -> String {
    let vocab: HashSet<String> = samples
        .iter()
        .flat_map(|s| {
            s.split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '|'))
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
        })
        .filter(|w| !w.is_empty() && !w.contains('{') && !w.contains('}'))
        .collect();

    utterance
        .split_whitespace()
        .filter(|w| !vocab.contains(&w.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Routes utterances to the right language engine and packages matches.
pub struct MatchDispatcher {
    registry: Arc<EngineRegistry>,
    codec: NameCodec,
    segmenter: Arc<dyn Segmenter>,
    policy: ConfidencePolicy,
}

impl MatchDispatcher {
    /// Create a dispatcher over `registry`. `codec` must be the one the
    /// registrar encodes keys with.
    pub fn new(
        registry: Arc<EngineRegistry>,
        codec: NameCodec,
        segmenter: Arc<dyn Segmenter>,
        policy: ConfidencePolicy,
    ) -> Self {
        Self {
            registry,
            codec,
            segmenter,
            policy,
        }
    }

    /// Threshold policy applied by [`match_utterance`](Self::match_utterance).
    pub fn policy(&self) -> ConfidencePolicy {
        self.policy
    }

    /// Match one utterance in `lang`.
    ///
    /// Returns `None` when nothing matched, including for languages that have
    /// no registrations at all. Internal inconsistencies are logged and also
    /// reported as `None`.
    pub fn match_utterance(
        &self,
        utterance: &str,
        lang: &str,
        min_confidence: f64,
    ) -> Option<MatchResult> {
        let utterance = normalize_utterance(utterance);
        if utterance.is_empty() {
            return None;
        }

        let handle = self.registry.get_or_create(lang);
        let (raw, samples, matcher) = {
            let state = handle.read();
            let raw = state.engine.calc_intent(&utterance)?;
            let Some(samples) = state.intents.get(&raw.key).cloned() else {
                warn!("intent: engine returned unregistered key {:?} ({})", raw.key, handle.lang());
                return None;
            };
            (raw, samples, state.engine.name().to_string())
        };

        let (intent_name, skill_id) = match self.codec.decode(&raw.key) {
            Ok(pair) => pair,
            Err(e) => {
                error!("intent: {} ({})", e, handle.lang());
                return None;
            }
        };

        let segments = self.segmenter.segment(&utterance, handle.lang()).len();
        let confidence = confidence(segments);
        if self.policy == ConfidencePolicy::Enforce && confidence < min_confidence {
            debug!(
                "intent: {} for {} below threshold: {:.2} < {:.2}",
                intent_name, skill_id, confidence, min_confidence
            );
            return None;
        }

        let entities = raw
            .entities
            .into_iter()
            .map(|(slot, value)| (self.codec.owned_by(&slot, &skill_id).unwrap_or(slot), value))
            .collect();

        Some(MatchResult {
            utterance_remainder: utterance_remainder(&utterance, &samples),
            intent_name,
            skill_id,
            entities,
            confidence,
            utterance,
            lang: handle.lang().to_string(),
            matcher,
        })
    }

    /// Match several candidate transcriptions and keep the most confident
    /// result. Earlier candidates win ties.
    pub fn match_best<S: AsRef<str>>(
        &self,
        utterances: &[S],
        lang: &str,
        min_confidence: f64,
    ) -> Option<MatchResult> {
        let mut best: Option<MatchResult> = None;
        for utterance in utterances {
            let Some(result) = self.match_utterance(utterance.as_ref(), lang, min_confidence) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| result.confidence > b.confidence) {
                best = Some(result);
            }
        }
        best
    }
}

impl std::fmt::Debug for MatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchDispatcher")
            .field("registry", &self.registry)
            .field("codec", &self.codec)
            .field("policy", &self.policy)
            .finish()
    }
}
