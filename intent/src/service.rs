//! Host-facing intent service.

use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::NameCodec;
use crate::config::ServiceConfig;
use crate::dispatcher::{MatchDispatcher, MatchResult};
use crate::error::Result;
use crate::manifest::SkillManifest;
use crate::registrar::IntentRegistrar;
use crate::registry::EngineRegistry;
use crate::segment::{MarkerSegmenter, Segmenter};

/// Per-call match options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchContext {
    /// Overrides [`ServiceConfig::min_confidence`] for this call.
    pub min_confidence: Option<f64>,

    /// Opaque caller session, only used for logging.
    pub session_id: Option<String>,
}

impl MatchContext {
    /// Context that only overrides the threshold.
    pub fn with_min_confidence(min_confidence: f64) -> Self {
        Self {
            min_confidence: Some(min_confidence),
            ..Default::default()
        }
    }
}

/// Registration and matching entry point for hosts.
///
/// Wires one [`EngineRegistry`] into an [`IntentRegistrar`] and a
/// [`MatchDispatcher`] sharing the same [`NameCodec`]. All methods take
/// `&self`; the service can be shared across threads behind an `Arc`.
#[derive(Debug)]
pub struct IntentService {
    config: ServiceConfig,
    registrar: IntentRegistrar,
    dispatcher: MatchDispatcher,
}

impl IntentService {
    /// Create a service with the template engine and marker segmenter.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        Self::with_components(
            config,
            Arc::new(EngineRegistry::with_default_engine()),
            Arc::new(MarkerSegmenter::new()),
        )
    }

    /// Create a service over a caller-provided registry and segmenter.
    pub fn with_components(
        config: ServiceConfig,
        registry: Arc<EngineRegistry>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Result<Self> {
        config.validate()?;
        let codec = NameCodec::new(config.separator);
        let registrar = IntentRegistrar::new(Arc::clone(&registry), codec);
        let dispatcher = MatchDispatcher::new(registry, codec, segmenter, config.confidence_policy);
        Ok(Self {
            config,
            registrar,
            dispatcher,
        })
    }

    /// Config the service was built with.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Registrar, for audit listings.
    pub fn registrar(&self) -> &IntentRegistrar {
        &self.registrar
    }

    /// Dispatcher, for single-utterance matching with an explicit language.
    pub fn dispatcher(&self) -> &MatchDispatcher {
        &self.dispatcher
    }

    /// Register an intent. `samples` default to the name, `lang` to the
    /// configured language.
    pub fn register_intent(
        &self,
        skill_id: &str,
        name: &str,
        samples: Option<&[String]>,
        lang: Option<&str>,
    ) -> Result<()> {
        self.registrar
            .register_intent(skill_id, name, samples.unwrap_or_default(), self.lang(lang))
    }

    /// Register an entity. `samples` default to the name, `lang` to the
    /// configured language.
    pub fn register_entity(
        &self,
        skill_id: &str,
        name: &str,
        samples: Option<&[String]>,
        lang: Option<&str>,
    ) -> Result<()> {
        self.registrar
            .register_entity(skill_id, name, samples.unwrap_or_default(), self.lang(lang))
    }

    /// Remove an intent from every language. Returns the number of
    /// languages that held it.
    pub fn detach_intent(&self, skill_id: &str, name: &str) -> usize {
        self.registrar.detach_intent(skill_id, name)
    }

    /// Remove an entity from every language. Returns the number of
    /// languages that held it.
    pub fn detach_entity(&self, skill_id: &str, name: &str) -> usize {
        self.registrar.detach_entity(skill_id, name)
    }

    /// Remove everything `skill_id` registered, in every language. Returns
    /// the number of registrations removed.
    pub fn detach_skill(&self, skill_id: &str) -> usize {
        let n = self.registrar.detach_skill(skill_id);
        info!("intent: detached skill {} ({} registrations)", skill_id, n);
        n
    }

    /// Match candidate transcriptions of one utterance and return the most
    /// confident result.
    pub fn match_utterances<S: AsRef<str>>(
        &self,
        utterances: &[S],
        lang: Option<&str>,
        ctx: &MatchContext,
    ) -> Option<MatchResult> {
        let lang = self.lang(lang);
        let min_confidence = ctx.min_confidence.unwrap_or(self.config.min_confidence);
        let result = self.dispatcher.match_best(utterances, lang, min_confidence);

        if let Some(session) = &ctx.session_id {
            match &result {
                Some(m) => debug!(
                    "intent: session {} matched {} for {} ({:.2})",
                    session, m.intent_name, m.skill_id, m.confidence
                ),
                None => debug!("intent: session {} no match ({})", session, lang),
            }
        }
        result
    }

    /// Registrations take effect immediately; there is nothing to train.
    pub fn train(&self) -> bool {
        true
    }

    /// Register everything a manifest declares, entities first. Returns the
    /// number of registrations made; stops at the first error.
    pub fn load_manifest(&self, manifest: &SkillManifest) -> Result<usize> {
        let default_lang = manifest.lang.as_deref();
        let mut n = 0;

        for entity in &manifest.entities {
            let lang = entity.lang.as_deref().or(default_lang);
            self.register_entity(
                &manifest.skill_id,
                &entity.name,
                Some(entity.samples.as_slice()),
                lang,
            )?;
            n += 1;
        }
        for intent in &manifest.intents {
            let lang = intent.lang.as_deref().or(default_lang);
            self.register_intent(
                &manifest.skill_id,
                &intent.name,
                Some(intent.samples.as_slice()),
                lang,
            )?;
            n += 1;
        }

        info!("intent: loaded skill {} ({} registrations)", manifest.skill_id, n);
        Ok(n)
    }

    fn lang<'a>(&'a self, lang: Option<&'a str>) -> &'a str {
        lang.filter(|l| !l.trim().is_empty())
            .unwrap_or(self.config.lang.as_str())
    }
}
