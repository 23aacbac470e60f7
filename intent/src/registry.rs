//! Per-language engine registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::engine::{EngineFactory, MatchEngine};
use crate::template::TemplateEngine;

/// Shared handle to one language's engine.
pub type EngineHandle = Arc<LanguageEngine>;

/// Engine state plus the bookkeeping of what has been pushed into it.
///
/// Both live behind the same lock so that a reader never sees the engine and
/// the bookkeeping disagree.
pub(crate) struct EngineState {
    pub(crate) engine: Box<dyn MatchEngine>,
    /// Namespaced intent key -> samples as registered.
    pub(crate) intents: BTreeMap<String, Vec<String>>,
    /// Namespaced entity key -> samples as registered.
    pub(crate) entities: BTreeMap<String, Vec<String>>,
}

/// A match engine bound to a language code.
pub struct LanguageEngine {
    lang: String,
    state: RwLock<EngineState>,
}

impl LanguageEngine {
    fn new(lang: String, engine: Box<dyn MatchEngine>) -> Self {
        Self {
            lang,
            state: RwLock::new(EngineState {
                engine,
                intents: BTreeMap::new(),
                entities: BTreeMap::new(),
            }),
        }
    }

    /// Normalized language code.
    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// Identifier of the underlying engine.
    pub fn engine_name(&self) -> String {
        self.state.read().engine.name().to_string()
    }

    /// Number of intent keys currently registered in this language.
    pub fn intent_count(&self) -> usize {
        self.state.read().intents.len()
    }

    /// Number of entity keys currently registered in this language.
    pub fn entity_count(&self) -> usize {
        self.state.read().entities.len()
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write()
    }
}

impl fmt::Debug for LanguageEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LanguageEngine {{ lang: {:?} }}", self.lang)
    }
}

/// Owns one engine per language, created on first use.
///
/// Handles are never dropped by the registry, so a handle obtained once stays
/// valid (and is the same handle) for the registry's whole lifetime.
pub struct EngineRegistry {
    factory: Arc<EngineFactory>,
    engines: RwLock<HashMap<String, EngineHandle>>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_default_engine()
    }
}

impl EngineRegistry {
    /// Create a registry that builds engines with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Box<dyn MatchEngine> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry backed by [`TemplateEngine`].
    pub fn with_default_engine() -> Self {
        Self::new(|_| Box::new(TemplateEngine::new()))
    }

    /// Return the engine for `lang`, creating it if this is the first use.
    pub fn get_or_create(&self, lang: &str) -> EngineHandle {
        let lang = normalize_lang(lang);

        if let Some(handle) = self.engines.read().get(&lang) {
            return Arc::clone(handle);
        }

        // Re-checked under the write lock: another thread may have won.
        let mut engines = self.engines.write();
        let handle = engines.entry(lang).or_insert_with_key(|lang| {
            debug!("intent: creating engine for language {}", lang);
            Arc::new(LanguageEngine::new(lang.clone(), (self.factory)(lang)))
        });
        Arc::clone(handle)
    }

    /// Return the engine for `lang` if one was ever created.
    pub fn get(&self, lang: &str) -> Option<EngineHandle> {
        self.engines.read().get(&normalize_lang(lang)).cloned()
    }

    /// Sorted list of languages that have an engine.
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.engines.read().keys().cloned().collect();
        langs.sort();
        langs
    }

    /// Snapshot of all handles, sorted by language.
    pub fn handles(&self) -> Vec<EngineHandle> {
        let mut handles: Vec<EngineHandle> = self.engines.read().values().cloned().collect();
        handles.sort_by(|a, b| a.lang.cmp(&b.lang));
        handles
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineRegistry {{ languages: {:?} }}", self.languages())
    }
}

/// Normalize a language code: trimmed, lowercase, `_` replaced by `-`.
pub fn normalize_lang(lang: &str) -> String {
    lang.trim().to_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = EngineRegistry::with_default_engine();
        let a = registry.get_or_create("en-us");
        let b = registry.get_or_create("en-us");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.languages(), vec!["en-us"]);
    }

    #[test]
    fn test_lang_normalization() {
        let registry = EngineRegistry::with_default_engine();
        let a = registry.get_or_create("en-US");
        let b = registry.get_or_create(" en_us ");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.lang(), "en-us");
    }

    #[test]
    fn test_get_does_not_create() {
        let registry = EngineRegistry::with_default_engine();
        assert!(registry.get("de").is_none());
        registry.get_or_create("de");
        assert!(registry.get("DE").is_some());
    }

    #[test]
    fn test_handles_sorted() {
        let registry = EngineRegistry::with_default_engine();
        for lang in ["pt", "de", "en"] {
            registry.get_or_create(lang);
        }
        let langs: Vec<String> = registry.handles().iter().map(|h| h.lang().to_string()).collect();
        assert_eq!(langs, vec!["de", "en", "pt"]);
    }

    #[test]
    fn test_factory_receives_lang() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let registry = EngineRegistry::new(move |lang| {
            seen_clone.lock().push(lang.to_string());
            Box::new(TemplateEngine::new())
        });

        registry.get_or_create("es-ES");
        registry.get_or_create("es-es");
        assert_eq!(*seen.lock(), vec!["es-es".to_string()]);
        assert_eq!(registry.get_or_create("es").engine_name(), "template");
    }

    #[test]
    fn test_concurrent_first_access_creates_one_engine() {
        let created = Arc::new(AtomicUsize::new(0));
        let created_clone = Arc::clone(&created);
        let registry = EngineRegistry::new(move |_| {
            created_clone.fetch_add(1, Ordering::SeqCst);
            Box::new(TemplateEngine::new())
        });

        let handles: Vec<EngineHandle> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..16)
                .map(|_| s.spawn(|| registry.get_or_create("fr-fr")))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(created.load(Ordering::SeqCst), 1);
        for h in &handles {
            assert!(Arc::ptr_eq(h, &handles[0]));
        }
    }
}
