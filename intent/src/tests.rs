//! Cross-module behavior of the service.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::{
    EngineRegistry, IntentService, MarkerSegmenter, MatchContext, MatchEngine, RawMatch, Result,
    ServiceConfig, TemplateEngine,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("giztoy_intent=debug")
        .try_init();
}

fn service() -> IntentService {
    init_tracing();
    IntentService::new(ServiceConfig::default()).unwrap()
}

fn s(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn ctx() -> MatchContext {
    MatchContext::default()
}

#[test]
fn same_names_in_two_skills_stay_separate() {
    let svc = service();
    svc.register_entity("alarm", "time", Some(&s(&["seven", "eight"])[..]), None).unwrap();
    svc.register_entity("timer", "time", Some(&s(&["ten minutes"])[..]), None).unwrap();
    svc.register_intent("alarm", "set", Some(&s(&["wake me at {time}"])[..]), None).unwrap();
    svc.register_intent("timer", "set", Some(&s(&["start a timer for {time}"])[..]), None).unwrap();

    let alarm = svc.match_utterances(&["wake me at seven"], None, &ctx()).unwrap();
    assert_eq!((alarm.intent_name.as_str(), alarm.skill_id.as_str()), ("set", "alarm"));

    let timer = svc.match_utterances(&["start a timer for ten minutes"], None, &ctx()).unwrap();
    assert_eq!(timer.skill_id, "timer");
    assert_eq!(timer.entities["time"], "ten minutes");

    // Entities resolve only against their own skill.
    assert!(svc.match_utterances(&["wake me at ten minutes"], None, &ctx()).is_none());

    assert_eq!(svc.detach_intent("alarm", "set"), 1);
    assert!(svc.match_utterances(&["wake me at seven"], None, &ctx()).is_none());
    assert!(svc.match_utterances(&["start a timer for ten minutes"], None, &ctx()).is_some());
}

#[test]
fn languages_are_isolated() {
    let svc = service();
    svc.register_intent("s", "greet", Some(&s(&["hello"])[..]), Some("en-us")).unwrap();
    svc.register_intent("s", "greet", Some(&s(&["hallo"])[..]), Some("de-de")).unwrap();

    assert!(svc.match_utterances(&["hallo"], Some("en-us"), &ctx()).is_none());
    assert!(svc.match_utterances(&["hello"], Some("de-de"), &ctx()).is_none());

    let de = svc.match_utterances(&["Hallo"], Some("de-DE"), &ctx()).unwrap();
    assert_eq!(de.lang, "de-de");
    assert_eq!(de.intent_name, "greet");
}

#[test]
fn detach_skill_covers_every_language_and_is_idempotent() {
    let svc = service();
    svc.register_intent("s", "greet", Some(&s(&["hello"])[..]), Some("en")).unwrap();
    svc.register_intent("s", "greet", Some(&s(&["hola"])[..]), Some("es")).unwrap();
    svc.register_entity("s", "name", Some(&s(&["ana"])[..]), Some("es")).unwrap();
    svc.register_intent("other", "greet", Some(&s(&["hey"])[..]), Some("en")).unwrap();

    assert_eq!(svc.detach_skill("s"), 3);
    assert_eq!(svc.detach_skill("s"), 0);
    assert_eq!(svc.detach_skill("never-registered"), 0);

    assert!(svc.match_utterances(&["hello"], Some("en"), &ctx()).is_none());
    assert!(svc.match_utterances(&["hola"], Some("es"), &ctx()).is_none());
    assert!(svc.match_utterances(&["hey"], Some("en"), &ctx()).is_some());
    assert_eq!(svc.registrar().skills(), vec!["other"]);
}

#[test]
fn confidence_depends_on_segment_count() {
    let svc = service();
    svc.register_intent("s", "music", Some(&s(&["play {song}"])[..]), None).unwrap();

    let one = svc.match_utterances(&["play yesterday"], None, &ctx()).unwrap();
    assert!((one.confidence - 0.9).abs() < 1e-9);

    let two = svc.match_utterances(
        &["play yesterday and turn it up"],
        None,
        &MatchContext::with_min_confidence(0.0),
    );
    let two = two.unwrap();
    assert!((two.confidence - 0.4).abs() < 1e-9);

    // Dropped under the default threshold.
    assert!(svc.match_utterances(&["play yesterday, then stop"], None, &ctx()).is_none());
}

#[test]
fn unknown_language_yields_no_match() {
    let svc = service();
    assert!(svc.match_utterances(&["anything"], Some("xx-yy"), &ctx()).is_none());
    assert!(svc.match_utterances::<&str>(&[], None, &ctx()).is_none());
}

#[test]
fn entities_registered_after_intent_apply() {
    let svc = service();
    svc.register_intent("w", "current", Some(&s(&["weather in {city}"])[..]), None).unwrap();
    let before = svc.match_utterances(&["weather in oslo"], None, &ctx()).unwrap();
    assert_eq!(before.entities["city"], "oslo");

    svc.register_entity("w", "city", Some(&s(&["london"])[..]), None).unwrap();
    assert!(svc.match_utterances(&["weather in oslo"], None, &ctx()).is_none());
    assert!(svc.match_utterances(&["weather in london"], None, &ctx()).is_some());

    // Back to a wildcard once the entity is gone.
    assert_eq!(svc.detach_entity("w", "city"), 1);
    assert!(svc.match_utterances(&["weather in oslo"], None, &ctx()).is_some());
}

#[test]
fn decimals_do_not_lower_confidence() {
    let svc = service();
    svc.register_intent("timer", "set", Some(&s(&["set a timer for {n} minutes"])[..]), None).unwrap();

    let m = svc.match_utterances(&["set a timer for 2.5 minutes"], None, &ctx()).unwrap();
    assert_eq!(m.entities["n"], "2.5");
    assert!((m.confidence - 0.9).abs() < 1e-9);
}

/// Template engine that mirrors which keys it holds, and with how many
/// samples, so tests can compare it with the registrar's bookkeeping.
struct MirrorEngine {
    inner: TemplateEngine,
    applied: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl MatchEngine for MirrorEngine {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn add_intent(&mut self, key: &str, samples: &[String]) -> Result<()> {
        self.inner.add_intent(key, samples)?;
        self.applied.lock().insert(key.to_string(), samples.len());
        Ok(())
    }

    fn add_entity(&mut self, key: &str, samples: &[String]) -> Result<()> {
        self.inner.add_entity(key, samples)
    }

    fn remove_intent(&mut self, key: &str) {
        self.inner.remove_intent(key);
        self.applied.lock().remove(key);
    }

    fn remove_entity(&mut self, key: &str) {
        self.inner.remove_entity(key);
    }

    fn calc_intent(&self, query: &str) -> Option<RawMatch> {
        self.inner.calc_intent(query)
    }
}

#[test]
fn concurrent_register_detach_and_match() {
    const WRITERS: usize = 4;

    init_tracing();
    let applied = Arc::new(Mutex::new(BTreeMap::new()));
    let mirror = Arc::clone(&applied);
    let registry = Arc::new(EngineRegistry::new(move |_| {
        Box::new(MirrorEngine {
            inner: TemplateEngine::new(),
            applied: Arc::clone(&mirror),
        })
    }));
    let svc = IntentService::with_components(
        ServiceConfig::default(),
        Arc::clone(&registry),
        Arc::new(MarkerSegmenter::new()),
    )
    .unwrap();
    svc.register_intent("stable", "ping", Some(&s(&["ping"])[..]), None).unwrap();
    let finished = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for w in 0..WRITERS {
            let svc = &svc;
            let finished = &finished;
            scope.spawn(move || {
                let skill = format!("writer{w}");
                let first = vec![format!("call writer {w} alpha"), format!("call writer {w} beta")];
                let second = vec![
                    format!("call writer {w} gamma"),
                    format!("call writer {w} delta"),
                    format!("call writer {w} epsilon"),
                ];
                for _ in 0..200 {
                    svc.register_intent(&skill, "call", Some(first.as_slice()), None).unwrap();
                    svc.register_intent(&skill, "call", Some(second.as_slice()), None).unwrap();
                    svc.detach_skill(&skill);
                }
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        for _ in 0..4 {
            let svc = &svc;
            let registry = &registry;
            let applied = &applied;
            let finished = &finished;
            scope.spawn(move || {
                let handle = registry.get_or_create("en-us");
                while finished.load(Ordering::SeqCst) < WRITERS {
                    {
                        let state = handle.read();
                        let booked: BTreeMap<String, usize> = state
                            .intents
                            .iter()
                            .map(|(k, v)| (k.clone(), v.len()))
                            .collect();
                        assert_eq!(*applied.lock(), booked);
                    }

                    let m = svc.match_utterances(&["ping"], None, &ctx()).unwrap();
                    assert_eq!(m.skill_id, "stable");

                    for w in 0..WRITERS {
                        for word in ["alpha", "beta", "gamma", "delta", "epsilon"] {
                            let utterance = format!("call writer {w} {word}");
                            if let Some(m) = svc.match_utterances(&[utterance.as_str()], None, &ctx()) {
                                assert_eq!(m.skill_id, format!("writer{w}"));
                                assert_eq!(m.intent_name, "call");
                                // Samples reported with the match belong to
                                // the set the engine matched against.
                                assert_eq!(m.utterance_remainder, "", "{utterance:?}");
                            }
                        }
                    }
                }
            });
        }
    });

    assert_eq!(svc.registrar().skills(), vec!["stable"]);
    assert_eq!(applied.lock().len(), 1);
}
