//! Utterance segmentation.
//!
//! Only the number of segments matters to the dispatcher: an utterance that
//! splits into several pieces probably carries more than one request, and a
//! single template match can only account for one of them.

use once_cell::sync::Lazy;
use regex::Regex;

/// Splits an utterance into sub-utterances.
pub trait Segmenter: Send + Sync {
    /// Split `utterance` into trimmed, non-empty segments. `lang` selects
    /// language-specific rules.
    fn segment(&self, utterance: &str, lang: &str) -> Vec<String>;
}

/// Never splits; every utterance is a single segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopSegmenter;

impl Segmenter for NopSegmenter {
    fn segment(&self, utterance: &str, _lang: &str) -> Vec<String> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Vec::new();
        }
        vec![utterance.to_string()]
    }
}

/// Sentence punctuation. Latin marks only split when followed by whitespace
/// or the end of input, so "2.5" and "1,000" stay whole.
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[。！？；，、]+|[.!?;,]+(?:\s+|$)").expect("valid punctuation regex")
});

/// Conjunction markers keyed by primary language subtag.
const MARKERS: &[(&str, &[&str])] = &[
    ("en", &["and", "then", "and then"]),
    ("es", &["y", "luego", "y luego"]),
    ("pt", &["e", "depois", "e depois"]),
    ("de", &["und", "dann", "und dann"]),
    ("fr", &["et", "puis", "et puis"]),
    ("it", &["e", "poi", "e poi"]),
    ("nl", &["en", "dan", "en dan"]),
];

/// Splits on sentence punctuation and on per-language conjunctions.
#[derive(Debug, Clone, Default)]
pub struct MarkerSegmenter {
    extra: Vec<(String, Vec<String>)>,
}

impl MarkerSegmenter {
    /// Segmenter with the built-in markers only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add conjunction markers for a language, on top of the built-in ones.
    pub fn with_markers<I, S>(mut self, lang: &str, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.push((
            primary_subtag(lang),
            markers.into_iter().map(|m| m.into().to_lowercase()).collect(),
        ));
        self
    }

    fn markers(&self, lang: &str) -> Vec<String> {
        let primary = primary_subtag(lang);
        let mut markers: Vec<String> = MARKERS
            .iter()
            .filter(|(l, _)| *l == primary)
            .flat_map(|(_, m)| m.iter().map(|s| s.to_string()))
            .collect();
        for (l, m) in &self.extra {
            if *l == primary {
                markers.extend(m.iter().cloned());
            }
        }
        markers
    }
}

impl Segmenter for MarkerSegmenter {
    fn segment(&self, utterance: &str, lang: &str) -> Vec<String> {
        let markers = self.markers(lang);
        let markers: Vec<Vec<&str>> = markers
            .iter()
            .map(|m| m.split_whitespace().collect::<Vec<_>>())
            .filter(|m| !m.is_empty())
            .collect();
        let mut segments = Vec::new();

        for piece in PUNCTUATION.split(utterance) {
            let words: Vec<&str> = piece.split_whitespace().collect();
            let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
            let mut current: Vec<&str> = Vec::new();
            let mut i = 0;

            while i < words.len() {
                // Longest marker first so "and then" is consumed whole.
                let marker_len = markers
                    .iter()
                    .filter(|m| {
                        i + m.len() <= lower.len()
                            && m.iter().zip(&lower[i..]).all(|(a, b)| *a == b.as_str())
                    })
                    .map(|m| m.len())
                    .max();

                match marker_len {
                    Some(n) => {
                        if !current.is_empty() {
                            segments.push(current.join(" "));
                            current.clear();
                        }
                        i += n;
                    }
                    None => {
                        current.push(words[i]);
                        i += 1;
                    }
                }
            }
            if !current.is_empty() {
                segments.push(current.join(" "));
            }
        }

        segments
    }
}

fn primary_subtag(lang: &str) -> String {
    lang.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}
