//! Regex-backed template engine.
//!
//! Samples are short templates:
//!
//! - `what time is it` - literal words, whitespace matches any whitespace run
//! - `weather in {city}` - a slot; matches one of the `city` entity values if
//!   such an entity is registered, otherwise any non-empty text
//! - `turn (on|off) the light` - alternatives; an empty alternative makes the
//!   group optional, e.g. `(please|) stop`
//!
//! Each template compiles to one anchored, case-insensitive regex. When more
//! than one template matches a query, the one with the most literal text wins.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use regex::Regex;
use tracing::warn;

use crate::engine::{MatchEngine, RawMatch};
use crate::error::{IntentError, Result};

/// Identifier reported by [`TemplateEngine::name`].
pub const ENGINE_NAME: &str = "template";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Space,
    Slot(String),
    Group(Vec<Vec<Token>>),
}

fn parse(template: &str) -> std::result::Result<Vec<Token>, String> {
    let mut parser = Parser {
        chars: template.trim().chars().peekable(),
    };
    let mut alts = parser.alternatives(false)?;
    // Top level never splits on '|', so there is exactly one sequence.
    let tokens = alts.pop().unwrap_or_default();
    if tokens.is_empty() {
        return Err("empty template".to_string());
    }
    Ok(tokens)
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn alternatives(&mut self, nested: bool) -> std::result::Result<Vec<Vec<Token>>, String> {
        let mut alts = Vec::new();
        let mut current = Vec::new();
        let mut literal = String::new();

        loop {
            let Some(c) = self.chars.next() else {
                if nested {
                    return Err("unclosed '('".to_string());
                }
                flush(&mut literal, &mut current);
                alts.push(current);
                return Ok(alts);
            };

            match c {
                ')' => {
                    if !nested {
                        return Err("unbalanced ')'".to_string());
                    }
                    flush(&mut literal, &mut current);
                    alts.push(trim_spaces(current));
                    return Ok(alts);
                }
                '|' => {
                    if !nested {
                        return Err("'|' outside of a group".to_string());
                    }
                    flush(&mut literal, &mut current);
                    alts.push(trim_spaces(std::mem::take(&mut current)));
                }
                '(' => {
                    flush(&mut literal, &mut current);
                    let inner = self.alternatives(true)?;
                    current.push(Token::Group(inner));
                }
                '{' => {
                    flush(&mut literal, &mut current);
                    current.push(Token::Slot(self.slot_name()?));
                }
                '}' => return Err("unbalanced '}'".to_string()),
                c if c.is_whitespace() => {
                    flush(&mut literal, &mut current);
                    while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
                        self.chars.next();
                    }
                    if !matches!(current.last(), Some(Token::Space)) {
                        current.push(Token::Space);
                    }
                }
                c => literal.push(c),
            }
        }
    }

    fn slot_name(&mut self) -> std::result::Result<String, String> {
        let mut name = String::new();
        loop {
            match self.chars.next() {
                None => return Err("unclosed '{'".to_string()),
                Some('}') => break,
                Some(c @ ('{' | '(' | ')' | '|')) => {
                    return Err(format!("unexpected {c:?} in slot name"));
                }
                Some(c) => name.push(c),
            }
        }
        let name = name.trim();
        if name.is_empty() {
            return Err("empty slot name".to_string());
        }
        Ok(name.to_string())
    }
}

/// Drop whitespace at the edges of an alternative; the group's neighbours
/// own that whitespace.
fn trim_spaces(mut tokens: Vec<Token>) -> Vec<Token> {
    if matches!(tokens.last(), Some(Token::Space)) {
        tokens.pop();
    }
    if matches!(tokens.first(), Some(Token::Space)) {
        tokens.remove(0);
    }
    tokens
}

fn flush(literal: &mut String, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

fn literal_len(tokens: &[Token]) -> usize {
    tokens
        .iter()
        .map(|t| match t {
            Token::Literal(s) => s.chars().count(),
            Token::Space | Token::Slot(_) => 0,
            Token::Group(alts) => alts.iter().map(|a| literal_len(a)).min().unwrap_or(0),
        })
        .sum()
}

fn references(tokens: &[Token], entity: &str) -> bool {
    tokens.iter().any(|t| match t {
        Token::Slot(name) => name == entity,
        Token::Group(alts) => alts.iter().any(|a| references(a, entity)),
        _ => false,
    })
}

/// Escape a phrase, letting its inner whitespace match any whitespace run.
fn escape_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

#[derive(Debug)]
struct Compiled {
    regex: Regex,
    slots: Vec<String>,
    literal_len: usize,
}

fn compile(
    tokens: &[Token],
    entities: &HashMap<String, Vec<String>>,
) -> std::result::Result<Compiled, regex::Error> {
    let mut pattern = String::from(r"(?i)^\s*");
    let mut slots = Vec::new();
    emit(tokens, entities, &mut pattern, &mut slots);
    pattern.push_str(r"\s*$");

    Ok(Compiled {
        regex: Regex::new(&pattern)?,
        slots,
        literal_len: literal_len(tokens),
    })
}

fn is_optional(token: &Token) -> bool {
    matches!(token, Token::Group(alts) if alts.iter().any(Vec::is_empty))
}

/// Whitespace an optional group absorbs so that skipping it leaves a single
/// whitespace run between its neighbours.
#[derive(Clone, Copy, PartialEq)]
enum Absorb {
    None,
    Leading,
    Trailing,
}

fn emit(
    tokens: &[Token],
    entities: &HashMap<String, Vec<String>>,
    out: &mut String,
    slots: &mut Vec<String>,
) {
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Literal(s) => out.push_str(&regex::escape(s)),
            Token::Space => {
                if tokens.get(i + 1).is_some_and(is_optional) {
                    i += 1;
                    emit_group(&tokens[i], Absorb::Leading, entities, out, slots);
                } else {
                    out.push_str(r"\s+");
                }
            }
            Token::Slot(name) => {
                slots.push(name.clone());
                match entities.get(name) {
                    Some(values) if !values.is_empty() => {
                        let mut alts: Vec<String> = values.iter().map(|v| escape_phrase(v)).collect();
                        alts.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
                        alts.dedup();
                        out.push('(');
                        out.push_str(&alts.join("|"));
                        out.push(')');
                    }
                    _ => out.push_str("(.+?)"),
                }
            }
            group @ Token::Group(_) => {
                if is_optional(group) && matches!(tokens.get(i + 1), Some(Token::Space)) {
                    i += 1;
                    emit_group(group, Absorb::Trailing, entities, out, slots);
                } else {
                    emit_group(group, Absorb::None, entities, out, slots);
                }
            }
        }
        i += 1;
    }
}

fn emit_group(
    group: &Token,
    absorb: Absorb,
    entities: &HashMap<String, Vec<String>>,
    out: &mut String,
    slots: &mut Vec<String>,
) {
    let Token::Group(alts) = group else {
        return;
    };
    out.push_str("(?:");
    for (j, alt) in alts.iter().enumerate() {
        if j > 0 {
            out.push('|');
        }
        if alt.is_empty() {
            continue;
        }
        if absorb == Absorb::Leading {
            out.push_str(r"\s+");
        }
        emit(alt, entities, out, slots);
        if absorb == Absorb::Trailing {
            out.push_str(r"\s+");
        }
    }
    out.push(')');
}

#[derive(Debug)]
struct IntentEntry {
    key: String,
    templates: Vec<Vec<Token>>,
    compiled: Vec<Compiled>,
}

impl IntentEntry {
    fn recompile(&mut self, entities: &HashMap<String, Vec<String>>) {
        let mut compiled = Vec::with_capacity(self.templates.len());
        for tokens in &self.templates {
            match compile(tokens, entities) {
                Ok(c) => compiled.push(c),
                Err(e) => warn!("intent: dropping template for {}: {}", self.key, e),
            }
        }
        self.compiled = compiled;
    }
}

/// Default [`MatchEngine`]: anchored regex templates with entity slots.
#[derive(Debug, Default)]
pub struct TemplateEngine {
    intents: Vec<IntentEntry>,
    entities: HashMap<String, Vec<String>>,
}

impl TemplateEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of intent keys stored.
    pub fn intent_count(&self) -> usize {
        self.intents.len()
    }

    /// Number of entity keys stored.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn recompile_referencing(&mut self, entity: &str) {
        for entry in &mut self.intents {
            if entry.templates.iter().any(|t| references(t, entity)) {
                entry.recompile(&self.entities);
            }
        }
    }
}

impl MatchEngine for TemplateEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn add_intent(&mut self, key: &str, samples: &[String]) -> Result<()> {
        let template_err = |reason: String| IntentError::Template {
            key: key.to_string(),
            reason,
        };

        let mut templates = Vec::with_capacity(samples.len());
        let mut compiled = Vec::with_capacity(samples.len());
        for sample in samples {
            let tokens = parse(sample).map_err(|e| template_err(format!("{sample:?}: {e}")))?;
            compiled.push(
                compile(&tokens, &self.entities)
                    .map_err(|e| template_err(format!("{sample:?}: {e}")))?,
            );
            templates.push(tokens);
        }

        let entry = IntentEntry {
            key: key.to_string(),
            templates,
            compiled,
        };
        match self.intents.iter_mut().find(|e| e.key == key) {
            Some(existing) => *existing = entry,
            None => self.intents.push(entry),
        }
        Ok(())
    }

    fn add_entity(&mut self, key: &str, samples: &[String]) -> Result<()> {
        let values: Vec<String> = samples
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if values.is_empty() {
            return Err(IntentError::Template {
                key: key.to_string(),
                reason: "entity has no values".to_string(),
            });
        }
        self.entities.insert(key.to_string(), values);
        self.recompile_referencing(key);
        Ok(())
    }

    fn remove_intent(&mut self, key: &str) {
        self.intents.retain(|e| e.key != key);
    }

    fn remove_entity(&mut self, key: &str) {
        if self.entities.remove(key).is_some() {
            self.recompile_referencing(key);
        }
    }

    fn calc_intent(&self, query: &str) -> Option<RawMatch> {
        let mut best: Option<(usize, RawMatch)> = None;

        for entry in &self.intents {
            for compiled in &entry.compiled {
                if best.as_ref().is_some_and(|(len, _)| *len >= compiled.literal_len) {
                    continue;
                }
                let Some(caps) = compiled.regex.captures(query) else {
                    continue;
                };

                let mut entities = HashMap::new();
                for (i, slot) in compiled.slots.iter().enumerate() {
                    if let Some(m) = caps.get(i + 1) {
                        let value = m.as_str().trim();
                        if !value.is_empty() {
                            entities.entry(slot.clone()).or_insert_with(|| value.to_string());
                        }
                    }
                }

                best = Some((
                    compiled.literal_len,
                    RawMatch {
                        key: entry.key.clone(),
                        entities,
                    },
                ));
            }
        }

        best.map(|(_, m)| m)
    }
}
