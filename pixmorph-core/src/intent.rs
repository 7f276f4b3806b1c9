//! Chat message routing.
//!
//! A message is matched against an ordered list of rules; the first rule
//! whose predicate accepts the lower-cased message wins. When nothing
//! matches, the whole message becomes a generative prompt. The router is a
//! keyword heuristic over whole words, not a grammar: "remove the
//! background" and "borra la capa" route to commands, anything ambiguous
//! generates. Deletion needs both a removal verb and a word naming the
//! layer itself, so "remove the car" is an edit prompt, not a delete.

use serde::{Deserialize, Serialize};

/// Words that name the background of an image.
const BACKGROUND_WORDS: &[&str] = &["background", "fondo", "backdrop"];

/// Verbs that ask for something to be taken away.
const REMOVAL_WORDS: &[&str] = &[
    "remove", "delete", "erase", "quita", "quitar", "quitale", "elimina", "eliminar", "borra",
    "borrar",
];

/// Multi-word removal phrases, matched as consecutive words.
const REMOVAL_PHRASES: &[&[&str]] = &[&["cut", "out"], &["get", "rid"]];

/// "without": only meaningful next to a background word ("sin fondo").
const WITHOUT_WORDS: &[&str] = &["without", "sin"];

/// Words that name the selected layer as a whole.
const LAYER_WORDS: &[&str] = &[
    "layer", "capa", "this", "it", "selection", "selected", "imagen", "image", "esta", "esto",
    "eso",
];

/// What a routed chat message asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "prompt", rename_all = "snake_case")]
pub enum ChatIntent {
    /// Strip the background from the selected layer.
    RemoveBackground,
    /// Delete the selected layer.
    DeleteSelection,
    /// Run AI integration over the whole stage with this prompt.
    Generate(String),
}

impl ChatIntent {
    /// Whether the intent operates on the selected layer.
    #[must_use]
    pub fn requires_selection(&self) -> bool {
        matches!(self, Self::RemoveBackground | Self::DeleteSelection)
    }
}

/// Commands a rule can produce. The fallback is always generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// See [`ChatIntent::RemoveBackground`].
    RemoveBackground,
    /// See [`ChatIntent::DeleteSelection`].
    DeleteSelection,
}

/// One routing rule: a named predicate over the normalised message.
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    /// Rule name, for logs.
    pub name: &'static str,
    /// Predicate over the lower-cased, trimmed message.
    pub matches: fn(&str) -> bool,
    /// Command produced on match.
    pub command: CommandKind,
}

fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn has_word(words: &[&str], set: &[&str]) -> bool {
    words.iter().any(|w| set.contains(w))
}

fn asks_removal(words: &[&str]) -> bool {
    has_word(words, REMOVAL_WORDS)
        || REMOVAL_PHRASES
            .iter()
            .any(|phrase| words.windows(phrase.len()).any(|pair| pair == *phrase))
}

fn asks_background_removal(text: &str) -> bool {
    let words = words(text);
    has_word(&words, BACKGROUND_WORDS) && (asks_removal(&words) || has_word(&words, WITHOUT_WORDS))
}

fn asks_deletion(text: &str) -> bool {
    let words = words(text);
    asks_removal(&words) && has_word(&words, LAYER_WORDS)
}

/// Ordered intent rules with a generative fallback.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    rules: Vec<IntentRule>,
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentRouter {
    /// Router with the built-in rules. Background removal is checked before
    /// deletion because its phrasing also contains a removal verb.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(vec![
            IntentRule {
                name: "remove_background",
                matches: asks_background_removal,
                command: CommandKind::RemoveBackground,
            },
            IntentRule {
                name: "delete_selection",
                matches: asks_deletion,
                command: CommandKind::DeleteSelection,
            },
        ])
    }

    /// Router with custom rules, evaluated in order.
    #[must_use]
    pub fn with_rules(rules: Vec<IntentRule>) -> Self {
        Self { rules }
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[IntentRule] {
        &self.rules
    }

    /// Classify a chat message.
    #[must_use]
    pub fn route(&self, message: &str) -> ChatIntent {
        let normalised = message.trim().to_lowercase();
        for rule in &self.rules {
            if (rule.matches)(&normalised) {
                tracing::debug!("Message matched rule {}", rule.name);
                return match rule.command {
                    CommandKind::RemoveBackground => ChatIntent::RemoveBackground,
                    CommandKind::DeleteSelection => ChatIntent::DeleteSelection,
                };
            }
        }
        ChatIntent::Generate(message.trim().to_string())
    }
}
