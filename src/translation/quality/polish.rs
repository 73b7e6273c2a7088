/*!
 * Deterministic clean-up of translated text.
 *
 * Spacing and punctuation artifacts are fixed first, then glossary terms are
 * enforced, and finally grammatical corrections are applied to sentence-like
 * text only. Short labels are left alone after the glossary step.
 *
 * Identifiers and format specifiers are shielded behind placeholders for the
 * whole pipeline, so `%d` or `SKU-1042` come out exactly as they went in.
 */

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::app_config::GlossaryEntry;
use crate::language_detector::Script;
use crate::language_utils::heuristic_code;
use crate::token_guard;

static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{3000}]{2,}").expect("valid space regex"));

static SPACE_BEFORE_CLOSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+([,.;:!?)\]}%])").expect("valid closing regex"));

// French keeps a space before high punctuation
static SPACE_BEFORE_CLOSING_FR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+([,.)\]}%])").expect("valid closing regex"));

static SPACED_ABBREVIATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([eEiI])\s*\.\s*([gGeE])\s*\.").expect("valid abbreviation regex")
});

static ARTICLE_BEFORE_VOWEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([Aa]) ([A-Za-z][\w'-]*)").expect("valid article regex"));

/// Minimum source length treated as a sentence
const LONG_FORM_CHARS: usize = 20;

/// Vowel-initial words that take "a"
const CONSONANT_SOUND_PREFIXES: &[&str] = &["uni", "use", "usu", "uti", "eu", "one", "once", "ur"];

/// Full-width punctuation and its Latin rendering
fn latin_punctuation(c: char) -> Option<&'static str> {
    match c {
        '，' | '、' => Some(", "),
        '。' => Some(". "),
        '：' => Some(": "),
        '；' => Some("; "),
        '！' => Some("! "),
        '？' => Some("? "),
        '（' => Some(" ("),
        '）' => Some(") "),
        '“' | '”' => Some("\""),
        '‘' | '’' => Some("'"),
        _ => None,
    }
}

/// True when the source reads like a sentence rather than a short label
pub fn is_long_form(source: &str) -> bool {
    let trimmed = source.trim();
    let chars = trimmed.chars().count();
    if chars >= LONG_FORM_CHARS {
        return true;
    }
    let ends_like_sentence = trimmed.ends_with(['.', '!', '?', '。', '！', '？']);
    ends_like_sentence && (chars >= 8 || trimmed.split_whitespace().count() >= 3)
}

/// Glossary entries compiled into one longest-first alternation
#[derive(Debug, Clone)]
struct GlossaryMatcher {
    pattern: Regex,
    replacements: HashMap<String, String>,
}

impl GlossaryMatcher {
    fn new(glossary: &[GlossaryEntry]) -> Option<Self> {
        let mut entries: Vec<&GlossaryEntry> = glossary.iter().filter(|e| !e.from.trim().is_empty()).collect();
        if entries.is_empty() {
            return None;
        }
        entries.sort_by(|a, b| b.from.chars().count().cmp(&a.from.chars().count()));

        let alternatives: Vec<String> = entries
            .iter()
            .map(|entry| {
                let escaped = regex::escape(&entry.from);
                let lead = if entry.from.starts_with(char::is_alphanumeric) { r"\b" } else { "" };
                let tail = if entry.from.ends_with(char::is_alphanumeric) { r"\b" } else { "" };
                format!("{}{}{}", lead, escaped, tail)
            })
            .collect();
        let pattern = Regex::new(&format!("(?i)(?:{})", alternatives.join("|"))).ok()?;

        let mut replacements = HashMap::new();
        for entry in entries {
            replacements
                .entry(entry.from.to_lowercase())
                .or_insert_with(|| entry.to.clone());
        }

        Some(Self { pattern, replacements })
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| {
                let found = &caps[0];
                self.replacements
                    .get(&found.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| found.to_string())
            })
            .into_owned()
    }
}

/// Post-processor for one target language
#[derive(Debug, Clone)]
pub struct Polisher {
    /// Primary language subtag of the target
    target: String,

    /// Target written in Latin script
    latin_target: bool,

    glossary: Option<GlossaryMatcher>,
}

impl Polisher {
    pub fn new(target_language: &str, glossary: &[GlossaryEntry]) -> Self {
        let target = heuristic_code(target_language);
        Self {
            latin_target: Script::for_language(&target).is_none(),
            target,
            glossary: GlossaryMatcher::new(glossary),
        }
    }

    /// Clean up a translated value produced from `source`
    pub fn polish(&self, source: &str, translated: &str) -> String {
        if translated.trim().is_empty() {
            return translated.to_string();
        }

        // Already-sanitized text comes back unprotected and is shielded as is
        let (shielded, map) = token_guard::protect(translated);

        let spaced = self.fix_spacing(&shielded);
        let glossed = match &self.glossary {
            Some(glossary) => glossary.apply(&spaced),
            None => spaced,
        };

        let polished = if is_long_form(source) {
            self.fix_grammar(&glossed)
        } else {
            glossed
        };
        token_guard::restore(&polished, map.as_ref())
    }

    /// Collapse space runs, drop spaces before closing punctuation and
    /// convert full-width punctuation for Latin targets
    pub fn fix_spacing(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match latin_punctuation(c).filter(|_| self.latin_target) {
                Some(replacement) => out.push_str(replacement),
                None => out.push(c),
            }
        }

        let out = SPACED_ABBREVIATION.replace_all(&out, |caps: &Captures| {
            format!("{}.{}.", &caps[1], &caps[2])
        });
        let out = SPACE_RUNS.replace_all(&out, " ");
        let closing = if self.target == "fr" {
            &*SPACE_BEFORE_CLOSING_FR
        } else {
            &*SPACE_BEFORE_CLOSING
        };
        let out = closing.replace_all(&out, "$1");

        out.trim().to_string()
    }

    fn fix_grammar(&self, text: &str) -> String {
        let mut out = drop_repeated_words(text);

        if self.target == "en" {
            out = ARTICLE_BEFORE_VOWEL
                .replace_all(&out, |caps: &Captures| {
                    let word = &caps[2];
                    if takes_an(word) {
                        format!("{}n {}", &caps[1], word)
                    } else {
                        caps[0].to_string()
                    }
                })
                .into_owned();
        }

        if self.latin_target {
            out = capitalize_first(&out);
        }
        out
    }
}

fn takes_an(word: &str) -> bool {
    let lower = word.to_lowercase();
    lower.starts_with(['a', 'e', 'i', 'o', 'u'])
        && !CONSONANT_SOUND_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Remove immediately repeated words ("the the")
fn drop_repeated_words(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for word in text.split(' ') {
        let repeated = kept.last().is_some_and(|prev| {
            word.chars().all(char::is_alphabetic) && !word.is_empty() && prev.eq_ignore_ascii_case(word)
        });
        if !repeated {
            kept.push(word);
        }
    }
    kept.join(" ")
}

/// Upper-case the first letter unless the first word is mixed-case ("iOS", "eBay")
fn capitalize_first(text: &str) -> String {
    let first_word = text.split_whitespace().next().unwrap_or_default();
    if first_word.chars().skip(1).any(char::is_uppercase) {
        return text.to_string();
    }
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => first.to_uppercase().chain(chars).collect(),
        _ => text.to_string(),
    }
}
