/*!
 * Placeholder protection for text that must survive translation unchanged.
 *
 * Format specifiers, opaque identifiers and Latin literal runs embedded in
 * foreign-script text are swapped for class-tagged placeholders
 * (`__FMT_n__`, `__ID_n__`, `__LIT_n__`) before a cell is sent to a backend,
 * and swapped back afterwards. Matching is one pass over the original text;
 * where candidates overlap, FMT beats ID beats LIT.
 */

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Any well-formed placeholder token
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__(?:ID|LIT|FMT)_\d+__").expect("valid placeholder regex"));

static FORMAT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"%(?:\d+\$)?[-+0#]*\d*(?:\.\d+)?[sdifuxXeEgGcp%]",
        r"\{\d+\}",
        r"\{[A-Za-z_][A-Za-z0-9_]*\}",
        r"\$\{[^{}]+\}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid format regex"))
    .collect()
});

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b")
        .expect("valid uuid regex")
});

// Only kept when it carries both a digit and a letter
static CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9]+(?:[-_][A-Za-z0-9]+)+\b").expect("valid code regex")
});

static LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9#%/.+]*").expect("valid literal regex"));

/// Class of protected content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlaceholderClass {
    /// Format specifier such as `%s`, `{0}` or `${name}`
    Fmt,
    /// Opaque identifier such as a UUID or `SKU-1042`
    Id,
    /// Latin literal run inside foreign-script text
    Lit,
}

impl PlaceholderClass {
    fn tag(self) -> &'static str {
        match self {
            Self::Fmt => "FMT",
            Self::Id => "ID",
            Self::Lit => "LIT",
        }
    }
}

/// Placeholder token to original substring, for one translate-restore cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaceholderMap {
    entries: Vec<(String, String)>,
}

impl PlaceholderMap {
    /// Original substring for a token
    pub fn original(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, o)| o.as_str())
    }

    /// Tokens in order of appearance
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    class: PlaceholderClass,
}

impl Span {
    fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// True if the text contains a letter outside the Latin script
pub fn has_non_latin_letters(text: &str) -> bool {
    text.chars().any(|c| c.is_alphabetic() && !is_latin_letter(c))
}

pub(crate) fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
        || matches!(c as u32, 0x00C0..=0x024F | 0x1E00..=0x1EFF)
            && c != '\u{00D7}'
            && c != '\u{00F7}'
}

fn is_identifier_code(candidate: &str) -> bool {
    candidate.chars().any(|c| c.is_ascii_digit()) && candidate.chars().any(|c| c.is_ascii_alphabetic())
}

fn candidate_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();

    for pattern in FORMAT_PATTERNS.iter() {
        spans.extend(pattern.find_iter(text).map(|m| Span {
            start: m.start(),
            end: m.end(),
            class: PlaceholderClass::Fmt,
        }));
    }

    spans.extend(UUID.find_iter(text).map(|m| Span {
        start: m.start(),
        end: m.end(),
        class: PlaceholderClass::Id,
    }));
    spans.extend(
        CODE.find_iter(text)
            .filter(|m| is_identifier_code(m.as_str()))
            .map(|m| Span {
                start: m.start(),
                end: m.end(),
                class: PlaceholderClass::Id,
            }),
    );

    if has_non_latin_letters(text) {
        spans.extend(
            LITERAL
                .find_iter(text)
                .filter(|m| m.as_str().len() >= 2)
                .map(|m| Span {
                    start: m.start(),
                    end: m.end(),
                    class: PlaceholderClass::Lit,
                }),
        );
    }

    spans
}

fn select_spans(mut candidates: Vec<Span>) -> Vec<Span> {
    // Higher class first, then leftmost, then longest
    candidates.sort_by(|a, b| {
        a.class
            .cmp(&b.class)
            .then(a.start.cmp(&b.start))
            .then(b.end.cmp(&a.end))
    });

    let mut accepted: Vec<Span> = Vec::new();
    for span in candidates {
        if !accepted.iter().any(|kept| kept.overlaps(&span)) {
            accepted.push(span);
        }
    }
    accepted.sort_by_key(|s| s.start);
    accepted
}

/// Replace protected content with placeholders.
///
/// Returns the text unchanged with `None` when nothing needs protecting, or
/// when the text already contains a placeholder-shaped token.
pub fn protect(text: &str) -> (String, Option<PlaceholderMap>) {
    if text.is_empty() || PLACEHOLDER.is_match(text) {
        return (text.to_string(), None);
    }

    let spans = select_spans(candidate_spans(text));
    if spans.is_empty() {
        return (text.to_string(), None);
    }

    let mut sanitized = String::with_capacity(text.len() + spans.len() * 8);
    let mut map = PlaceholderMap::default();
    let mut counters = [0usize; 3];
    let mut cursor = 0;

    for span in spans {
        sanitized.push_str(&text[cursor..span.start]);
        let slot = &mut counters[span.class as usize];
        let token = format!("__{}_{}__", span.class.tag(), slot);
        *slot += 1;
        sanitized.push_str(&token);
        map.entries.push((token, text[span.start..span.end].to_string()));
        cursor = span.end;
    }
    sanitized.push_str(&text[cursor..]);

    // A token can fuse with adjacent underscores into a different token
    if restore(&sanitized, Some(&map)) != text {
        return (text.to_string(), None);
    }

    (sanitized, Some(map))
}

/// Blank out identifiers and format specifiers, keeping everything else.
///
/// Used by the language checks, which should judge only the prose around
/// content the guard carries through unchanged.
pub fn mask_guarded(text: &str) -> Cow<'_, str> {
    let spans: Vec<Span> = select_spans(candidate_spans(text))
        .into_iter()
        .filter(|span| span.class != PlaceholderClass::Lit)
        .collect();
    if spans.is_empty() {
        return Cow::Borrowed(text);
    }

    let mut masked = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        masked.push_str(&text[cursor..span.start]);
        masked.push(' ');
        cursor = span.end;
    }
    masked.push_str(&text[cursor..]);
    Cow::Owned(masked)
}

/// Put the original substrings back. Tokens the map does not know are left as they are.
pub fn restore(text: &str, map: Option<&PlaceholderMap>) -> String {
    let Some(map) = map else {
        return text.to_string();
    };
    PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures| {
            let token = &caps[0];
            map.original(token).unwrap_or(token).to_string()
        })
        .into_owned()
}

/// Well-formed placeholder tokens present in a value
pub fn find_leaked_placeholders(text: &str) -> Vec<String> {
    PLACEHOLDER
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Placeholders in `value` that did not already appear in `source`
pub fn new_placeholders(source: &str, value: &str) -> Vec<String> {
    let existing = find_leaked_placeholders(source);
    find_leaked_placeholders(value)
        .into_iter()
        .filter(|token| !existing.contains(token))
        .collect()
}
