/*!
 * Heuristic check that a text is already in the target language.
 *
 * Scripts decide when the target has its own code-point range. Latin targets
 * reject text carrying foreign-script letters, then fall back to marker-word
 * scoring. Anything ambiguous is accepted.
 */

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::language_utils::heuristic_code;
use crate::token_guard::{is_latin_letter, mask_guarded};

/// Share of letters that must belong to the target script
const SCRIPT_SHARE_THRESHOLD: f64 = 0.25;

/// Foreign-script letters tolerated in a Latin-target text
pub const MAX_FOREIGN_LETTERS_FOR_LATIN: usize = 1;

/// Longest text treated as a neutral code
const MAX_CODE_LEN: usize = 12;

/// Writing systems with a distinct code-point range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Han,
    Japanese,
    Hangul,
    Cyrillic,
    Arabic,
    Hebrew,
    Greek,
    Thai,
    Devanagari,
}

impl Script {
    /// Script that identifies a target language, if any
    pub fn for_language(code: &str) -> Option<Self> {
        match code {
            "zh" => Some(Self::Han),
            "ja" => Some(Self::Japanese),
            "ko" => Some(Self::Hangul),
            "ru" | "uk" | "bg" | "sr" | "mk" | "be" => Some(Self::Cyrillic),
            "ar" | "fa" | "ur" => Some(Self::Arabic),
            "he" => Some(Self::Hebrew),
            "el" => Some(Self::Greek),
            "th" => Some(Self::Thai),
            "hi" | "mr" | "ne" => Some(Self::Devanagari),
            _ => None,
        }
    }

    /// Whether a character belongs to this script
    pub fn contains(self, c: char) -> bool {
        let cp = c as u32;
        match self {
            Self::Han => is_han(cp),
            // Japanese text mixes kana with kanji
            Self::Japanese => matches!(cp, 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF66..=0xFF9D) || is_han(cp),
            Self::Hangul => matches!(cp, 0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F),
            Self::Cyrillic => matches!(cp, 0x0400..=0x052F),
            Self::Arabic => matches!(cp, 0x0600..=0x06FF | 0x0750..=0x077F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF),
            Self::Hebrew => matches!(cp, 0x0590..=0x05FF),
            Self::Greek => matches!(cp, 0x0370..=0x03FF | 0x1F00..=0x1FFF),
            Self::Thai => matches!(cp, 0x0E00..=0x0E7F),
            Self::Devanagari => matches!(cp, 0x0900..=0x097F),
        }
    }
}

fn is_han(cp: u32) -> bool {
    matches!(cp, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF)
}

struct LatinProfile {
    markers: &'static [&'static str],
    diacritics: &'static str,
}

static LATIN_PROFILES: Lazy<HashMap<&'static str, LatinProfile>> = Lazy::new(|| {
    HashMap::from([
        (
            "en",
            LatinProfile {
                markers: &[
                    "the", "and", "of", "to", "is", "in", "for", "with", "this", "that", "are",
                    "be", "on", "not", "you", "your", "will", "from", "by", "or",
                ],
                diacritics: "",
            },
        ),
        (
            "fr",
            LatinProfile {
                markers: &[
                    "le", "la", "les", "des", "et", "est", "une", "un", "du", "pour", "dans",
                    "avec", "pas", "que", "sur", "vous", "au", "aux", "ce", "sont",
                ],
                diacritics: "éèêàçùâîôûëïœ",
            },
        ),
        (
            "de",
            LatinProfile {
                markers: &[
                    "der", "die", "das", "und", "ist", "nicht", "mit", "ein", "eine", "zu",
                    "von", "für", "auf", "den", "dem", "sie", "werden", "wird", "sich", "auch",
                ],
                diacritics: "äöüß",
            },
        ),
        (
            "es",
            LatinProfile {
                markers: &[
                    "el", "los", "las", "y", "es", "una", "del", "para", "con", "por", "que",
                    "no", "se", "su", "al", "como", "está", "son", "este", "esta",
                ],
                diacritics: "ñáíóúü¿¡",
            },
        ),
        (
            "it",
            LatinProfile {
                markers: &[
                    "il", "lo", "gli", "della", "di", "che", "è", "non", "per", "con", "una",
                    "sono", "nel", "alla", "questo", "questa", "come", "anche", "del", "le",
                ],
                diacritics: "àèìòù",
            },
        ),
        (
            "pt",
            LatinProfile {
                markers: &[
                    "o", "os", "as", "e", "do", "da", "dos", "das", "não", "um", "uma", "para",
                    "com", "em", "que", "é", "no", "na", "por", "seu",
                ],
                diacritics: "ãõçáéíóúâê",
            },
        ),
        (
            "nl",
            LatinProfile {
                markers: &[
                    "de", "het", "een", "en", "van", "is", "niet", "met", "op", "voor", "dat",
                    "zijn", "te", "die", "ook", "wordt", "naar", "bij", "aan", "deze",
                ],
                diacritics: "ĳ",
            },
        ),
    ])
});

/// True for empty text, text without letters or digits, and short codes.
///
/// Identifiers and format specifiers are ignored, so a bare UUID is neutral.
pub fn is_neutral(text: &str) -> bool {
    let masked = mask_guarded(text);
    let trimmed = masked.trim();
    if trimmed.is_empty() || !trimmed.chars().any(char::is_alphanumeric) {
        return true;
    }
    is_short_code(trimmed)
}

fn is_short_code(text: &str) -> bool {
    if text.chars().count() > MAX_CODE_LEN || text.chars().any(char::is_whitespace) {
        return false;
    }
    if !text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_#%./+".contains(c))
    {
        return false;
    }
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    let letters: Vec<char> = text.chars().filter(char::is_ascii_alphabetic).collect();
    has_digit || letters.iter().all(char::is_ascii_uppercase)
}

fn script_share(text: &str, script: Script) -> Option<f64> {
    let mut letters = 0usize;
    let mut in_script = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if script.contains(c) {
            in_script += 1;
        }
    }
    (letters > 0).then(|| in_script as f64 / letters as f64)
}

/// Letters outside the Latin script
pub fn foreign_letter_count(text: &str) -> usize {
    text.chars()
        .filter(|c| c.is_alphabetic() && !is_latin_letter(*c))
        .count()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn profile_score(profile: &LatinProfile, words: &[String], text: &str) -> usize {
    let marker_hits = words
        .iter()
        .filter(|w| profile.markers.contains(&w.as_str()))
        .count();
    let diacritic_hits = text
        .to_lowercase()
        .chars()
        .filter(|c| profile.diacritics.contains(*c))
        .count();
    marker_hits * 2 + diacritic_hits
}

/// Best-scoring Latin language for a text, `None` when tied or unscored
pub fn guess_latin_language(text: &str) -> Option<&'static str> {
    let words = tokenize(text);
    let mut scores: Vec<(&'static str, usize)> = LATIN_PROFILES
        .iter()
        .map(|(code, profile)| (*code, profile_score(profile, &words, text)))
        .collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    match scores.as_slice() {
        [(code, top), rest @ ..] if *top > 0 && rest.first().is_none_or(|(_, next)| next < top) => {
            Some(*code)
        }
        _ => None,
    }
}

/// True when `text` still carries the script of a foreign source.
///
/// For targets with their own script this is the script check; for Latin
/// targets it counts non-Latin letters and ignores word markers.
pub fn has_residual_source_script(text: &str, target_language: &str) -> bool {
    if is_neutral(text) {
        return false;
    }
    let text = mask_guarded(text);
    let text = text.as_ref();
    let target = heuristic_code(target_language);
    match Script::for_language(&target) {
        Some(script) => script_share(text, script).is_some_and(|share| share < SCRIPT_SHARE_THRESHOLD),
        None => foreign_letter_count(text) > MAX_FOREIGN_LETTERS_FOR_LATIN,
    }
}

/// Estimate whether `text` is already written in `target_language`
pub fn is_likely_target_language(text: &str, target_language: &str) -> bool {
    if is_neutral(text) {
        return true;
    }
    let text = mask_guarded(text);
    let text = text.as_ref();

    let target = heuristic_code(target_language);

    if let Some(script) = Script::for_language(&target) {
        return script_share(text, script).is_none_or(|share| share >= SCRIPT_SHARE_THRESHOLD);
    }

    let latin_target = LATIN_PROFILES.contains_key(target.as_str());
    if !latin_target {
        return true;
    }

    if foreign_letter_count(text) > MAX_FOREIGN_LETTERS_FOR_LATIN {
        return false;
    }

    match guess_latin_language(text) {
        Some(guess) => guess == target,
        None => true,
    }
}
