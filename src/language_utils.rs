/*!
 * Language code helpers built on ISO 639.
 *
 * Target languages arrive as ISO 639-1 codes, ISO 639-2 codes or BCP-47
 * style tags (`zh-CN`, `pt_BR`). Everything downstream works on the
 * primary subtag, so tags are reduced to it before lookup.
 */

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Strip region/script subtags and lowercase
pub fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn lookup(code: &str) -> Option<Language> {
    let primary = primary_subtag(code);
    match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => {
            let terminological = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == primary)
                .map(|(_, t)| *t)
                .unwrap_or(primary.as_str());
            Language::from_639_3(terminological)
        }
        _ => None,
    }
}

/// Validate a language code or tag
pub fn validate_language_code(code: &str) -> Result<()> {
    lookup(code)
        .map(|_| ())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Normalize to ISO 639-1 when one exists, otherwise ISO 639-3
pub fn normalize_language_code(code: &str) -> Result<String> {
    let lang = lookup(code).ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))?;
    Ok(lang
        .to_639_1()
        .map(str::to_string)
        .unwrap_or_else(|| lang.to_639_3().to_string()))
}

/// Normalize for heuristics, falling back to the lowercased primary subtag
pub fn heuristic_code(code: &str) -> String {
    normalize_language_code(code).unwrap_or_else(|_| primary_subtag(code))
}

/// Check if two language codes represent the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (lookup(code1), lookup(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// English name of a language, used in prompts
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = lookup(code).ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;
    Ok(lang.to_name().to_string())
}

/// English name when known, otherwise the code itself
pub fn display_name(code: &str) -> String {
    get_language_name(code).unwrap_or_else(|_| code.to_string())
}
