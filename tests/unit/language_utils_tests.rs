/*!
 * Tests for language utility functions
 */

use tablewai::language_utils::{
    display_name, get_language_name, heuristic_code, language_codes_match, normalize_language_code,
    primary_subtag, validate_language_code,
};

/// Test validation of language codes
#[test]
fn test_validateLanguageCode_withVariousForms_shouldAcceptKnownCodes() {
    assert!(validate_language_code("en").is_ok());
    assert!(validate_language_code("fra").is_ok());
    assert!(validate_language_code("ger").is_ok());
    assert!(validate_language_code("zh-CN").is_ok());
    assert!(validate_language_code(" EN ").is_ok());

    assert!(validate_language_code("xyz").is_err());
    assert!(validate_language_code("e").is_err());
    assert!(validate_language_code("").is_err());
}

#[test]
fn test_languageCodesMatch_acrossForms_shouldCompareLanguages() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("fre", "fr"));
    assert!(language_codes_match("pt-BR", "por"));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("en", "invalid"));
}

#[test]
fn test_heuristicCode_withUnknownCode_shouldFallBackToSubtag() {
    assert_eq!(heuristic_code("zh_TW"), "zh");
    assert_eq!(heuristic_code("QQ-x"), "qq");
    assert_eq!(primary_subtag(" Sr-Latn "), "sr");
    assert_eq!(normalize_language_code("deu").unwrap(), "de");
}

#[test]
fn test_languageNames_shouldUseEnglishNames() {
    assert_eq!(get_language_name("ja").unwrap(), "Japanese");
    assert_eq!(display_name("fr"), "French");
    assert_eq!(display_name("qq"), "qq");
}
