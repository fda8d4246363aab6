use unicode_normalization::UnicodeNormalization;

use crate::normalize::{replace_substrings, strip_leading_stop_word, REPLACE_TABLE, STOP_WORDS};

/// Coarse title comparison used to auto-accept a search result.
///
/// Both sides are case folded, run through the substitution table, lose one
/// leading stop word and one trailing "the", then compared exactly. Anything
/// that does not compare equal falls through to manual selection.
pub fn weak_match(a: &str, b: &str) -> bool {
    match_key(a) == match_key(b)
}

/// The normalized form `weak_match` compares.
pub fn match_key(title: &str) -> String {
    let folded: String = title.nfc().collect::<String>().to_lowercase();
    let replaced = replace_substrings(&folded, REPLACE_TABLE);
    let stripped = strip_leading_stop_word(&replaced, STOP_WORDS);
    let trimmed = stripped.trim_end();
    // "Terminal, The" loses its comma above and its article here
    let without_article = match trimmed.strip_suffix("the") {
        Some(rest) if rest.is_empty() || rest.ends_with(char::is_whitespace) => rest,
        _ => trimmed,
    };
    without_article.trim().to_string()
}
