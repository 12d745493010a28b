use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
}

/// Upper bound on terms produced per text, which bounds index fan-out per document and field.
pub const MAX_TERMS: usize = 20;
/// Terms shorter than this are dropped.
pub const MIN_TERM_CHARS: usize = 3;

/// NFKC normalization, lowercase, and every non-word character replaced by a space.
pub fn normalize(text: &str) -> String {
    let lowered = text.nfkc().collect::<String>().to_lowercase();
    NON_WORD.replace_all(&lowered, " ").into_owned()
}

/// Tokenize text into index terms. Used verbatim at index time and at query time.
pub fn tokenize(text: &str) -> Vec<String> {
    tokenize_limited(text, MAX_TERMS)
}

pub fn tokenize_limited(text: &str, max_terms: usize) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .take(max_terms)
        .map(str::to_owned)
        .collect()
}

/// Normalized text with whitespace runs collapsed, for phrase containment checks.
pub fn normalize_phrase(text: &str) -> String {
    normalize(text).split_whitespace().collect::<Vec<_>>().join(" ")
}
