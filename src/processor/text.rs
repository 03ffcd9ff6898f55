use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Strips accents and punctuation, lowercases and collapses whitespace.
///
/// `"Indicação de Amigo!"` becomes `"indicacao de amigo"`.
pub fn normalize_text(input: &str) -> String {
    input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Like [`normalize_text`] with every space removed; used to compare headers
/// such as `"Data Nasc."` and `"data_nasc"`.
pub fn compact_key(input: &str) -> String {
    normalize_text(input).replace(' ', "")
}

/// True when `needle` appears in `haystack` as a run of whole words.
/// Both sides must already be normalized.
pub fn contains_words(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let hay: Vec<&str> = haystack.split(' ').collect();
    let words: Vec<&str> = needle.split(' ').collect();
    hay.windows(words.len()).any(|w| w == words.as_slice())
}

pub fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}
