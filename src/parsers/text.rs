//! Whitespace and length helpers shared by the HTML extractor.

/// Collapses every run of whitespace into a single space and trims the ends
pub fn normalize_whitespace(segment: &str) -> String {
    segment.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Joins text fragments with a single space, then normalizes the result
///
/// Mirrors how text nodes of one element are glued together before
/// cleaning: adjacent inline fragments never fuse into one word.
pub fn join_fragments<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = fragments.into_iter().collect::<Vec<_>>().join(" ");
    normalize_whitespace(&joined)
}

/// Keeps paragraphs of at least `min_len` characters
pub fn filter_paragraphs(paragraphs: Vec<String>, min_len: usize) -> Vec<String> {
    paragraphs
        .into_iter()
        .filter(|p| p.chars().count() >= min_len)
        .collect()
}

/// Joins paragraphs with `separator`, capped at `max_len` characters
pub fn join_paragraphs(paragraphs: &[String], separator: &str, max_len: usize) -> String {
    if paragraphs.is_empty() {
        return String::new();
    }

    truncate_chars(&paragraphs.join(separator), max_len)
}

/// Truncates to at most `max_len` characters, never splitting a code point
pub fn truncate_chars(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
