//! Size bounds for text crossing a stage boundary.
//!
//! Lengths are counted in `char`s, so a cut never lands inside a UTF-8
//! sequence. Truncation always keeps the suffix: when an artifact grows across
//! fix iterations, the most recent content is the most relevant.

/// One labelled input to [`combine`].
#[derive(Debug, Clone, Copy)]
pub struct Part<'a> {
    pub label: &'a str,
    pub text: &'a str,
    pub cap: usize,
}

impl<'a> Part<'a> {
    pub fn new(label: &'a str, text: &'a str, cap: usize) -> Self {
        Self { label, text, cap }
    }
}

/// Number of text units in `text`.
pub fn text_len(text: &str) -> usize {
    text.chars().count()
}

/// Keep at most the last `max_len` characters of `text`.
pub fn bound(text: &str, max_len: usize) -> String {
    let len = text_len(text);
    if len <= max_len {
        return text.to_string();
    }

    let skip = len - max_len;
    match text.char_indices().nth(skip) {
        Some((start, _)) => text[start..].to_string(),
        None => String::new(),
    }
}

/// Concatenate capped parts as `label:\n<text>` blocks separated by a blank line.
pub fn combine(parts: &[Part<'_>]) -> String {
    parts
        .iter()
        .map(|part| format!("{}:\n{}", part.label, bound(part.text, part.cap)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Upper bound on the length of `combine(parts)` for any part texts.
pub fn combined_ceiling(parts: &[Part<'_>]) -> usize {
    let labels: usize = parts.iter().map(|p| text_len(p.label) + 2).sum();
    let caps: usize = parts.iter().map(|p| p.cap).sum();
    let separators = parts.len().saturating_sub(1) * 2;
    labels + caps + separators
}
