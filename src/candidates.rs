//! Search-phrase generation from raw OCR text
//!
//! OCR output on a card is noisy: stray tokens routinely appear before and
//! after the true title. Rather than guessing where the name "really"
//! starts, every contiguous word window of the cleaned text becomes a
//! candidate phrase, longest first, and the matcher keeps whichever window
//! scores best.

use std::collections::HashSet;

/// Tokens that carry no identifying signal in card names
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "or", "to", "in", "on", "for", "with", "at", "by",
];

/// Minimum token length kept after cleanup
const MIN_TOKEN_LEN: usize = 2;

/// Generate normalized search phrases from raw extracted text, ordered
/// most-specific-first and deduplicated.
pub fn generate(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut phrases = Vec::new();
    for window in (1..=tokens.len()).rev() {
        for start in 0..=(tokens.len() - window) {
            let phrase = tokens[start..start + window].join(" ");
            if seen.insert(phrase.clone()) {
                phrases.push(phrase);
            }
        }
    }
    phrases
}

/// Strip punctuation and digits, lowercase, collapse whitespace, then drop
/// stop words and sub-2-character tokens.
fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}
