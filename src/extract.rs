//! Argument extraction from free-text commands

use once_cell::sync::Lazy;
use regex::Regex;

/// Command words that never belong to a product name.
const STOP_WORDS: [&str; 8] = [
    "quantidade", "total", "buscar", "procurar", "produto", "de", "do", "da",
];

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

/// Pull a product name out of a command: lowercase, split on whitespace, drop
/// stop-words and tokens shorter than three characters, keep the rest in order.
pub fn extract_product_name(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w) && w.chars().count() > 2)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// First run of digits anywhere in the text.
pub fn extract_number(text: &str) -> Option<usize> {
    DIGITS
        .find_iter(text)
        .next()
        .and_then(|m| m.as_str().parse().ok())
}

/// Columns whose lowercase name appears in the text, in column order.
pub fn mentioned_columns<'a>(text: &str, columns: &'a [String]) -> Vec<&'a String> {
    let lower = text.to_lowercase();
    columns
        .iter()
        .filter(|c| !c.is_empty() && lower.contains(&c.to_lowercase()))
        .collect()
}
