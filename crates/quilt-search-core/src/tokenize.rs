//! Word tokenizer shared by documents and queries.
//!
//! Both sides of every lexical comparison must go through [`tokenize`];
//! the frequency index and the scorers assume identical normalization.

/// Tokens of this length or shorter are discarded.
pub const MIN_TOKEN_LEN: usize = 3;

/// Split text into lower-cased word tokens.
///
/// A token is a maximal run of ASCII letters (`[A-Za-z]+`). Anything else
/// (digits, punctuation, underscores, whitespace, non-ASCII) separates
/// tokens. Tokens shorter than [`MIN_TOKEN_LEN`] are dropped.
///
/// # Example
///
/// ```rust
/// use quilt_search_core::tokenize::tokenize;
///
/// assert_eq!(
///     tokenize("Machine-learning is a subset of AI."),
///     vec!["machine", "learning", "subset"]
/// );
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| word.len() >= MIN_TOKEN_LEN)
        .map(|word| word.to_ascii_lowercase())
        .collect()
}

/// Distinct tokens in first-seen order.
pub fn distinct_tokens(tokens: &[String]) -> Vec<&str> {
    let mut seen = std::collections::HashSet::with_capacity(tokens.len());
    tokens
        .iter()
        .map(String::as_str)
        .filter(|t| seen.insert(*t))
        .collect()
}
