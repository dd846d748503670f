use std::collections::BTreeSet;

/// Novel factual markers tolerated before a suggestion counts as injecting facts.
pub const MAX_NOVEL_MARKERS: usize = 2;

/// Vocabulary of words that typically introduce a new factual claim.
pub const FACT_MARKERS: &[&str] = &[
    "emperor",
    "empress",
    "dynasty",
    "century",
    "centuries",
    "built",
    "constructed",
    "located",
    "founded",
    "established",
    "invented",
    "discovered",
    "king",
    "queen",
    "president",
    "war",
    "battle",
    "capital",
    "born",
    "died",
    "population",
    "ancient",
    "medieval",
    "empire",
    "kingdom",
    "republic",
    "treaty",
    "revolution",
];

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Factual-marker tokens present in `suggestion` but absent from `original`,
/// in alphabetical order.
#[must_use]
pub fn novel_markers(original: &str, suggestion: &str) -> Vec<String> {
    let grounded = tokens(original);
    tokens(suggestion)
        .into_iter()
        .filter(|token| FACT_MARKERS.contains(&token.as_str()))
        .filter(|token| !grounded.contains(token))
        .collect()
}
