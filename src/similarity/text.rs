//! Lexical and statistical text similarity.
//!
//! Everything here is pure and allocation-light: the matcher normalizes each
//! string once and then fans out to whichever scores the configured algorithm
//! needs. Levenshtein comes from `strsim`; Jaccard works on whitespace token
//! sets and cosine on character-frequency vectors, so the three measures react
//! to different kinds of query drift (typos, reordered words, shared phrasing).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "but", "for", "nor", "not", "are", "was", "were", "been", "being", "have",
        "has", "had", "does", "did", "will", "would", "should", "could", "can", "may", "might",
        "must", "shall", "this", "that", "these", "those", "with", "from", "into", "over",
        "after", "under", "again", "here", "there", "all", "any", "both", "each", "few", "more",
        "most", "other", "some", "such", "only", "own", "same", "than", "too", "very", "just",
        "what", "which", "who", "whom", "when", "where", "why", "how", "you", "your", "they",
        "them", "their", "our", "its",
    ]
    .into_iter()
    .collect()
});

/// Options controlling [`normalize`]. Derived from the matcher config; the
/// defaults match what the matcher applies when normalization is enabled.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub strip_punctuation: bool,
    pub stemming: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strip_punctuation: true,
            stemming: false,
        }
    }
}

/// Lowercase, optionally strip punctuation to whitespace, collapse whitespace
/// runs, and optionally stem each token.
pub fn normalize(text: &str, opts: &NormalizeOptions) -> String {
    let lowered = text.to_lowercase();
    let stripped = if opts.strip_punctuation {
        PUNCTUATION.replace_all(&lowered, " ")
    } else {
        std::borrow::Cow::Borrowed(lowered.as_str())
    };
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    if opts.stemming {
        collapsed
            .split(' ')
            .map(stem)
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        collapsed.into_owned()
    }
}

/// Naive suffix-stripping stemmer. The first matching suffix wins and is only
/// stripped when at least three characters remain, so "testing" → "test" but
/// "sing" stays whole.
pub fn stem(word: &str) -> &str {
    const SUFFIXES: [&str; 5] = ["ing", "ed", "ly", "es", "s"];
    for suffix in SUFFIXES {
        if let Some(stripped) = word.strip_suffix(suffix) {
            if stripped.chars().count() >= 3 {
                return stripped;
            }
            return word;
        }
    }
    word
}

/// Normalized Levenshtein similarity: `1 - distance / max(len)`.
/// Two empty strings are identical (similarity 1).
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Jaccard similarity over whitespace-separated token sets.
/// An empty union scores 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// Cosine similarity of character-frequency vectors.
/// Either magnitude at zero scores 0.
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    let freq_a = char_frequencies(a);
    let freq_b = char_frequencies(b);
    let dot: f64 = freq_a
        .iter()
        .filter_map(|(ch, count_a)| freq_b.get(ch).map(|count_b| count_a * count_b))
        .sum();
    let mag_a = magnitude(&freq_a);
    let mag_b = magnitude(&freq_b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Weighted blend: 0.5 Levenshtein + 0.3 Jaccard + 0.2 cosine. Lies within
/// the [min, max] band of its components because the weights sum to 1.
pub fn hybrid_similarity(a: &str, b: &str) -> f64 {
    0.5 * levenshtein_similarity(a, b) + 0.3 * jaccard_similarity(a, b)
        + 0.2 * cosine_similarity(a, b)
}

/// Keyword set used by the diagnostic semantic score: alphabetic tokens of at
/// least three characters that are not stop words.
pub fn keywords(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|token| token.to_lowercase())
        .filter(|token| {
            token.chars().count() >= 3
                && token.chars().all(char::is_alphabetic)
                && !STOP_WORDS.contains(token.as_str())
        })
        .collect()
}

/// Keyword-set overlap, |intersection| / |union|. Diagnostic only; feeds the
/// confidence score, never the match decision.
pub fn semantic_similarity(a: &str, b: &str) -> f64 {
    let kw_a = keywords(a);
    let kw_b = keywords(b);
    let union = kw_a.union(&kw_b).count();
    if union == 0 {
        return 0.0;
    }
    kw_a.intersection(&kw_b).count() as f64 / union as f64
}

fn char_frequencies(text: &str) -> HashMap<char, f64> {
    let mut freq = HashMap::new();
    for ch in text.chars() {
        *freq.entry(ch).or_insert(0.0) += 1.0;
    }
    freq
}

fn magnitude(freq: &HashMap<char, f64>) -> f64 {
    freq.values().map(|count| count * count).sum::<f64>().sqrt()
}
