//! Fuzzy Matching
//!
//! Levenshtein edit distance and the similarity, match and score
//! functions built on it. Everything here is pure and stateless, so the
//! functions can be called from any number of tasks at once.
//!
//! Text is NFC-normalized and lowercased before matching; lengths are
//! counted in chars, not bytes.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Similarity a word or window must reach to count as a fuzzy hit
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Sliding-window matching kicks in from this query length (in chars)
const MIN_WINDOW_QUERY_LEN: usize = 4;

const EXACT_SCORE: f64 = 100.0;
const CONTAINS_BONUS: f64 = 80.0;
const WORD_SIMILARITY_WEIGHT: f64 = 20.0;
const PREFIX_BONUS: f64 = 10.0;

/// Levenshtein distance (unit-cost insert, delete, substitute)
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    char_distance(&a, &b)
}

/// Two-row dynamic programming over `|a| x |b|`
fn char_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - distance / max(|a|, |b|)`; two empty strings are identical
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    char_similarity(&a, &b)
}

fn char_similarity(a: &[char], b: &[char]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - char_distance(a, b) as f64 / longest as f64
}

/// Whether `query` approximately occurs in `text`.
///
/// True on case-insensitive equality, on substring containment, when any
/// word of `text` is at least `threshold` similar to any word of `query`,
/// or (for queries of four chars or more) when any same-length window of
/// `text` is at least `threshold` similar to the query.
pub fn fuzzy_match(text: &str, query: &str, threshold: f64) -> bool {
    let text = normalize_for_matching(text);
    let query = normalize_for_matching(query);

    if text == query {
        return true;
    }
    if query.is_empty() {
        return false;
    }
    if text.contains(&query) {
        return true;
    }

    let text_words = words(&text);
    let query_words = words(&query);
    let word_hit = query_words.iter().any(|qw| {
        text_words
            .iter()
            .any(|tw| char_similarity(tw, qw) >= threshold)
    });
    if word_hit {
        return true;
    }

    let query_chars: Vec<char> = query.chars().collect();
    if query_chars.len() < MIN_WINDOW_QUERY_LEN {
        return false;
    }
    let text_chars: Vec<char> = text.chars().collect();
    text_chars
        .windows(query_chars.len())
        .any(|window| char_similarity(window, &query_chars) >= threshold)
}

/// Match quality of `query` against `text` on a 0-100 scale.
///
/// 100 on an exact (case-insensitive) match. Otherwise the sum of a
/// containment bonus (80), the average best per-word similarity of the
/// query words (times 20) and a prefix bonus (10), scaled by the ratio of
/// the shorter to the longer word count and clamped to 0-100.
pub fn fuzzy_score(text: &str, query: &str) -> f64 {
    let text = normalize_for_matching(text);
    let query = normalize_for_matching(query);

    if text == query {
        return EXACT_SCORE;
    }
    if text.is_empty() || query.is_empty() {
        return 0.0;
    }

    let mut score = 0.0;
    if text.contains(&query) {
        score += CONTAINS_BONUS;
    }

    let text_words = words(&text);
    let query_words = words(&query);
    if !query_words.is_empty() {
        let total: f64 = query_words
            .iter()
            .map(|qw| {
                text_words
                    .iter()
                    .map(|tw| char_similarity(tw, qw))
                    .fold(0.0, f64::max)
            })
            .sum();
        score += total / query_words.len() as f64 * WORD_SIMILARITY_WEIGHT;
    }

    if text.starts_with(&query) {
        score += PREFIX_BONUS;
    }

    let (shorter, longer) = {
        let q = query_words.len().max(1);
        let t = text_words.len().max(1);
        (q.min(t), q.max(t))
    };
    (score * shorter as f64 / longer as f64).clamp(0.0, EXACT_SCORE)
}

/// NFC + lowercase + trim
fn normalize_for_matching(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase().trim().to_string()
}

fn words(text: &str) -> Vec<Vec<char>> {
    let mut words: Vec<Vec<char>> = text
        .unicode_words()
        .map(|w| w.chars().collect())
        .collect();
    if words.is_empty() && !text.trim().is_empty() {
        // Symbol-only text such as "C++" or an emoji still counts as one word
        words = text.split_whitespace().map(|w| w.chars().collect()).collect();
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distance_basics() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", ""), 3);
        assert_eq!(distance("flaw", "lawn"), 2);
        assert_eq!(distance("café", "cafe"), 1);
    }

    #[test]
    fn test_similarity_of_empty_strings() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("", "a"), 0.0);
    }

    #[test]
    fn test_fuzzy_match_typo() {
        assert!(fuzzy_match("amazing experience", "amzing", DEFAULT_THRESHOLD));
        assert!(fuzzy_match("Python Tips", "pyhton tips", 0.6));
        assert!(!fuzzy_match("amazing experience", "terrible", DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_fuzzy_match_exact_and_substring() {
        assert!(fuzzy_match("Hello", "hello", DEFAULT_THRESHOLD));
        assert!(fuzzy_match("I love C++ a lot", "c++", DEFAULT_THRESHOLD));
        assert!(fuzzy_match("", "", DEFAULT_THRESHOLD));
        assert!(!fuzzy_match("anything", "", DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_fuzzy_match_sliding_window() {
        // "javascrxpt" is not a word of the text, but a window of it is close
        assert!(fuzzy_match("learningjavascript", "javascrxpt", DEFAULT_THRESHOLD));
        // short queries never use windows
        assert!(!fuzzy_match("xyzabc", "abd", DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_fuzzy_score_ordering() {
        let exact = fuzzy_score("python", "python");
        let prefix = fuzzy_score("Python Python Python", "python");
        let inside = fuzzy_score("I like Python", "python");
        let far = fuzzy_score("JavaScript and Python are great", "python");
        assert_eq!(exact, 100.0);
        assert!(prefix > inside);
        assert!(inside > far);
        assert_eq!(fuzzy_score("python", ""), 0.0);
        assert_eq!(fuzzy_score("", "python"), 0.0);
    }

    proptest! {
        #[test]
        fn identity_properties(x in "\\PC{0,24}") {
            prop_assert_eq!(distance(&x, &x), 0);
            prop_assert_eq!(similarity(&x, &x), 1.0);
        }

        #[test]
        fn exact_score_is_100(x in "[a-zA-Z0-9 ]{1,24}") {
            prop_assume!(!x.trim().is_empty());
            prop_assert_eq!(fuzzy_score(&x, &x), 100.0);
        }

        #[test]
        fn distance_is_symmetric(a in "[a-z]{0,12}", b in "[a-z]{0,12}") {
            prop_assert_eq!(distance(&a, &b), distance(&b, &a));
        }

        #[test]
        fn score_is_bounded(t in "\\PC{0,30}", q in "\\PC{0,10}") {
            let s = fuzzy_score(&t, &q);
            prop_assert!((0.0..=100.0).contains(&s));
            let sim = similarity(&t, &q);
            prop_assert!((0.0..=1.0).contains(&sim));
        }
    }
}
