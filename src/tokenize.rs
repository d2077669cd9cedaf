// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Text normalization and tokenization.
//!
//! Tokenization is pure and deterministic: the same input always yields the
//! same token sequence, and there are no error conditions: unknown
//! characters simply pass through. Stages, in order:
//!
//! 1. character substitution via a configurable map (HTML entities,
//!    possessive stripping, and similar crawl artifacts)
//! 2. NFD diacritic stripping (feature `unicode-normalization`)
//! 3. lowercasing
//! 4. punctuation and the reserved `~` separator replaced with whitespace
//! 5. whitespace split, dropping empties and stopwords

use std::collections::BTreeSet;

#[cfg(feature = "unicode-normalization")]
use unicode_normalization::UnicodeNormalization;

use crate::types::SEPARATOR;

/// Punctuation replaced with whitespace before splitting.
const PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '"', '\'',
];

/// Configurable tokenizer: substitution map plus stopword filter.
///
/// The substitution map is applied in insertion order, so multi-character
/// entries (HTML entities) must come before any single-character rules that
/// would mangle them.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    substitutions: Vec<(String, String)>,
    stopwords: BTreeSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer {
            substitutions: default_substitutions(),
            stopwords: default_stopwords(),
        }
    }
}

impl Tokenizer {
    /// Build a tokenizer with an explicit substitution map and stopword set.
    pub fn new<I, S>(substitutions: Vec<(String, String)>, stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tokenizer {
            substitutions,
            stopwords: stopwords.into_iter().map(Into::into).collect(),
        }
    }

    /// True if `word` is filtered out before indexing.
    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    pub fn stopwords(&self) -> &BTreeSet<String> {
        &self.stopwords
    }

    pub fn substitutions(&self) -> &[(String, String)] {
        &self.substitutions
    }

    /// Normalize and split `text` into atomic tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut text = text.to_string();
        for (from, to) in &self.substitutions {
            text = text.replace(from.as_str(), to);
        }

        let text = strip_diacritics(&text).to_lowercase();
        let text: String = text
            .chars()
            .map(|c| {
                if c == SEPARATOR || PUNCTUATION.contains(&c) {
                    ' '
                } else {
                    c
                }
            })
            .collect();

        text.split_whitespace()
            .filter(|t| !self.stopwords.contains(*t))
            .map(str::to_string)
            .collect()
    }
}

/// Decompose to NFD and drop combining marks, so "café" matches "cafe".
#[cfg(feature = "unicode-normalization")]
fn strip_diacritics(value: &str) -> String {
    value.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Lightweight fallback without the unicode-normalization dependency.
/// Assumes input is ASCII or pre-normalized via the substitution map.
#[cfg(not(feature = "unicode-normalization"))]
fn strip_diacritics(value: &str) -> String {
    value.to_string()
}

/// Check if a character is a combining mark (diacritic).
///
/// Combining marks have Unicode category "Mn" (Mark, Nonspacing).
#[cfg(feature = "unicode-normalization")]
fn is_combining_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}' |  // Combining Diacritical Marks
        '\u{1DC0}'..='\u{1DFF}' |  // Combining Diacritical Marks Supplement
        '\u{20D0}'..='\u{20FF}' |  // Combining Diacritical Marks for Symbols
        '\u{FE20}'..='\u{FE2F}'    // Combining Half Marks
    )
}

/// Crawl-artifact substitutions: HTML entities left behind by extraction,
/// possessives, and double spaces.
fn default_substitutions() -> Vec<(String, String)> {
    [
        ("&nbsp;", " "),
        ("&amp;", "&"),
        ("&oacute;", "o"),
        ("&eacute;", "e"),
        ("&aacute;", "a"),
        ("&ouml;", "o"),
        ("&ocirc;", "o"),
        ("&#233;", "e"),
        ("&#243;", "o"),
        ("'s", ""),
        ("  ", " "),
    ]
    .iter()
    .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
    .collect()
}

/// English function words excluded from the dictionary.
fn default_stopwords() -> BTreeSet<String> {
    [
        "-", "&", "in", "the", "and", "to", "of", "a", "this", "for", "is", "with", "from", "as",
        "on", "an", "that", "it", "are", "within", "will", "by", "or", "its", "can", "your", "be",
        "about", "used", "our", "their", "you", "into", "using", "these", "which", "we", "how",
        "see", "below", "all", "use", "across", "provide", "provides", "aims", "one", "ensuring",
        "crucial", "at", "various", "through", "find", "ensure", "more", "another", "but",
        "should", "considered", "provided", "must", "whether", "located", "where", "begins",
        "any",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_punctuation_and_whitespace() {
        let tok = Tokenizer::default();
        assert_eq!(
            tok.tokenize("Probability theory, statistics!"),
            vec!["probability", "theory", "statistics"]
        );
    }

    #[test]
    fn filters_stopwords() {
        let tok = Tokenizer::default();
        assert_eq!(
            tok.tokenize("the theory of probability"),
            vec!["theory", "probability"]
        );
    }

    #[test]
    fn separator_never_survives_tokenization() {
        let tok = Tokenizer::default();
        for token in tok.tokenize("weird~input with~tildes") {
            assert!(!token.contains(SEPARATOR));
        }
    }

    #[test]
    fn substitution_map_applied_before_split() {
        let tok = Tokenizer::default();
        assert_eq!(tok.tokenize("Feller's&nbsp;theorem"), vec!["feller", "theorem"]);
    }

    #[test]
    fn deterministic_and_pure() {
        let tok = Tokenizer::default();
        let input = "Bayes' rule; conditional probability.";
        assert_eq!(tok.tokenize(input), tok.tokenize(input));
    }

    #[cfg(feature = "unicode-normalization")]
    #[test]
    fn strips_diacritics() {
        let tok = Tokenizer::default();
        assert_eq!(tok.tokenize("Café naïve"), vec!["cafe", "naive"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let tok = Tokenizer::default();
        assert!(tok.tokenize("").is_empty());
        assert!(tok.tokenize("   ").is_empty());
    }
}
