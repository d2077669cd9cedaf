// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Free-text querying against a sealed knowledge base.
//!
//! The algorithm is exhaustive phrase-combination matching: the query's
//! known tokens are sorted, every non-empty subset is rendered as a
//! canonical key, and each key is resolved to its stored phrase variants.
//! Enumeration is exponential in the number of distinct surviving tokens:
//! a deliberate trade-off, guarded by [`MAX_QUERY_TOKENS`] rather than
//! replaced by something cleverer with different match semantics.

use crate::derived::SealedKb;
use crate::types::{is_phrase, QueryHit, SEPARATOR_STR};

/// Cap on distinct query tokens entering subset enumeration (2^16 subsets).
/// Tokens beyond the cap are dropped in first-seen order.
pub const MAX_QUERY_TOKENS: usize = 16;

/// Tunable query inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub max_results: usize,
    pub min_score: f64,
}

impl Default for QueryParams {
    fn default() -> Self {
        QueryParams {
            max_results: 10,
            min_score: 0.0,
        }
    }
}

impl SealedKb {
    /// Resolve a free-text query into ranked phrase matches.
    ///
    /// Unknown-only queries and queries against an empty store return an
    /// empty vector, never an error.
    pub fn query(&self, text: &str, params: &QueryParams) -> Vec<QueryHit> {
        let tokens = self.query_tokens(text);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<QueryHit> = Vec::new();
        // Every non-empty subset of the sorted token list. Tokens are
        // already sorted, so each subset joins directly into its canonical
        // key.
        for mask in 1u32..(1u32 << tokens.len()) {
            let key = subset_key(&tokens, mask);

            if mask.count_ones() == 1 {
                // A lone token is its own canonical variant; the n-gram
                // index only holds multi-token keys.
                self.push_hit(&mut hits, &key, params.min_score);
            } else if let Some(variants) = self.derived.compressed_ngrams_table.get(&key) {
                for variant in variants {
                    self.push_hit(&mut hits, variant, params.min_score);
                }
            }
        }

        // Rank: score descending, then raw count, then term for stable ties.
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a.term.cmp(&b.term))
        });
        hits.truncate(params.max_results);
        hits
    }

    /// Tokenize the query and keep the distinct in-vocabulary tokens,
    /// sorted lexicographically. First-seen order decides which tokens
    /// survive the enumeration cap.
    fn query_tokens(&self, text: &str) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for token in self.store.tokenizer.tokenize(text) {
            if self.store.dictionary.contains_key(&token) && !seen.contains(&token) {
                seen.push(token);
                if seen.len() == MAX_QUERY_TOKENS {
                    break;
                }
            }
        }
        seen.sort_unstable();
        seen
    }

    /// Assemble the enriched result for one candidate word, if it clears
    /// the score threshold.
    fn push_hit(&self, hits: &mut Vec<QueryHit>, word: &str, min_score: f64) {
        let Some(&count) = self.store.dictionary.get(word) else {
            return;
        };
        // Fixed rescaling of the raw count; ranking order is what matters.
        let score = count as f64 / 100.0;
        if score < min_score {
            return;
        }

        let embedding = if is_phrase(word) {
            self.derived.embeddings2.get(word)
        } else {
            self.derived.embeddings.get(word)
        };

        hits.push(QueryHit {
            term: word.to_string(),
            score,
            count,
            documents: self.store.url_map.get(word).cloned().unwrap_or_default(),
            categories: self
                .store
                .hash_category
                .get(word)
                .cloned()
                .unwrap_or_default(),
            related: self
                .store
                .hash_related
                .get(word)
                .cloned()
                .unwrap_or_default(),
            see_also: self.store.hash_see.get(word).cloned().unwrap_or_default(),
            embedding: embedding.cloned(),
        });
    }
}

/// Join the tokens selected by `mask` with the phrase separator.
fn subset_key(tokens: &[String], mask: u32) -> String {
    let mut key = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if mask & (1 << i) != 0 {
            if !key.is_empty() {
                key.push_str(SEPARATOR_STR);
            }
            key.push_str(token);
        }
    }
    key
}
