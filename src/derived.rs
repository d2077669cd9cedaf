// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The derived-table pipeline and the sealed, queryable store.
//!
//! Derived tables are a pure function of the primary tables plus the
//! frequency threshold. The build is always a full recomputation, never
//! incremental, and is byte-for-byte reproducible: every table is
//! key-ordered, and variant lists are sorted count-descending with a
//! lexicographic tie-break.
//!
//! Stage order matters: the phrase embeddings are computed from the
//! *compressed* phrase adjacency, after frequency filtering, so rare
//! phrases never contribute neighbors.

use crate::index::LexicalStore;
use crate::types::{
    canonical_key, is_phrase, AdjacencyTable, CountMap, EmbeddingTable, NgramTable, PairCounts,
    PairScores,
};

/// Read-only statistics derived from a completed ingestion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedTables {
    /// (token A, token B) → `count(A,B) / sqrt(count(A) · count(B))`.
    pub(crate) pmi_table: PairScores,
    /// Phrase-level PMI.
    pub(crate) pmi_table2: PairScores,
    /// Token adjacency reweighted by PMI.
    pub(crate) embeddings: EmbeddingTable,
    /// Phrase adjacency reweighted by phrase-level PMI.
    pub(crate) embeddings2: EmbeddingTable,
    /// canonical key → all phrase variants sharing it.
    pub(crate) ngrams_table: NgramTable,
    /// Frequency-filtered variants, count-descending. Empty groups omitted.
    pub(crate) compressed_ngrams_table: NgramTable,
    /// Phrase adjacency with key and neighbors both above the threshold.
    pub(crate) compressed_word2_hash: AdjacencyTable,
}

impl DerivedTables {
    /// Run the full pipeline against a completed primary store.
    pub fn build(store: &LexicalStore) -> Self {
        let min_freq = store.config.min_token_frequency;

        let pmi_table = build_pmi(&store.word_pairs, &store.dictionary);
        let pmi_table2 = build_pmi(&store.word2_pairs, &store.dictionary);
        let embeddings = build_embeddings(&store.word_hash, &pmi_table);
        let ngrams_table = group_ngrams(&store.dictionary);
        let compressed_ngrams_table = compress_ngrams(&store.dictionary, &ngrams_table, min_freq);
        let compressed_word2_hash = compress_adjacency(&store.dictionary, &store.word2_hash, min_freq);
        let embeddings2 = build_embeddings(&compressed_word2_hash, &pmi_table2);

        DerivedTables {
            pmi_table,
            pmi_table2,
            embeddings,
            embeddings2,
            ngrams_table,
            compressed_ngrams_table,
            compressed_word2_hash,
        }
    }

    pub fn pmi_table(&self) -> &PairScores {
        &self.pmi_table
    }

    pub fn embeddings(&self) -> &EmbeddingTable {
        &self.embeddings
    }

    pub fn embeddings2(&self) -> &EmbeddingTable {
        &self.embeddings2
    }

    pub fn ngrams_table(&self) -> &NgramTable {
        &self.ngrams_table
    }

    pub fn compressed_ngrams_table(&self) -> &NgramTable {
        &self.compressed_ngrams_table
    }

    pub fn compressed_word2_hash(&self) -> &AdjacencyTable {
        &self.compressed_word2_hash
    }
}

/// PMI per recorded pair. Pairs referencing a word absent from the
/// dictionary are skipped (cannot occur when built from the same ingestion
/// pass, but load tolerates partial tables).
fn build_pmi(pairs: &PairCounts, dictionary: &CountMap) -> PairScores {
    let mut pmi = PairScores::new();
    for ((a, b), &count) in pairs {
        let (Some(&count_a), Some(&count_b)) = (dictionary.get(a), dictionary.get(b)) else {
            continue;
        };
        let score = count as f64 / ((count_a * count_b) as f64).sqrt();
        pmi.insert((a.clone(), b.clone()), score);
    }
    pmi
}

/// Neighbor sets reweighted by PMI. Sparse by construction: a word with no
/// recorded adjacency yields no entry, and neighbors without a PMI pair are
/// dropped.
fn build_embeddings(adjacency: &AdjacencyTable, pmi: &PairScores) -> EmbeddingTable {
    let mut embeddings = EmbeddingTable::new();
    for (word, neighbors) in adjacency {
        let mut vector = std::collections::BTreeMap::new();
        for neighbor in neighbors.keys() {
            if let Some(&score) = pmi.get(&(word.clone(), neighbor.clone())) {
                vector.insert(neighbor.clone(), score);
            }
        }
        embeddings.insert(word.clone(), vector);
    }
    embeddings
}

/// Group every multi-token dictionary key under its canonical sorted form.
/// Atomic tokens are excluded; grouping applies only to phrases.
fn group_ngrams(dictionary: &CountMap) -> NgramTable {
    let mut table = NgramTable::new();
    for word in dictionary.keys() {
        if is_phrase(word) {
            table
                .entry(canonical_key(word))
                .or_default()
                .push(word.clone());
        }
    }
    table
}

/// Frequency-filter each group and order variants by descending count.
/// Ties break lexicographically so rebuilds are reproducible.
fn compress_ngrams(dictionary: &CountMap, ngrams: &NgramTable, min_freq: u64) -> NgramTable {
    let mut compressed = NgramTable::new();
    for (key, variants) in ngrams {
        let mut kept: Vec<String> = variants
            .iter()
            .filter(|w| dictionary.get(*w).copied().unwrap_or(0) >= min_freq)
            .cloned()
            .collect();
        kept.sort_by(|a, b| {
            let ca = dictionary.get(a).copied().unwrap_or(0);
            let cb = dictionary.get(b).copied().unwrap_or(0);
            cb.cmp(&ca).then_with(|| a.cmp(b))
        });
        if !kept.is_empty() {
            compressed.insert(key.clone(), kept);
        }
    }
    compressed
}

/// Keep only adjacency entries where both the key and the neighbor meet the
/// frequency threshold.
fn compress_adjacency(
    dictionary: &CountMap,
    adjacency: &AdjacencyTable,
    min_freq: u64,
) -> AdjacencyTable {
    let mut compressed = AdjacencyTable::new();
    for (word, neighbors) in adjacency {
        if dictionary.get(word).copied().unwrap_or(0) < min_freq {
            continue;
        }
        let kept: CountMap = neighbors
            .iter()
            .filter(|(n, _)| dictionary.get(*n).copied().unwrap_or(0) >= min_freq)
            .map(|(n, &c)| (n.clone(), c))
            .collect();
        compressed.insert(word.clone(), kept);
    }
    compressed
}

// =============================================================================
// SEALED STORE
// =============================================================================

/// A completed, queryable knowledge base: the frozen primary tables plus
/// their derived statistics.
///
/// This is the only type that exposes querying, which makes the ordering
/// dependency explicit: you cannot query a store whose derived tables are
/// stale, because further ingestion requires [`SealedKb::into_store`], and
/// sealing always rebuilds. All data is owned and queries take `&self`, so a
/// sealed store can be shared read-only across threads.
#[derive(Debug, Clone)]
pub struct SealedKb {
    pub(crate) store: LexicalStore,
    pub(crate) derived: DerivedTables,
}

impl SealedKb {
    pub(crate) fn new(store: LexicalStore, derived: DerivedTables) -> Self {
        SealedKb { store, derived }
    }

    /// The frozen primary tables.
    pub fn store(&self) -> &LexicalStore {
        &self.store
    }

    /// The derived statistics.
    pub fn derived(&self) -> &DerivedTables {
        &self.derived
    }

    /// Reopen for ingestion, discarding the derived tables.
    pub fn into_store(self) -> LexicalStore {
        self.store
    }
}
