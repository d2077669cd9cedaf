// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The primary lexical store and its ingestion path.
//!
//! [`LexicalStore`] owns every primary table. All mutation goes through
//! [`LexicalStore::add_document`]; nothing external writes to the tables.
//! Ingestion is strictly sequential: counts are mutated in place, so each
//! call fully completes before the next may begin.
//!
//! Phrase generation: for a tokenized document and a window cap N, every
//! position emits its atomic token plus every contiguous phrase of 2..=N
//! tokens ending there, joined in original order. `"normal distribution"`
//! therefore stores `normal`, `distribution`, and `normal~distribution`;
//! the reversed spelling would be a different key until canonicalized by the
//! derived n-gram grouping.

use std::collections::BTreeMap;

use crate::derived::{DerivedTables, SealedKb};
use crate::tokenize::Tokenizer;
use crate::types::{
    AdjacencyTable, CountMap, DocId, DocTable, Document, IngestError, KbConfig, LabelTable,
    PairCounts, SEPARATOR_STR,
};

/// The mutable knowledge base: primary tables built during ingestion.
///
/// Created empty, grown monotonically by `add_document`, and consumed by
/// [`LexicalStore::seal`] once ingestion is complete. Querying requires a
/// sealed store, so derived tables cannot silently go stale.
#[derive(Debug, Clone, Default)]
pub struct LexicalStore {
    pub(crate) config: KbConfig,
    pub(crate) tokenizer: Tokenizer,

    /// word → occurrence count across all documents.
    pub(crate) dictionary: CountMap,
    /// doc-id → source reference, in ingestion order.
    pub(crate) sources: Vec<String>,
    /// source reference → doc-id. Reverse of `sources`, kept in lockstep
    /// for logarithmic duplicate checks.
    pub(crate) source_ids: BTreeMap<String, u32>,
    /// word → (doc-id → count).
    pub(crate) url_map: DocTable,
    /// word → (category → count).
    pub(crate) hash_category: LabelTable,
    /// word → (related topic → count).
    pub(crate) hash_related: LabelTable,
    /// word → (see-also reference → count).
    pub(crate) hash_see: LabelTable,
    /// Symmetric token pair counts from two-token phrases.
    pub(crate) word_pairs: PairCounts,
    /// Token adjacency (same data as `word_pairs`, keyed per token).
    pub(crate) word_hash: AdjacencyTable,
    /// Symmetric pair counts for adjacent two-token phrases.
    pub(crate) word2_pairs: PairCounts,
    /// Phrase-level adjacency.
    pub(crate) word2_hash: AdjacencyTable,
}

impl LexicalStore {
    /// Create an empty store with the given configuration and the default
    /// tokenizer.
    pub fn new(config: KbConfig) -> Self {
        LexicalStore {
            config,
            ..LexicalStore::default()
        }
    }

    /// Create an empty store with an explicit tokenizer.
    pub fn with_tokenizer(config: KbConfig, tokenizer: Tokenizer) -> Self {
        LexicalStore {
            config,
            tokenizer,
            ..LexicalStore::default()
        }
    }

    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// word → total occurrence count. Read-only; downstream consumers
    /// (taxonomy building) iterate this together with the embeddings.
    pub fn dictionary(&self) -> &CountMap {
        &self.dictionary
    }

    /// Source references in DocId order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn num_documents(&self) -> usize {
        self.sources.len()
    }

    /// Resolve a source reference back to its dense id.
    pub fn source_id(&self, source_ref: &str) -> Option<DocId> {
        self.source_ids.get(source_ref).map(|&id| DocId(id))
    }

    /// Ingest one document: assign the next dense DocId, tokenize the
    /// content, and fold every generated token and phrase into the primary
    /// tables.
    ///
    /// A duplicate `source_ref` is rejected without mutating any table.
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId, IngestError> {
        if self.source_ids.contains_key(&doc.source_ref) {
            return Err(IngestError::DuplicateSource {
                source_ref: doc.source_ref.clone(),
            });
        }

        let doc_id = DocId(self.sources.len() as u32);
        self.source_ids.insert(doc.source_ref.clone(), doc_id.get());
        self.sources.push(doc.source_ref.clone());

        let tokens = self.tokenizer.tokenize(&doc.content);
        self.index_tokens(&tokens, doc_id, &doc.category, &doc.related, &doc.see_also);

        Ok(doc_id)
    }

    /// Seal the store: run the derived-table pipeline and return the
    /// queryable snapshot. Further ingestion requires
    /// [`SealedKb::into_store`], which discards the derived tables.
    pub fn seal(self) -> SealedKb {
        let derived = DerivedTables::build(&self);
        SealedKb::new(self, derived)
    }

    /// Emit every token and every contiguous phrase ending at each position,
    /// up to the configured window cap, and index each one.
    fn index_tokens(
        &mut self,
        tokens: &[String],
        doc_id: DocId,
        category: &str,
        related: &[String],
        see_also: &[String],
    ) {
        let cap = self.config.max_tokens_per_word;

        for i in 0..tokens.len() {
            self.index_word(tokens[i].clone(), doc_id, category, related, see_also);

            // Window bounds guarantee no underflow at the document start.
            for j in 1..cap.min(i + 1) {
                let phrase = tokens[i - j..=i].join(SEPARATOR_STR);
                self.index_word(phrase, doc_id, category, related, see_also);
            }

            // Phrase-level co-occurrence: consecutive non-overlapping
            // two-token phrases, the one-level-up analogue of token
            // adjacency.
            if cap >= 2 && i >= 3 {
                let left = format!("{}{}{}", tokens[i - 3], SEPARATOR_STR, tokens[i - 2]);
                let right = format!("{}{}{}", tokens[i - 1], SEPARATOR_STR, tokens[i]);
                record_pair(&mut self.word2_pairs, &mut self.word2_hash, &left, &right);
            }
        }
    }

    /// Fold one token or phrase into the dictionary and the four
    /// association maps, and track token adjacency for two-token phrases.
    ///
    /// Related and see-also lists are incremented in full for every word
    /// generated from the document, so a label's count scales with the
    /// document's token volume.
    fn index_word(
        &mut self,
        word: String,
        doc_id: DocId,
        category: &str,
        related: &[String],
        see_also: &[String],
    ) {
        debug_assert!(
            !word.is_empty(),
            "tokenizer must not emit empty tokens"
        );

        *self.dictionary.entry(word.clone()).or_insert(0) += 1;

        *self
            .url_map
            .entry(word.clone())
            .or_default()
            .entry(doc_id.get())
            .or_insert(0) += 1;

        *self
            .hash_category
            .entry(word.clone())
            .or_default()
            .entry(category.to_string())
            .or_insert(0) += 1;

        let related_map = self.hash_related.entry(word.clone()).or_default();
        for topic in related {
            *related_map.entry(topic.clone()).or_insert(0) += 1;
        }

        let see_map = self.hash_see.entry(word.clone()).or_default();
        for reference in see_also {
            *see_map.entry(reference.clone()).or_insert(0) += 1;
        }

        // Two-token phrases feed the token adjacency statistics.
        let mut parts = word.split(crate::types::SEPARATOR);
        if let (Some(a), Some(b), None) = (parts.next(), parts.next(), parts.next()) {
            let (a, b) = (a.to_string(), b.to_string());
            record_pair_owned(&mut self.word_pairs, &mut self.word_hash, a, b);
        }
    }
}

/// Record a symmetric co-occurrence: both pair orders and both adjacency
/// directions.
fn record_pair(pairs: &mut PairCounts, adjacency: &mut AdjacencyTable, a: &str, b: &str) {
    record_pair_owned(pairs, adjacency, a.to_string(), b.to_string());
}

fn record_pair_owned(
    pairs: &mut PairCounts,
    adjacency: &mut AdjacencyTable,
    a: String,
    b: String,
) {
    *pairs.entry((a.clone(), b.clone())).or_insert(0) += 1;
    *pairs.entry((b.clone(), a.clone())).or_insert(0) += 1;

    *adjacency
        .entry(a.clone())
        .or_default()
        .entry(b.clone())
        .or_insert(0) += 1;
    *adjacency.entry(b).or_default().entry(a).or_insert(0) += 1;
}
