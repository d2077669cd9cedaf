// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The building blocks of the lexical knowledge base.
//!
//! These types define how documents, tokens, and the primary/derived tables
//! fit together. Keys in the store are either atomic tokens or *phrases*:
//! 2..=N tokens joined with [`SEPARATOR`], order-preserving until
//! canonicalized for lookup.
//!
//! # Invariants (the stuff that breaks if you ignore it)
//!
//! - **SEPARATOR**: never a valid token character. The tokenizer replaces it
//!   with whitespace, so a `~` reaching a stored key always means a phrase
//!   boundary.
//! - **DocId**: dense, zero-based, assigned in ingestion order. A source
//!   reference is never ingested twice, so `sources[id]` is stable forever.
//! - **Counts**: monotonically increasing during ingestion, never pruned.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Reserved phrase separator. Tokenization strips it from input text, so it
/// can never appear inside an atomic token.
pub const SEPARATOR: char = '~';

/// `SEPARATOR` as a string slice, for `join`/`split` call sites.
pub const SEPARATOR_STR: &str = "~";

// =============================================================================
// NEWTYPES
// =============================================================================

/// Type-safe document identifier.
///
/// Equal to the document's insertion position in the append-only source
/// array. Prevents accidentally passing a count where a document ID is
/// expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DocId(pub u32);

impl DocId {
    /// Create a new DocId, validating it's within bounds.
    #[inline]
    pub fn new(id: u32, num_docs: usize) -> Option<Self> {
        if (id as usize) < num_docs {
            Some(DocId(id))
        } else {
            None
        }
    }

    /// Get the underlying value.
    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Convert to usize for array indexing.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

impl From<DocId> for usize {
    fn from(id: DocId) -> Self {
        id.0 as usize
    }
}

// =============================================================================
// TABLE TYPES
// =============================================================================
//
// One concrete alias per table role; naming the roles keeps call sites
// honest. BTreeMap throughout so iteration order, and therefore every
// derived table and serialized form, is reproducible.

/// word → total occurrence count across all ingested documents.
pub type CountMap = BTreeMap<String, u64>;

/// doc-id → occurrence count within that document.
pub type DocOccurrences = BTreeMap<u32, u64>;

/// word → (doc-id → count). The per-word document occurrence table.
pub type DocTable = BTreeMap<String, DocOccurrences>;

/// word → (label → count). Used for categories, related topics, see-also.
pub type LabelTable = BTreeMap<String, CountMap>;

/// (word A, word B) → co-occurrence count. Stored symmetrically.
pub type PairCounts = BTreeMap<(String, String), u64>;

/// (word A, word B) → PMI score.
pub type PairScores = BTreeMap<(String, String), f64>;

/// word → (neighbor → count). Adjacency derived from two-token phrases.
pub type AdjacencyTable = BTreeMap<String, CountMap>;

/// word → (neighbor → PMI score). Sparse co-occurrence embedding.
pub type EmbeddingTable = BTreeMap<String, BTreeMap<String, f64>>;

/// canonical key → phrase variants sharing that key.
pub type NgramTable = BTreeMap<String, Vec<String>>;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// A single ingestion record, as produced by crawlers or PDF processors.
///
/// The store never inspects how this was produced; `source_ref` is an opaque
/// identifier (URL or synthetic) used only for duplicate detection and the
/// dense DocId assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub source_ref: String,
    #[serde(default)]
    pub category: String,
    pub content: String,
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default)]
    pub see_also: Vec<String>,
}

/// One ranked query match with its associated metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHit {
    /// The matched dictionary key (atomic token or phrase).
    pub term: String,
    /// `count / 100.0`, a fixed rescaling; only the ordering is meaningful.
    pub score: f64,
    pub count: u64,
    /// doc-id → occurrences of `term` in that document.
    pub documents: DocOccurrences,
    pub categories: CountMap,
    pub related: CountMap,
    pub see_also: CountMap,
    /// Co-occurrence embedding, when one exists for `term`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<BTreeMap<String, f64>>,
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Knobs consumed at store construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KbConfig {
    /// Maximum tokens per stored phrase (window cap for phrase generation).
    pub max_tokens_per_word: usize,
    /// Minimum dictionary count for a variant to survive compression.
    pub min_token_frequency: u64,
    /// Default storage directory for save/load.
    pub data_dir: PathBuf,
}

impl Default for KbConfig {
    fn default() -> Self {
        KbConfig {
            max_tokens_per_word: 4,
            min_token_frequency: 2,
            data_dir: PathBuf::from("data/knowledge"),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error type for ingestion failures.
///
/// Duplicate sources are a rejection, not a fault: the store is guaranteed
/// unchanged when this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The source reference was already ingested.
    DuplicateSource { source_ref: String },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::DuplicateSource { source_ref } => {
                write!(f, "source already in knowledge base: {}", source_ref)
            }
        }
    }
}

impl std::error::Error for IngestError {}

// =============================================================================
// PHRASE HELPERS
// =============================================================================

/// True if `word` is a multi-token phrase (contains the separator).
#[inline]
pub fn is_phrase(word: &str) -> bool {
    word.contains(SEPARATOR)
}

/// Canonical lookup form: tokens sorted lexicographically and rejoined.
///
/// Atomic tokens canonicalize to themselves. Order-independent query lookup
/// goes through this form.
pub fn canonical_key(word: &str) -> String {
    if !is_phrase(word) {
        return word.to_string();
    }
    let mut tokens: Vec<&str> = word.split(SEPARATOR).collect();
    tokens.sort_unstable();
    tokens.join(SEPARATOR_STR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_bounds_check() {
        assert_eq!(DocId::new(2, 3), Some(DocId(2)));
        assert_eq!(DocId::new(3, 3), None);
        assert_eq!(DocId(7).as_usize(), 7);
    }

    #[test]
    fn canonical_key_sorts_tokens() {
        assert_eq!(canonical_key("normal~distribution"), "distribution~normal");
        assert_eq!(canonical_key("a~c~b"), "a~b~c");
    }

    #[test]
    fn canonical_key_is_identity_for_atomic_tokens() {
        assert_eq!(canonical_key("probability"), "probability");
    }

    #[test]
    fn canonical_key_is_idempotent() {
        let once = canonical_key("theory~probability");
        assert_eq!(canonical_key(&once), once);
    }

    #[test]
    fn duplicate_source_display() {
        let err = IngestError::DuplicateSource {
            source_ref: "https://example.org/p".to_string(),
        };
        assert!(err.to_string().contains("example.org"));
    }
}
