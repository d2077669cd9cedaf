//! Hash-indexed lexical knowledge base with co-occurrence embeddings.
//!
//! This crate ingests free-form text documents and builds a queryable
//! lexical index: tokens and multi-token phrases mapped to frequency
//! counts, source references, categorical metadata, and PMI-weighted
//! co-occurrence statistics. Queries resolve free text into ranked phrase
//! matches through order-independent canonical keys.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ tokenize.rs  │────▶│  index.rs    │────▶│  derived.rs  │
//! │ (Tokenizer)  │     │(LexicalStore,│     │(DerivedTables│
//! │              │     │ add_document)│     │  → SealedKb) │
//! └──────────────┘     └──────────────┘     └──────┬───────┘
//!                                                  │
//!                      ┌──────────────┐     ┌──────▼───────┐
//!                      │  persist.rs  │◀───▶│   query.rs   │
//!                      │ (text tables │     │ (SealedKb::  │
//!                      │ + binary.rs) │     │    query)    │
//!                      └──────────────┘     └──────────────┘
//! ```
//!
//! Data flows one way: documents → tokenizer → phrase generation → primary
//! tables → (ingestion complete) → derived tables → queries. Sealing is the
//! explicit phase boundary: [`LexicalStore::seal`] consumes the mutable
//! store and returns the only type that can answer queries, so derived
//! tables can never silently go stale.
//!
//! # Usage
//!
//! ```ignore
//! use lexkb::{Document, KbConfig, LexicalStore, QueryParams};
//!
//! let mut store = LexicalStore::new(KbConfig::default());
//! store.add_document(&Document { ... })?;
//! let kb = store.seal();
//!
//! let hits = kb.query("normal distribution", &QueryParams::default());
//! kb.save("data/knowledge")?;
//! ```

// Module declarations
pub mod binary;
mod derived;
mod index;
mod persist;
mod query;
mod tokenize;
mod types;

#[doc(hidden)]
pub mod testing;

// Re-exports for public API
pub use derived::{DerivedTables, SealedKb};
pub use index::LexicalStore;
pub use persist::{load, save, SNAPSHOT_FILE};
pub use query::{QueryParams, MAX_QUERY_TOKENS};
pub use tokenize::Tokenizer;
pub use types::{
    canonical_key, is_phrase, DocId, Document, IngestError, KbConfig, QueryHit, SEPARATOR,
    SEPARATOR_STR,
};
