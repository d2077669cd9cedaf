// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Test utilities shared across unit and integration tests.
//!
//! This module is always compiled but hidden from documentation.
//! It provides canonical implementations of test helpers to avoid
//! duplication.

#![doc(hidden)]

use crate::index::LexicalStore;
use crate::types::{Document, KbConfig};

/// Create a minimal document with just a source reference and content.
pub fn make_document(source_ref: &str, content: &str) -> Document {
    Document {
        source_ref: source_ref.to_string(),
        category: String::new(),
        content: content.to_string(),
        related: Vec::new(),
        see_also: Vec::new(),
    }
}

/// Create a document with a category and association lists.
pub fn make_document_full(
    source_ref: &str,
    category: &str,
    content: &str,
    related: &[&str],
    see_also: &[&str],
) -> Document {
    Document {
        source_ref: source_ref.to_string(),
        category: category.to_string(),
        content: content.to_string(),
        related: related.iter().map(|s| (*s).to_string()).collect(),
        see_also: see_also.iter().map(|s| (*s).to_string()).collect(),
    }
}

/// Ingest a fixed document sequence into a fresh store.
pub fn store_with_documents(config: KbConfig, docs: &[Document]) -> LexicalStore {
    let mut store = LexicalStore::new(config);
    for doc in docs {
        store
            .add_document(doc)
            .expect("test documents must have unique source refs");
    }
    store
}
