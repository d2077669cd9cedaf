//! Shared test utilities and fixtures.

#![allow(dead_code)]

use lexkb::{Document, KbConfig, SealedKb};

// Re-export canonical test utilities from lexkb::testing
pub use lexkb::testing::{make_document, make_document_full, store_with_documents};

// ============================================================================
// CORPORA
// ============================================================================

/// A small statistics-flavored corpus exercising categories, related topics
/// and see-also links alongside plain content.
pub fn stats_corpus() -> Vec<Document> {
    vec![
        make_document_full(
            "https://example.org/normal",
            "Statistics",
            "the normal distribution is a continuous probability distribution",
            &["gaussian distribution", "central limit theorem"],
            &["standard deviation"],
        ),
        make_document_full(
            "https://example.org/poisson",
            "Statistics",
            "the poisson distribution models rare event counts",
            &["exponential distribution"],
            &["queueing theory"],
        ),
        make_document_full(
            "https://example.org/bayes",
            "Probability",
            "bayes theorem relates conditional probability and marginal probability",
            &["conditional probability"],
            &[],
        ),
        make_document_full(
            "https://example.org/clt",
            "Probability",
            "the central limit theorem explains why the normal distribution appears everywhere",
            &["normal distribution"],
            &["law of large numbers"],
        ),
    ]
}

/// Sealed knowledge base over [`stats_corpus`] with default configuration.
pub fn stats_kb() -> SealedKb {
    store_with_documents(KbConfig::default(), &stats_corpus()).seal()
}

/// Sealed knowledge base over `texts`, one synthetic source per text.
pub fn kb_from_texts(config: KbConfig, texts: &[&str]) -> SealedKb {
    let docs: Vec<Document> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| make_document(&format!("doc-{}", i), text))
        .collect();
    store_with_documents(config, &docs).seal()
}
