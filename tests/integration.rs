//! End-to-end scenario tests: ingest a corpus, seal, query, check ranking
//! and metadata aggregation.

mod common;

use common::{kb_from_texts, make_document, stats_corpus, stats_kb};
use lexkb::{DocId, KbConfig, LexicalStore, QueryParams, MAX_QUERY_TOKENS};

// ============================================================================
// QUERY SCENARIOS
// ============================================================================

#[test]
fn phrase_query_ranks_subsets_and_phrase() {
    let kb = stats_kb();
    let hits = kb.query("normal distribution", &QueryParams::default());

    let terms: Vec<&str> = hits.iter().map(|h| h.term.as_str()).collect();
    assert_eq!(terms, vec!["distribution", "normal", "normal~distribution"]);

    // Scores follow counts: "distribution" appears four times in the corpus,
    // "normal" and the phrase twice each.
    assert_eq!(hits[0].count, 4);
    assert!((hits[0].score - 0.04).abs() < 1e-12);
    assert_eq!(hits[1].count, 2);
    assert_eq!(hits[2].count, 2);
}

#[test]
fn query_is_order_independent() {
    let kb = stats_kb();
    assert_eq!(
        kb.query("normal distribution", &QueryParams::default()),
        kb.query("distribution normal", &QueryParams::default())
    );
}

#[test]
fn hits_carry_aggregated_metadata() {
    let kb = stats_kb();
    let hits = kb.query("poisson", &QueryParams::default());
    let hit = hits.iter().find(|h| h.term == "poisson").unwrap();

    assert_eq!(hit.categories.get("Statistics"), Some(&1));
    assert_eq!(hit.related.get("exponential distribution"), Some(&1));
    assert_eq!(hit.see_also.get("queueing theory"), Some(&1));
    assert_eq!(hit.documents.len(), 1);
}

#[test]
fn category_counts_accumulate_per_occurrence() {
    let kb = stats_kb();
    let hits = kb.query("distribution", &QueryParams::default());
    let hit = hits.iter().find(|h| h.term == "distribution").unwrap();

    // Two occurrences in the normal-distribution document, one in the
    // poisson document (both "Statistics"), one in the CLT document.
    assert_eq!(hit.categories.get("Statistics"), Some(&3));
    assert_eq!(hit.categories.get("Probability"), Some(&1));
}

#[test]
fn single_token_hit_exposes_cooccurrence_embedding() {
    let kb = stats_kb();
    let hits = kb.query("distribution", &QueryParams::default());
    let hit = hits.iter().find(|h| h.term == "distribution").unwrap();

    let embedding = hit.embedding.as_ref().unwrap();
    assert!(embedding.contains_key("normal"));
}

#[test]
fn stopwords_never_match() {
    let kb = stats_kb();
    assert!(kb.query("the of and", &QueryParams::default()).is_empty());
}

#[test]
fn unknown_vocabulary_is_empty_not_an_error() {
    let kb = stats_kb();
    assert!(kb
        .query("zeppelin xylophone", &QueryParams::default())
        .is_empty());
}

#[test]
fn oversized_query_is_capped_not_rejected() {
    let kb = stats_kb();
    let long_query = kb
        .store()
        .dictionary()
        .keys()
        .filter(|k| !k.contains('~'))
        .take(MAX_QUERY_TOKENS + 8)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    let hits = kb.query(
        &long_query,
        &QueryParams {
            max_results: usize::MAX,
            min_score: 0.0,
        },
    );
    assert!(!hits.is_empty());
}

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

#[test]
fn max_results_truncates_after_ranking() {
    let kb = stats_kb();
    let hits = kb.query(
        "normal distribution",
        &QueryParams {
            max_results: 1,
            min_score: 0.0,
        },
    );
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].term, "distribution");
}

#[test]
fn min_score_drops_weak_hits() {
    let kb = stats_kb();
    let hits = kb.query(
        "normal distribution",
        &QueryParams {
            max_results: 10,
            min_score: 0.03,
        },
    );
    let terms: Vec<&str> = hits.iter().map(|h| h.term.as_str()).collect();
    assert_eq!(terms, vec!["distribution"]);
}

// ============================================================================
// INGESTION
// ============================================================================

#[test]
fn duplicate_source_is_rejected_and_store_unchanged() {
    let mut store = LexicalStore::new(KbConfig::default());
    let doc = make_document("https://example.org/p", "probability theory");
    store.add_document(&doc).unwrap();
    let before = store.dictionary().clone();

    let err = store.add_document(&doc).unwrap_err();
    assert!(err.to_string().contains("example.org/p"));
    assert_eq!(store.dictionary(), &before);
    assert_eq!(store.num_documents(), 1);
}

#[test]
fn doc_ids_are_dense_and_insertion_ordered() {
    let mut store = LexicalStore::new(KbConfig::default());
    for doc in &stats_corpus() {
        store.add_document(doc).unwrap();
    }
    assert_eq!(store.num_documents(), 4);
    assert_eq!(store.source_id("https://example.org/normal"), Some(DocId(0)));
    assert_eq!(store.source_id("https://example.org/clt"), Some(DocId(3)));
}

#[test]
fn window_cap_bounds_phrase_length() {
    let kb = kb_from_texts(
        KbConfig {
            max_tokens_per_word: 2,
            ..KbConfig::default()
        },
        &["alpha beta gamma delta"],
    );
    for key in kb.store().dictionary().keys() {
        assert!(key.split('~').count() <= 2, "oversized phrase {}", key);
    }
}

// ============================================================================
// COMPRESSION
// ============================================================================

#[test]
fn compression_drops_variants_below_frequency_floor() {
    let kb = kb_from_texts(
        KbConfig::default(), // min_token_frequency = 2
        &["alpha beta", "alpha beta", "gamma delta"],
    );

    let compressed = kb.derived().compressed_ngrams_table();
    assert!(compressed["alpha~beta"].contains(&"alpha~beta".to_string()));
    assert!(!compressed.contains_key("delta~gamma"));

    // The uncompressed table still has everything.
    assert!(kb.derived().ngrams_table().contains_key("delta~gamma"));
}

#[test]
fn compressed_variants_sorted_by_count_then_name() {
    let kb = kb_from_texts(
        KbConfig::default(),
        &[
            "alpha beta",
            "alpha beta",
            "alpha beta",
            "beta alpha",
            "beta alpha",
        ],
    );
    assert_eq!(
        kb.derived().compressed_ngrams_table()["alpha~beta"],
        vec!["alpha~beta".to_string(), "beta~alpha".to_string()]
    );
}
