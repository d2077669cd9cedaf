//! Benchmarks for the ingest → seal → query pipeline.
//!
//! Simulates realistic knowledge-base sizes:
//! - small:  ~50 documents, ~100 words each  (single crawl batch)
//! - medium: ~500 documents, ~200 words each (topic-focused corpus)
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lexkb::{Document, KbConfig, LexicalStore, QueryParams, SealedKb};

// ============================================================================
// CORPUS SIMULATION
// ============================================================================

/// Corpus size configurations.
struct CorpusSize {
    name: &'static str,
    documents: usize,
    words_per_document: usize,
}

const CORPUS_SIZES: &[CorpusSize] = &[
    CorpusSize {
        name: "small",
        documents: 50,
        words_per_document: 100,
    },
    CorpusSize {
        name: "medium",
        documents: 500,
        words_per_document: 200,
    },
];

/// Vocabulary for synthetic documents. Small enough that phrases repeat,
/// which is what exercises the n-gram and compression paths.
const VOCABULARY: &[&str] = &[
    "probability",
    "distribution",
    "normal",
    "poisson",
    "binomial",
    "variance",
    "covariance",
    "regression",
    "estimator",
    "likelihood",
    "bayesian",
    "posterior",
    "prior",
    "sampling",
    "markov",
    "chain",
    "process",
    "stationary",
    "ergodic",
    "entropy",
    "divergence",
    "gradient",
    "convergence",
    "theorem",
    "hypothesis",
    "statistic",
    "quantile",
    "median",
    "kernel",
    "density",
];

/// Deterministic xorshift so runs are comparable.
fn generate_corpus(size: &CorpusSize) -> Vec<Document> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    (0..size.documents)
        .map(|i| {
            let content = (0..size.words_per_document)
                .map(|_| VOCABULARY[(next() % VOCABULARY.len() as u64) as usize])
                .collect::<Vec<_>>()
                .join(" ");
            Document {
                source_ref: format!("https://example.org/doc/{}", i),
                category: if i % 2 == 0 { "Statistics" } else { "Probability" }.to_string(),
                content,
                related: vec![],
                see_also: vec![],
            }
        })
        .collect()
}

fn build_kb(size: &CorpusSize) -> SealedKb {
    let mut store = LexicalStore::new(KbConfig::default());
    for doc in generate_corpus(size) {
        store.add_document(&doc).unwrap();
    }
    store.seal()
}

// ============================================================================
// BENCHMARKS
// ============================================================================

fn bench_ingest_and_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_and_seal");
    for size in CORPUS_SIZES {
        let corpus = generate_corpus(size);
        group.throughput(Throughput::Elements(size.documents as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size.name), &corpus, |b, corpus| {
            b.iter(|| {
                let mut store = LexicalStore::new(KbConfig::default());
                for doc in corpus {
                    store.add_document(doc).unwrap();
                }
                black_box(store.seal())
            });
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let queries: &[(&str, &str)] = &[
        ("single_token", "probability"),
        ("two_tokens", "normal distribution"),
        ("four_tokens", "bayesian posterior sampling markov"),
    ];

    for size in CORPUS_SIZES {
        let kb = build_kb(size);
        let params = QueryParams::default();
        for (label, text) in queries {
            group.bench_with_input(
                BenchmarkId::new(*label, size.name),
                text,
                |b, text| {
                    b.iter(|| black_box(kb.query(text, &params)));
                },
            );
        }
    }
    group.finish();
}

fn bench_snapshot_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    for size in CORPUS_SIZES {
        let kb = build_kb(size);
        let bytes = lexkb::binary::encode_snapshot(&kb);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", size.name), &kb, |b, kb| {
            b.iter(|| black_box(lexkb::binary::encode_snapshot(kb)));
        });
        group.bench_with_input(BenchmarkId::new("decode", size.name), &bytes, |b, bytes| {
            b.iter(|| {
                black_box(
                    lexkb::binary::decode_snapshot(bytes, KbConfig::default().data_dir).unwrap(),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_ingest_and_seal,
    bench_query,
    bench_snapshot_round_trip
);
criterion_main!(benches);
