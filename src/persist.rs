// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Durable storage: per-table text files plus a consolidated snapshot.
//!
//! `save` writes both representations into one directory. Each table is a
//! tab-delimited text file (one `key \t value` line per entry, structured
//! values JSON-encoded) for interoperability and debugging, and the whole
//! store is additionally written as a single binary snapshot
//! ([`crate::binary`]) for fast loading.
//!
//! `load` prefers the snapshot; when it is absent or fails validation the
//! loader falls back to the text files, skipping any that are missing and
//! warning (without aborting) on unparsable lines. Tables that cannot be
//! recovered are left at their empty defaults; a partially populated store
//! still answers queries.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::binary;
use crate::derived::{DerivedTables, SealedKb};
use crate::index::LexicalStore;
use crate::tokenize::Tokenizer;
use crate::types::{
    CountMap, DocOccurrences, DocTable, EmbeddingTable, KbConfig, LabelTable, NgramTable,
    PairCounts,
};

/// Consolidated binary snapshot (fast load path).
pub const SNAPSHOT_FILE: &str = "snapshot.lxkb";

const DICTIONARY_FILE: &str = "dictionary.txt";
const NGRAMS_FILE: &str = "ngrams_table.txt";
const COMPRESSED_NGRAMS_FILE: &str = "compressed_ngrams_table.txt";
const WORD_HASH_FILE: &str = "word_hash.txt";
const EMBEDDINGS_FILE: &str = "embeddings.txt";
const EMBEDDINGS2_FILE: &str = "embeddings2.txt";
const URL_MAP_FILE: &str = "url_map.txt";
const CATEGORY_FILE: &str = "hash_category.txt";
const RELATED_FILE: &str = "hash_related.txt";
const SEE_FILE: &str = "hash_see.txt";
const COMPRESSED_WORD2_HASH_FILE: &str = "compressed_word2_hash.txt";
const ARR_URL_FILE: &str = "arr_url.txt";
const WORD_PAIRS_FILE: &str = "word_pairs.txt";
const WORD2_PAIRS_FILE: &str = "word2_pairs.txt";
const STOPWORDS_FILE: &str = "stopwords.txt";
const UTF_MAP_FILE: &str = "utf_map.txt";

impl SealedKb {
    /// Write the full store into `dir` (created if absent): one text file
    /// per table plus the consolidated snapshot.
    pub fn save(&self, dir: impl AsRef<Path>) -> io::Result<()> {
        save(self, dir.as_ref())
    }
}

/// See [`SealedKb::save`].
pub fn save(kb: &SealedKb, dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let store = &kb.store;
    let derived = &kb.derived;

    write_count_map(&dir.join(DICTIONARY_FILE), &store.dictionary)?;
    write_ngram_table(&dir.join(NGRAMS_FILE), &derived.ngrams_table)?;
    write_ngram_table(
        &dir.join(COMPRESSED_NGRAMS_FILE),
        &derived.compressed_ngrams_table,
    )?;
    write_label_table(&dir.join(WORD_HASH_FILE), &store.word_hash)?;
    write_embedding_table(&dir.join(EMBEDDINGS_FILE), &derived.embeddings)?;
    write_embedding_table(&dir.join(EMBEDDINGS2_FILE), &derived.embeddings2)?;
    write_doc_table(&dir.join(URL_MAP_FILE), &store.url_map)?;
    write_label_table(&dir.join(CATEGORY_FILE), &store.hash_category)?;
    write_label_table(&dir.join(RELATED_FILE), &store.hash_related)?;
    write_label_table(&dir.join(SEE_FILE), &store.hash_see)?;
    write_label_table(
        &dir.join(COMPRESSED_WORD2_HASH_FILE),
        &derived.compressed_word2_hash,
    )?;

    // URL array: id \t source, in DocId order.
    let mut w = writer(&dir.join(ARR_URL_FILE))?;
    for (id, source) in store.sources.iter().enumerate() {
        writeln!(w, "{}\t{}", id, source)?;
    }
    w.flush()?;

    // Token pairs in full: resealing a text-loaded store rebuilds the PMI
    // table from these, so nothing may be dropped here.
    let mut w = writer(&dir.join(WORD_PAIRS_FILE))?;
    for ((a, b), &count) in &store.word_pairs {
        let key = serde_json::to_string(&[a, b])?;
        writeln!(w, "{}\t{}", key, count)?;
    }
    w.flush()?;

    // Phrase pairs are published filtered: both members above count 1 and
    // a positive pair count. The full table still lives in the snapshot.
    let mut w = writer(&dir.join(WORD2_PAIRS_FILE))?;
    for ((a, b), &count) in &store.word2_pairs {
        let freq_a = store.dictionary.get(a).copied().unwrap_or(0);
        let freq_b = store.dictionary.get(b).copied().unwrap_or(0);
        if freq_a > 1 && freq_b > 1 && count > 0 {
            let key = serde_json::to_string(&[a, b])?;
            writeln!(w, "{}\t{}", key, count)?;
        }
    }
    w.flush()?;

    let mut w = writer(&dir.join(STOPWORDS_FILE))?;
    for word in store.tokenizer.stopwords() {
        writeln!(w, "{}", word)?;
    }
    w.flush()?;

    let mut w = writer(&dir.join(UTF_MAP_FILE))?;
    for (from, to) in store.tokenizer.substitutions() {
        writeln!(w, "{}\t{}", from, to)?;
    }
    w.flush()?;

    fs::write(dir.join(SNAPSHOT_FILE), binary::encode_snapshot(kb))?;
    Ok(())
}

/// Restore a sealed store from `dir`.
///
/// The snapshot is tried first; a corrupt snapshot is a warning, not an
/// error. The text fallback tolerates missing files and malformed lines,
/// leaving the affected tables empty. `config` supplies the knobs the text
/// format does not carry (the snapshot carries its own).
pub fn load(dir: impl AsRef<Path>, config: KbConfig) -> io::Result<SealedKb> {
    let dir = dir.as_ref();

    let snapshot_path = dir.join(SNAPSHOT_FILE);
    if snapshot_path.exists() {
        let bytes = fs::read(&snapshot_path)?;
        match binary::decode_snapshot(&bytes, config.data_dir.clone()) {
            Ok(kb) => return Ok(kb),
            Err(e) => {
                eprintln!(
                    "⚠️  snapshot {} unusable ({}); falling back to text tables",
                    snapshot_path.display(),
                    e
                );
            }
        }
    }

    let tokenizer = load_tokenizer(dir);
    let mut store = LexicalStore::with_tokenizer(config, tokenizer);
    let mut derived = DerivedTables::default();

    if let Some(lines) = read_lines(&dir.join(DICTIONARY_FILE)) {
        store.dictionary = parse_count_map(lines, DICTIONARY_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(NGRAMS_FILE)) {
        derived.ngrams_table = parse_ngram_table(lines, NGRAMS_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(COMPRESSED_NGRAMS_FILE)) {
        derived.compressed_ngrams_table = parse_ngram_table(lines, COMPRESSED_NGRAMS_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(WORD_HASH_FILE)) {
        store.word_hash = parse_label_table(lines, WORD_HASH_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(EMBEDDINGS_FILE)) {
        derived.embeddings = parse_embedding_table(lines, EMBEDDINGS_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(EMBEDDINGS2_FILE)) {
        derived.embeddings2 = parse_embedding_table(lines, EMBEDDINGS2_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(URL_MAP_FILE)) {
        store.url_map = parse_doc_table(lines, URL_MAP_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(CATEGORY_FILE)) {
        store.hash_category = parse_label_table(lines, CATEGORY_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(RELATED_FILE)) {
        store.hash_related = parse_label_table(lines, RELATED_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(SEE_FILE)) {
        store.hash_see = parse_label_table(lines, SEE_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(COMPRESSED_WORD2_HASH_FILE)) {
        derived.compressed_word2_hash = parse_label_table(lines, COMPRESSED_WORD2_HASH_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(ARR_URL_FILE)) {
        store.sources = parse_url_array(lines, ARR_URL_FILE);
        store.source_ids = store
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
    }
    if let Some(lines) = read_lines(&dir.join(WORD_PAIRS_FILE)) {
        store.word_pairs = parse_pair_counts(lines, WORD_PAIRS_FILE);
    }
    if let Some(lines) = read_lines(&dir.join(WORD2_PAIRS_FILE)) {
        store.word2_pairs = parse_pair_counts(lines, WORD2_PAIRS_FILE);
    }

    Ok(SealedKb::new(store, derived))
}

/// Tokenizer tables have their own files; fall back to the defaults when
/// either is missing so an older layout still loads.
fn load_tokenizer(dir: &Path) -> Tokenizer {
    let stopwords_path = dir.join(STOPWORDS_FILE);
    let utf_map_path = dir.join(UTF_MAP_FILE);
    if !stopwords_path.exists() || !utf_map_path.exists() {
        return Tokenizer::default();
    }

    let stopwords: Vec<String> = read_lines(&stopwords_path)
        .map(|lines| lines.filter(|l| !l.is_empty()).collect())
        .unwrap_or_default();

    let mut substitutions = Vec::new();
    if let Some(lines) = read_lines(&utf_map_path) {
        for line in lines {
            match line.split_once('\t') {
                Some((from, to)) => substitutions.push((from.to_string(), to.to_string())),
                None if line.is_empty() => {}
                None => warn_line(UTF_MAP_FILE, &line),
            }
        }
    }
    Tokenizer::new(substitutions, stopwords)
}

// ============================================================================
// TEXT WRITERS
// ============================================================================

fn writer(path: &Path) -> io::Result<BufWriter<fs::File>> {
    Ok(BufWriter::new(fs::File::create(path)?))
}

fn write_count_map(path: &Path, map: &CountMap) -> io::Result<()> {
    let mut w = writer(path)?;
    for (key, count) in map {
        writeln!(w, "{}\t{}", key, count)?;
    }
    w.flush()
}

fn write_label_table(path: &Path, table: &LabelTable) -> io::Result<()> {
    let mut w = writer(path)?;
    for (key, counts) in table {
        writeln!(w, "{}\t{}", key, serde_json::to_string(counts)?)?;
    }
    w.flush()
}

fn write_doc_table(path: &Path, table: &DocTable) -> io::Result<()> {
    let mut w = writer(path)?;
    for (key, occurrences) in table {
        // JSON object keys are strings; doc ids are parsed back on load.
        writeln!(w, "{}\t{}", key, serde_json::to_string(occurrences)?)?;
    }
    w.flush()
}

fn write_embedding_table(path: &Path, table: &EmbeddingTable) -> io::Result<()> {
    let mut w = writer(path)?;
    for (key, vector) in table {
        writeln!(w, "{}\t{}", key, serde_json::to_string(vector)?)?;
    }
    w.flush()
}

fn write_ngram_table(path: &Path, table: &NgramTable) -> io::Result<()> {
    let mut w = writer(path)?;
    for (key, variants) in table {
        writeln!(w, "{}\t{}", key, serde_json::to_string(variants)?)?;
    }
    w.flush()
}

// ============================================================================
// TEXT PARSERS (warn-and-skip on malformed lines)
// ============================================================================

fn read_lines(path: &Path) -> Option<impl Iterator<Item = String>> {
    let file = fs::File::open(path).ok()?;
    Some(
        BufReader::new(file)
            .lines()
            .map_while(Result::ok),
    )
}

fn warn_line(file: &str, line: &str) {
    let shown: String = line.chars().take(80).collect();
    eprintln!("⚠️  {}: skipping malformed line: {}", file, shown);
}

fn split_entry<'a>(line: &'a str, file: &str) -> Option<(&'a str, &'a str)> {
    if line.is_empty() {
        return None;
    }
    match line.split_once('\t') {
        Some(entry) => Some(entry),
        None => {
            warn_line(file, line);
            None
        }
    }
}

fn parse_count_map(lines: impl Iterator<Item = String>, file: &str) -> CountMap {
    let mut map = CountMap::new();
    for line in lines {
        let Some((key, value)) = split_entry(&line, file) else {
            continue;
        };
        match value.parse::<u64>() {
            Ok(count) => {
                map.insert(key.to_string(), count);
            }
            Err(_) => warn_line(file, &line),
        }
    }
    map
}

fn parse_label_table(lines: impl Iterator<Item = String>, file: &str) -> LabelTable {
    let mut table = LabelTable::new();
    for line in lines {
        let Some((key, value)) = split_entry(&line, file) else {
            continue;
        };
        match serde_json::from_str::<CountMap>(value) {
            Ok(counts) => {
                table.insert(key.to_string(), counts);
            }
            Err(_) => warn_line(file, &line),
        }
    }
    table
}

fn parse_doc_table(lines: impl Iterator<Item = String>, file: &str) -> DocTable {
    let mut table = DocTable::new();
    for line in lines {
        let Some((key, value)) = split_entry(&line, file) else {
            continue;
        };
        let parsed: Result<BTreeMap<String, u64>, _> = serde_json::from_str(value);
        let Ok(raw) = parsed else {
            warn_line(file, &line);
            continue;
        };
        let mut occurrences = DocOccurrences::new();
        let mut ok = true;
        for (id, count) in raw {
            match id.parse::<u32>() {
                Ok(id) => {
                    occurrences.insert(id, count);
                }
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            table.insert(key.to_string(), occurrences);
        } else {
            warn_line(file, &line);
        }
    }
    table
}

fn parse_embedding_table(lines: impl Iterator<Item = String>, file: &str) -> EmbeddingTable {
    let mut table = EmbeddingTable::new();
    for line in lines {
        let Some((key, value)) = split_entry(&line, file) else {
            continue;
        };
        match serde_json::from_str::<BTreeMap<String, f64>>(value) {
            Ok(vector) => {
                table.insert(key.to_string(), vector);
            }
            Err(_) => warn_line(file, &line),
        }
    }
    table
}

fn parse_ngram_table(lines: impl Iterator<Item = String>, file: &str) -> NgramTable {
    let mut table = NgramTable::new();
    for line in lines {
        let Some((key, value)) = split_entry(&line, file) else {
            continue;
        };
        match serde_json::from_str::<Vec<String>>(value) {
            Ok(variants) => {
                table.insert(key.to_string(), variants);
            }
            Err(_) => warn_line(file, &line),
        }
    }
    table
}

fn parse_url_array(lines: impl Iterator<Item = String>, file: &str) -> Vec<String> {
    let mut sources = Vec::new();
    for line in lines {
        let Some((id, source)) = split_entry(&line, file) else {
            continue;
        };
        // Ids are positional; reject out-of-sequence lines rather than
        // silently renumbering documents.
        match id.parse::<usize>() {
            Ok(id) if id == sources.len() => sources.push(source.to_string()),
            _ => warn_line(file, &line),
        }
    }
    sources
}

fn parse_pair_counts(lines: impl Iterator<Item = String>, file: &str) -> PairCounts {
    let mut pairs = PairCounts::new();
    for line in lines {
        let Some((key, value)) = split_entry(&line, file) else {
            continue;
        };
        let parsed: Result<[String; 2], _> = serde_json::from_str(key);
        match (parsed, value.parse::<u64>()) {
            (Ok([a, b]), Ok(count)) => {
                pairs.insert((a, b), count);
            }
            _ => warn_line(file, &line),
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_document_full, store_with_documents};
    use crate::types::DocId;
    use crate::QueryParams;

    fn sample_kb() -> SealedKb {
        store_with_documents(
            KbConfig::default(),
            &[
                make_document_full(
                    "u1",
                    "Math",
                    "probability theory is used in statistics",
                    &["measure theory"],
                    &["kolmogorov"],
                ),
                make_document_full("u2", "Math", "probability theory again", &[], &[]),
            ],
        )
        .seal()
    }

    #[test]
    fn snapshot_fast_path_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let kb = sample_kb();
        kb.save(dir.path()).unwrap();

        let restored = load(dir.path(), KbConfig::default()).unwrap();
        assert_eq!(restored.store().dictionary(), kb.store().dictionary());
        assert_eq!(restored.derived(), kb.derived());
        assert_eq!(
            restored.query("probability theory", &QueryParams::default()),
            kb.query("probability theory", &QueryParams::default())
        );
    }

    #[test]
    fn text_fallback_round_trips_queries() {
        let dir = tempfile::tempdir().unwrap();
        let kb = sample_kb();
        kb.save(dir.path()).unwrap();
        fs::remove_file(dir.path().join(SNAPSHOT_FILE)).unwrap();

        let restored = load(dir.path(), KbConfig::default()).unwrap();
        assert_eq!(
            restored.query("probability theory", &QueryParams::default()),
            kb.query("probability theory", &QueryParams::default())
        );
        assert_eq!(restored.store().sources(), kb.store().sources());
        // The reverse source map is rebuilt from the URL array.
        assert_eq!(restored.store().source_id("u1"), Some(DocId(0)));
        assert_eq!(restored.store().source_id("u2"), Some(DocId(1)));
    }

    #[test]
    fn reseal_after_text_load_rebuilds_token_embeddings() {
        let dir = tempfile::tempdir().unwrap();
        let kb = sample_kb();
        kb.save(dir.path()).unwrap();
        fs::remove_file(dir.path().join(SNAPSHOT_FILE)).unwrap();

        let restored = load(dir.path(), KbConfig::default()).unwrap();
        assert_eq!(restored.store.word_pairs, kb.store.word_pairs);

        // A rebuild from the text-loaded primary tables must reproduce the
        // token-level PMI statistics, not come back empty.
        let resealed = restored.into_store().seal();
        assert_eq!(resealed.derived().embeddings(), kb.derived().embeddings());
        assert_eq!(resealed.derived().pmi_table(), kb.derived().pmi_table());
        assert!(!resealed.derived().embeddings().is_empty());
    }

    #[test]
    fn missing_tables_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kb = sample_kb();
        kb.save(dir.path()).unwrap();
        fs::remove_file(dir.path().join(SNAPSHOT_FILE)).unwrap();
        fs::remove_file(dir.path().join(EMBEDDINGS_FILE)).unwrap();
        fs::remove_file(dir.path().join(RELATED_FILE)).unwrap();

        let restored = load(dir.path(), KbConfig::default()).unwrap();
        assert!(restored.derived().embeddings().is_empty());
        // Remaining tables still answer queries.
        let hits = restored.query("probability", &QueryParams::default());
        assert!(!hits.is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let kb = sample_kb();
        kb.save(dir.path()).unwrap();
        fs::remove_file(dir.path().join(SNAPSHOT_FILE)).unwrap();

        // Prepend garbage to the dictionary file.
        let path = dir.path().join(DICTIONARY_FILE);
        let original = fs::read_to_string(&path).unwrap();
        fs::write(&path, format!("no-tab-line\nword\tNaN\n{}", original)).unwrap();

        let restored = load(dir.path(), KbConfig::default()).unwrap();
        assert_eq!(restored.store().dictionary(), kb.store().dictionary());
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let kb = sample_kb();
        kb.save(dir.path()).unwrap();

        let path = dir.path().join(SNAPSHOT_FILE);
        let mut bytes = fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let restored = load(dir.path(), KbConfig::default()).unwrap();
        assert_eq!(
            restored.query("probability", &QueryParams::default()),
            kb.query("probability", &QueryParams::default())
        );
    }

    #[test]
    fn empty_directory_loads_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let restored = load(dir.path(), KbConfig::default()).unwrap();
        assert!(restored.store().dictionary().is_empty());
        assert!(restored.query("anything", &QueryParams::default()).is_empty());
    }
}
