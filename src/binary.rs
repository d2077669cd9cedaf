// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Consolidated binary snapshot of the entire knowledge base.
//!
//! One file restores every primary and derived table atomically: the fast
//! path for [`crate::persist::load`]. The per-table text files remain the
//! interoperable/debuggable representation; this format exists so a large
//! store loads with a single read and a checksum.
//!
//! # Security Considerations
//!
//! The decoder is written to be safe on untrusted input:
//! - all declared counts and lengths are validated against MAX_* constants
//! - bounds checking prevents buffer overreads
//! - the CRC32 footer detects corruption and truncation
//! - the varint decoder has a maximum iteration limit
//!
//! # Format Overview (v1)
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ HEADER (28 bytes)                                          │
//! │   magic: [u8; 4] = "LXKB"                                  │
//! │   version: u8 = 1                                          │
//! │   flags: u8 (reserved)                                     │
//! │   reserved: [u8; 2]                                        │
//! │   doc_count: u32                                           │
//! │   term_count: u32                                          │
//! │   max_tokens_per_word: u32                                 │
//! │   min_token_frequency: u64                                 │
//! ├────────────────────────────────────────────────────────────┤
//! │ SECTIONS (fixed order, varint counts, length-prefixed      │
//! │ UTF-8 strings, little-endian f64 scores)                   │
//! │   sources, substitutions, stopwords,                       │
//! │   dictionary, url_map,                                     │
//! │   hash_category, hash_related, hash_see,                   │
//! │   word_pairs, word_hash, word2_pairs, word2_hash,          │
//! │   pmi_table, pmi_table2, embeddings, embeddings2,          │
//! │   ngrams_table, compressed_ngrams_table,                   │
//! │   compressed_word2_hash                                    │
//! ├────────────────────────────────────────────────────────────┤
//! │ FOOTER (8 bytes)                                           │
//! │   crc32: u32 (over header + all sections)                  │
//! │   magic: [u8; 4] = "BKXL" (reversed, marks valid end)      │
//! └────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::io;

use crc32fast::Hasher as Crc32Hasher;

use crate::derived::{DerivedTables, SealedKb};
use crate::index::LexicalStore;
use crate::tokenize::Tokenizer;
use crate::types::{
    CountMap, DocOccurrences, DocTable, EmbeddingTable, KbConfig, LabelTable, NgramTable,
    PairCounts, PairScores,
};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Magic bytes: "LXKB" (header)
pub const MAGIC: [u8; 4] = *b"LXKB";

/// Footer magic: "BKXL" (reversed, marks valid file end)
pub const FOOTER_MAGIC: [u8; 4] = *b"BKXL";

/// Current format version
pub const VERSION: u8 = 1;

// ============================================================================
// SECURITY LIMITS (prevent resource exhaustion from malicious input)
// ============================================================================

/// Maximum snapshot size: 512 MB
pub const MAX_FILE_SIZE: usize = 512 * 1024 * 1024;

/// Maximum entries in any one table
pub const MAX_ENTRY_COUNT: u64 = 50_000_000;

/// Maximum byte length of any one string
pub const MAX_STRING_LEN: u64 = 1 << 20;

/// Maximum varint bytes (u64 needs at most 10 bytes)
pub const MAX_VARINT_BYTES: usize = 10;

// ============================================================================
// HEADER
// ============================================================================

/// Binary format header (28 bytes fixed size, v1)
#[derive(Debug, Clone)]
pub struct SnapshotHeader {
    pub version: u8,
    pub doc_count: u32,
    pub term_count: u32,
    pub max_tokens_per_word: u32,
    pub min_token_frequency: u64,
}

impl SnapshotHeader {
    // 4 (magic) + 1 (version) + 1 (flags) + 2 (reserved) + 3*4 + 8 = 28
    pub const SIZE: usize = 28;

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&MAGIC);
        buf.push(self.version);
        buf.push(0); // flags (reserved)
        buf.extend_from_slice(&[0u8; 2]); // reserved
        buf.extend_from_slice(&self.doc_count.to_le_bytes());
        buf.extend_from_slice(&self.term_count.to_le_bytes());
        buf.extend_from_slice(&self.max_tokens_per_word.to_le_bytes());
        buf.extend_from_slice(&self.min_token_frequency.to_le_bytes());
    }

    pub fn read(r: &mut Reader<'_>) -> io::Result<Self> {
        let magic = r.take(4)?;
        if magic != MAGIC {
            return Err(invalid_data(format!(
                "invalid magic: expected LXKB, got {:?}",
                magic
            )));
        }
        let version = r.take(1)?[0];
        if version != VERSION {
            return Err(invalid_data(format!(
                "unsupported snapshot version: {}",
                version
            )));
        }
        r.take(3)?; // flags + reserved
        let doc_count = r.read_u32()?;
        let term_count = r.read_u32()?;
        let max_tokens_per_word = r.read_u32()?;
        let min_token_frequency = r.read_u64()?;
        Ok(SnapshotHeader {
            version,
            doc_count,
            term_count,
            max_tokens_per_word,
            min_token_frequency,
        })
    }
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encode the complete sealed store. Output is deterministic: all tables are
/// key-ordered maps and sections are written in a fixed order.
pub fn encode_snapshot(kb: &SealedKb) -> Vec<u8> {
    let store = &kb.store;
    let derived = &kb.derived;
    let mut buf = Vec::new();

    SnapshotHeader {
        version: VERSION,
        doc_count: store.sources.len() as u32,
        term_count: store.dictionary.len() as u32,
        max_tokens_per_word: store.config.max_tokens_per_word as u32,
        min_token_frequency: store.config.min_token_frequency,
    }
    .write(&mut buf);

    write_string_list(&mut buf, &store.sources);
    write_varint(&mut buf, store.tokenizer.substitutions().len() as u64);
    for (from, to) in store.tokenizer.substitutions() {
        write_str(&mut buf, from);
        write_str(&mut buf, to);
    }
    write_varint(&mut buf, store.tokenizer.stopwords().len() as u64);
    for word in store.tokenizer.stopwords() {
        write_str(&mut buf, word);
    }

    write_count_map(&mut buf, &store.dictionary);
    write_doc_table(&mut buf, &store.url_map);
    write_label_table(&mut buf, &store.hash_category);
    write_label_table(&mut buf, &store.hash_related);
    write_label_table(&mut buf, &store.hash_see);
    write_pair_counts(&mut buf, &store.word_pairs);
    write_label_table(&mut buf, &store.word_hash);
    write_pair_counts(&mut buf, &store.word2_pairs);
    write_label_table(&mut buf, &store.word2_hash);

    write_pair_scores(&mut buf, &derived.pmi_table);
    write_pair_scores(&mut buf, &derived.pmi_table2);
    write_embedding_table(&mut buf, &derived.embeddings);
    write_embedding_table(&mut buf, &derived.embeddings2);
    write_ngram_table(&mut buf, &derived.ngrams_table);
    write_ngram_table(&mut buf, &derived.compressed_ngrams_table);
    write_label_table(&mut buf, &derived.compressed_word2_hash);

    let mut hasher = Crc32Hasher::new();
    hasher.update(&buf);
    let crc = hasher.finalize();
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&FOOTER_MAGIC);
    buf
}

/// Decode a snapshot produced by [`encode_snapshot`], restoring the sealed
/// store wholesale. `data_dir` is caller context, not part of the format.
pub fn decode_snapshot(bytes: &[u8], data_dir: std::path::PathBuf) -> io::Result<SealedKb> {
    if bytes.len() > MAX_FILE_SIZE {
        return Err(invalid_data(format!(
            "snapshot exceeds size limit: {} bytes",
            bytes.len()
        )));
    }
    if bytes.len() < SnapshotHeader::SIZE + 8 {
        return Err(invalid_data("snapshot truncated".to_string()));
    }

    // Validate the footer before touching the body.
    let body_len = bytes.len() - 8;
    let (body, footer) = bytes.split_at(body_len);
    if footer[4..] != FOOTER_MAGIC {
        return Err(invalid_data("missing footer magic".to_string()));
    }
    let stored_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let mut hasher = Crc32Hasher::new();
    hasher.update(body);
    let actual_crc = hasher.finalize();
    if stored_crc != actual_crc {
        return Err(invalid_data(format!(
            "CRC mismatch: stored {:#010x}, computed {:#010x}",
            stored_crc, actual_crc
        )));
    }

    let mut r = Reader::new(body);
    let header = SnapshotHeader::read(&mut r)?;

    let sources = read_string_list(&mut r)?;
    let sub_count = r.read_count()?;
    let mut substitutions = Vec::with_capacity(sub_count as usize);
    for _ in 0..sub_count {
        let from = read_str(&mut r)?;
        let to = read_str(&mut r)?;
        substitutions.push((from, to));
    }
    let stop_count = r.read_count()?;
    let mut stopwords = Vec::with_capacity(stop_count as usize);
    for _ in 0..stop_count {
        stopwords.push(read_str(&mut r)?);
    }

    let dictionary = read_count_map(&mut r)?;
    let url_map = read_doc_table(&mut r)?;
    let hash_category = read_label_table(&mut r)?;
    let hash_related = read_label_table(&mut r)?;
    let hash_see = read_label_table(&mut r)?;
    let word_pairs = read_pair_counts(&mut r)?;
    let word_hash = read_label_table(&mut r)?;
    let word2_pairs = read_pair_counts(&mut r)?;
    let word2_hash = read_label_table(&mut r)?;

    let pmi_table = read_pair_scores(&mut r)?;
    let pmi_table2 = read_pair_scores(&mut r)?;
    let embeddings = read_embedding_table(&mut r)?;
    let embeddings2 = read_embedding_table(&mut r)?;
    let ngrams_table = read_ngram_table(&mut r)?;
    let compressed_ngrams_table = read_ngram_table(&mut r)?;
    let compressed_word2_hash = read_label_table(&mut r)?;

    if !r.is_empty() {
        return Err(invalid_data(format!(
            "{} trailing bytes after last section",
            r.remaining()
        )));
    }
    if sources.len() != header.doc_count as usize {
        return Err(invalid_data(format!(
            "header declares {} documents, body has {}",
            header.doc_count,
            sources.len()
        )));
    }
    if dictionary.len() != header.term_count as usize {
        return Err(invalid_data(format!(
            "header declares {} terms, body has {}",
            header.term_count,
            dictionary.len()
        )));
    }

    // The reverse source map is derived state, not a section of its own.
    let source_ids = sources
        .iter()
        .enumerate()
        .map(|(i, s)| (s.clone(), i as u32))
        .collect();

    let store = LexicalStore {
        config: KbConfig {
            max_tokens_per_word: header.max_tokens_per_word as usize,
            min_token_frequency: header.min_token_frequency,
            data_dir,
        },
        tokenizer: Tokenizer::new(substitutions, stopwords),
        dictionary,
        sources,
        source_ids,
        url_map,
        hash_category,
        hash_related,
        hash_see,
        word_pairs,
        word_hash,
        word2_pairs,
        word2_hash,
    };
    let derived = DerivedTables {
        pmi_table,
        pmi_table2,
        embeddings,
        embeddings2,
        ngrams_table,
        compressed_ngrams_table,
        compressed_word2_hash,
    };
    Ok(SealedKb::new(store, derived))
}

// ============================================================================
// PRIMITIVE WRITERS
// ============================================================================

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn write_f64(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_string_list(buf: &mut Vec<u8>, list: &[String]) {
    write_varint(buf, list.len() as u64);
    for s in list {
        write_str(buf, s);
    }
}

fn write_count_map(buf: &mut Vec<u8>, map: &CountMap) {
    write_varint(buf, map.len() as u64);
    for (key, &count) in map {
        write_str(buf, key);
        write_varint(buf, count);
    }
}

fn write_doc_table(buf: &mut Vec<u8>, table: &DocTable) {
    write_varint(buf, table.len() as u64);
    for (key, occurrences) in table {
        write_str(buf, key);
        write_varint(buf, occurrences.len() as u64);
        for (&doc_id, &count) in occurrences {
            write_varint(buf, u64::from(doc_id));
            write_varint(buf, count);
        }
    }
}

fn write_label_table(buf: &mut Vec<u8>, table: &LabelTable) {
    write_varint(buf, table.len() as u64);
    for (key, counts) in table {
        write_str(buf, key);
        write_count_map(buf, counts);
    }
}

fn write_pair_counts(buf: &mut Vec<u8>, pairs: &PairCounts) {
    write_varint(buf, pairs.len() as u64);
    for ((a, b), &count) in pairs {
        write_str(buf, a);
        write_str(buf, b);
        write_varint(buf, count);
    }
}

fn write_pair_scores(buf: &mut Vec<u8>, pairs: &PairScores) {
    write_varint(buf, pairs.len() as u64);
    for ((a, b), &score) in pairs {
        write_str(buf, a);
        write_str(buf, b);
        write_f64(buf, score);
    }
}

fn write_embedding_table(buf: &mut Vec<u8>, table: &EmbeddingTable) {
    write_varint(buf, table.len() as u64);
    for (key, vector) in table {
        write_str(buf, key);
        write_varint(buf, vector.len() as u64);
        for (neighbor, &score) in vector {
            write_str(buf, neighbor);
            write_f64(buf, score);
        }
    }
}

fn write_ngram_table(buf: &mut Vec<u8>, table: &NgramTable) {
    write_varint(buf, table.len() as u64);
    for (key, variants) in table {
        write_str(buf, key);
        write_string_list(buf, variants);
    }
}

// ============================================================================
// READER
// ============================================================================

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Bounds-checked cursor over the snapshot body.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> io::Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("need {} bytes, {} remain", n, self.remaining()),
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u32(&mut self) -> io::Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> io::Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_varint(&mut self) -> io::Result<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        for _ in 0..MAX_VARINT_BYTES {
            let byte = self.take(1)?[0];
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        Err(invalid_data("varint exceeds maximum length".to_string()))
    }

    /// Read a varint validated as a table entry count.
    fn read_count(&mut self) -> io::Result<u64> {
        let count = self.read_varint()?;
        if count > MAX_ENTRY_COUNT {
            return Err(invalid_data(format!(
                "declared entry count {} exceeds limit",
                count
            )));
        }
        Ok(count)
    }
}

fn read_str(r: &mut Reader<'_>) -> io::Result<String> {
    let len = r.read_varint()?;
    if len > MAX_STRING_LEN {
        return Err(invalid_data(format!(
            "declared string length {} exceeds limit",
            len
        )));
    }
    let bytes = r.take(len as usize)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| invalid_data(format!("invalid UTF-8: {}", e)))
}

fn read_f64(r: &mut Reader<'_>) -> io::Result<f64> {
    let b = r.take(8)?;
    Ok(f64::from_le_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ]))
}

fn read_string_list(r: &mut Reader<'_>) -> io::Result<Vec<String>> {
    let count = r.read_count()?;
    let mut list = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        list.push(read_str(r)?);
    }
    Ok(list)
}

fn read_count_map(r: &mut Reader<'_>) -> io::Result<CountMap> {
    let count = r.read_count()?;
    let mut map = CountMap::new();
    for _ in 0..count {
        let key = read_str(r)?;
        let value = r.read_varint()?;
        map.insert(key, value);
    }
    Ok(map)
}

fn read_doc_table(r: &mut Reader<'_>) -> io::Result<DocTable> {
    let count = r.read_count()?;
    let mut table = DocTable::new();
    for _ in 0..count {
        let key = read_str(r)?;
        let entries = r.read_count()?;
        let mut occurrences = DocOccurrences::new();
        for _ in 0..entries {
            let doc_id = r.read_varint()?;
            let doc_id = u32::try_from(doc_id)
                .map_err(|_| invalid_data(format!("doc id {} out of range", doc_id)))?;
            let value = r.read_varint()?;
            occurrences.insert(doc_id, value);
        }
        table.insert(key, occurrences);
    }
    Ok(table)
}

fn read_label_table(r: &mut Reader<'_>) -> io::Result<LabelTable> {
    let count = r.read_count()?;
    let mut table = LabelTable::new();
    for _ in 0..count {
        let key = read_str(r)?;
        let counts = read_count_map(r)?;
        table.insert(key, counts);
    }
    Ok(table)
}

fn read_pair_counts(r: &mut Reader<'_>) -> io::Result<PairCounts> {
    let count = r.read_count()?;
    let mut pairs = PairCounts::new();
    for _ in 0..count {
        let a = read_str(r)?;
        let b = read_str(r)?;
        let value = r.read_varint()?;
        pairs.insert((a, b), value);
    }
    Ok(pairs)
}

fn read_pair_scores(r: &mut Reader<'_>) -> io::Result<PairScores> {
    let count = r.read_count()?;
    let mut pairs = PairScores::new();
    for _ in 0..count {
        let a = read_str(r)?;
        let b = read_str(r)?;
        let score = read_f64(r)?;
        pairs.insert((a, b), score);
    }
    Ok(pairs)
}

fn read_embedding_table(r: &mut Reader<'_>) -> io::Result<EmbeddingTable> {
    let count = r.read_count()?;
    let mut table = EmbeddingTable::new();
    for _ in 0..count {
        let key = read_str(r)?;
        let entries = r.read_count()?;
        let mut vector = BTreeMap::new();
        for _ in 0..entries {
            let neighbor = read_str(r)?;
            let score = read_f64(r)?;
            vector.insert(neighbor, score);
        }
        table.insert(key, vector);
    }
    Ok(table)
}

fn read_ngram_table(r: &mut Reader<'_>) -> io::Result<NgramTable> {
    let count = r.read_count()?;
    let mut table = NgramTable::new();
    for _ in 0..count {
        let key = read_str(r)?;
        let variants = read_string_list(r)?;
        table.insert(key, variants);
    }
    Ok(table)
}
