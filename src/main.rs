use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use lexkb::{load, Document, KbConfig, LexicalStore, QueryParams, SNAPSHOT_FILE};

mod cli;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            input,
            output,
            max_tokens_per_word,
            min_token_frequency,
        } => run_build(&input, &output, max_tokens_per_word, min_token_frequency),
        Commands::Query {
            index,
            text,
            max_results,
            min_score,
            json,
        } => run_query(&index, &text, max_results, min_score, json),
        Commands::Inspect { dir } => run_inspect(&dir),
    };

    if let Err(e) = result {
        eprintln!("❌ {}", e);
        process::exit(1);
    }
}

fn run_build(
    input: &str,
    output: &str,
    max_tokens_per_word: usize,
    min_token_frequency: u64,
) -> Result<(), String> {
    let raw = fs::read_to_string(input)
        .map_err(|e| format!("failed to read {}: {}", input, e))?;
    let documents: Vec<Document> =
        serde_json::from_str(&raw).map_err(|e| format!("invalid corpus JSON: {}", e))?;

    if documents.is_empty() {
        eprintln!("⚠️  no documents in {}; skipping build", input);
        return Ok(());
    }

    let config = KbConfig {
        max_tokens_per_word,
        min_token_frequency,
        data_dir: PathBuf::from(output),
    };
    let mut store = LexicalStore::new(config);
    let mut skipped = 0usize;
    for doc in &documents {
        if store.add_document(doc).is_err() {
            eprintln!("⚠️  duplicate source skipped: {}", doc.source_ref);
            skipped += 1;
        }
    }

    let kb = store.seal();
    kb.save(output)
        .map_err(|e| format!("failed to save knowledge base: {}", e))?;

    println!(
        "indexed {} documents ({} duplicates skipped), {} dictionary entries",
        kb.store().num_documents(),
        skipped,
        kb.store().dictionary().len()
    );
    println!(
        "compressed n-gram groups: {}",
        kb.derived().compressed_ngrams_table().len()
    );
    println!("saved to {}", output);
    Ok(())
}

fn run_query(
    index: &str,
    text: &str,
    max_results: usize,
    min_score: f64,
    json: bool,
) -> Result<(), String> {
    let config = KbConfig {
        data_dir: PathBuf::from(index),
        ..KbConfig::default()
    };
    let kb = load(index, config).map_err(|e| format!("failed to load {}: {}", index, e))?;

    let hits = kb.query(
        text,
        &QueryParams {
            max_results,
            min_score,
        },
    );

    if json {
        let rendered = serde_json::to_string_pretty(&hits)
            .map_err(|e| format!("failed to render results: {}", e))?;
        println!("{}", rendered);
        return Ok(());
    }

    if hits.is_empty() {
        println!("no matches");
        return Ok(());
    }
    for hit in &hits {
        println!("{:<40} score {:>8.2}  count {:>6}", hit.term, hit.score, hit.count);
        if !hit.categories.is_empty() {
            let labels: Vec<&str> = hit.categories.keys().map(String::as_str).collect();
            println!("    categories: {}", labels.join(", "));
        }
        if !hit.documents.is_empty() {
            let ids: Vec<String> = hit.documents.keys().map(u32::to_string).collect();
            println!("    documents:  {}", ids.join(", "));
        }
    }
    Ok(())
}

fn run_inspect(dir: &str) -> Result<(), String> {
    let path = PathBuf::from(dir);
    let snapshot = path.join(SNAPSHOT_FILE);
    if snapshot.exists() {
        let size = fs::metadata(&snapshot)
            .map(|m| m.len())
            .map_err(|e| format!("failed to stat snapshot: {}", e))?;
        println!("snapshot: {} ({} bytes)", snapshot.display(), size);
    } else {
        println!("snapshot: absent (text tables only)");
    }

    let kb = load(dir, KbConfig::default()).map_err(|e| format!("failed to load {}: {}", dir, e))?;
    println!("documents:                 {:>8}", kb.store().num_documents());
    println!("dictionary entries:        {:>8}", kb.store().dictionary().len());
    println!("n-gram groups:             {:>8}", kb.derived().ngrams_table().len());
    println!(
        "compressed n-gram groups:  {:>8}",
        kb.derived().compressed_ngrams_table().len()
    );
    println!("token embeddings:          {:>8}", kb.derived().embeddings().len());
    println!("phrase embeddings:         {:>8}", kb.derived().embeddings2().len());
    Ok(())
}
