use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lexkb",
    about = "Hash-indexed lexical knowledge base builder and query tool",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a JSON document corpus and build the knowledge base
    Build {
        /// Input JSON file: an array of document records
        #[arg(short, long)]
        input: String,

        /// Output directory for the table files and snapshot
        #[arg(short, long)]
        output: String,

        /// Maximum tokens per indexed phrase
        #[arg(long, default_value_t = 4)]
        max_tokens_per_word: usize,

        /// Minimum dictionary count for compressed tables
        #[arg(long, default_value_t = 2)]
        min_token_frequency: u64,
    },

    /// Query a saved knowledge base
    Query {
        /// Knowledge base directory
        #[arg(short, long)]
        index: String,

        /// Free-text query
        text: String,

        #[arg(long, default_value_t = 10)]
        max_results: usize,

        #[arg(long, default_value_t = 0.0)]
        min_score: f64,

        /// Emit results as JSON instead of a readable listing
        #[arg(long)]
        json: bool,
    },

    /// Show table cardinalities and snapshot details for a knowledge base
    Inspect {
        /// Knowledge base directory
        dir: String,
    },
}
