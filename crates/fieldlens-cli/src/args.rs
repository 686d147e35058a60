use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "fieldlens",
    about = "Classify the semantic types of fields in tabular and document datasets",
    version,
    after_help = "Examples:\n  fieldlens scan data.csv\n  fieldlens scan users.jsonl orders.jsonl --format full\n  fieldlens scan data.csv --contexts pii --langs en,ru -o report.json\n  fieldlens scan data.csv --mode hybrid --registry datatypes_latest.jsonl\n  fieldlens rules --rulepath rules\n  fieldlens index --registry datatypes_latest.jsonl --index .fieldlens/index.json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to fieldlens.toml (default: ./fieldlens.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan data files and classify every column
    Scan(ScanArgs),

    /// Load the rule set and print its statistics
    Rules(RulesArgs),

    /// Build (or rebuild) the LLM vector index from a registry
    Index(IndexArgs),
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Input files (csv, tsv, jsonl, ndjson, json)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Rule paths, comma separated (overrides fieldlens.toml)
    #[arg(long, value_delimiter = ',')]
    pub rules: Vec<String>,

    /// Limit of records per file
    #[arg(short = 'n', long, default_value = "1000")]
    pub limit: usize,

    /// Contexts to use, comma separated
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub contexts: Vec<String>,

    /// Languages to use, comma separated
    #[arg(short = 'l', long, value_delimiter = ',')]
    pub langs: Vec<String>,

    /// Data-rule confidence threshold (percent)
    #[arg(long, default_value = "5.0")]
    pub confidence: f64,

    /// Dictionary share threshold (percent)
    #[arg(long)]
    pub dict_share: Option<f64>,

    /// Keep rules flagged imprecise
    #[arg(long)]
    pub keep_imprecise: bool,

    /// Skip the date-grammar fallback
    #[arg(long)]
    pub no_dates: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "short")]
    pub format: ScanFormat,

    /// Write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Classification mode
    #[arg(long, value_enum, default_value = "rules")]
    pub mode: ModeArg,

    /// Semantic-type registry (JSONL) for hybrid/llm modes
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// LLM provider preset (openai, openrouter, perplexity, ollama, lmstudio)
    #[arg(long)]
    pub provider: Option<String>,

    /// LLM model override
    #[arg(long)]
    pub model: Option<String>,

    /// Country filter for LLM retrieval
    #[arg(long)]
    pub country: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RulesArgs {
    /// Rule paths, comma separated (overrides fieldlens.toml)
    #[arg(long, value_delimiter = ',')]
    pub rulepath: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Semantic-type registry (JSONL)
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Where to write the vector index
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Embedding endpoint base URL (OpenAI-compatible)
    #[arg(long)]
    pub embedding_base_url: Option<String>,

    /// Embedding model
    #[arg(long)]
    pub embedding_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanFormat {
    /// Table of matched columns only
    Short,
    /// Table of every column
    Full,
    /// Canonical JSON report on stdout
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Rules,
    Hybrid,
    Llm,
}
