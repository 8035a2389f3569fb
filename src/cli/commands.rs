//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "threadrag")]
#[command(about = "ThreadRAG: answer questions over crawled posts and comment threads")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML configuration file (default: ./config.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// The question to ask
        question: String,
    },
    /// Interactive question loop (type `exit` or `quit` to leave)
    Chat,
    /// Rank documents for a query without calling the generation model
    Search {
        /// The search query
        query: String,
        /// Number of documents to return (default: retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (default: server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (default: server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Load crawled posts and comments (JSON Lines) into the document store
    Ingest {
        /// Posts export, one JSON object per line
        #[arg(long)]
        posts: Option<PathBuf>,
        /// Comments export, one JSON object per line
        #[arg(long)]
        comments: Option<PathBuf>,
    },
    /// Embed every stored document that has no vector yet
    Embed {
        /// Number of texts sent to the encoder per request
        #[arg(short, long, default_value = "16")]
        batch_size: usize,
    },
    /// Show current configuration (secrets masked)
    Config,
    /// Check store connectivity and embedding progress
    Status,
}
