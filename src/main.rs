//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and schema |
//! | `docqa ingest <paths...>` | Extract and ingest files or directories |
//! | `docqa ingest --text "..."` | Ingest a piece of text directly |
//! | `docqa ask "<question>"` | Answer a question from the knowledge base |
//! | `docqa chat` | Interactive question loop |
//! | `docqa reset` | Clear the knowledge base |
//! | `docqa stats` | Show document and unit counts |
//! | `docqa serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! docqa init
//! docqa ingest ./handbook ./policies/leave.pdf
//! docqa ask "Where is the fire exit?"
//! docqa ask "Where is the fire exit?" --k 3 --json | jq .answer
//! DOCQA_LOG=debug docqa serve
//! ```

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docqa::{ask, config, ingest, logging, server, stats};

/// docqa: ask questions of your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without it, `./config/docqa.toml` is used when present and
/// built-in defaults otherwise.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Ask questions of your documents with attributed, confidence-scored answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema at `[storage].path`.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Add documents to the knowledge base.
    ///
    /// Files are ingested as given. Directories are walked recursively and
    /// filtered by `[ingest].include_globs`. Supports .txt, .md, .pdf, and .docx.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required_unless_present = "text")]
        paths: Vec<PathBuf>,

        /// Ingest this text instead of files.
        #[arg(long, conflicts_with = "paths")]
        text: Option<String>,

        /// Document id for `--text` (default: `manual`).
        #[arg(long, requires = "text")]
        id: Option<String>,
    },

    /// Answer a question.
    Ask {
        question: String,

        /// Number of candidate passages to retrieve.
        #[arg(long)]
        k: Option<usize>,

        /// Skip the answer composer and return the best passage.
        #[arg(long)]
        no_compose: bool,

        /// Print the JSON response instead of formatted text.
        #[arg(long)]
        json: bool,
    },

    /// Ask questions interactively. Reads one question per line from stdin.
    Chat {
        #[arg(long)]
        k: Option<usize>,
    },

    /// Remove every document from the knowledge base.
    Reset,

    /// Show knowledge base statistics.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();
    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => stats::run_init(&cfg).await?,
        Commands::Ingest { paths, text, id } => match text {
            Some(text) => ingest::run_ingest_text(&cfg, &text, id.as_deref()).await?,
            None => {
                if paths.is_empty() {
                    bail!("nothing to ingest: pass paths or --text");
                }
                ingest::run_ingest(&cfg, &paths).await?
            }
        },
        Commands::Ask {
            question,
            k,
            no_compose,
            json,
        } => {
            if k == Some(0) {
                bail!("--k must be >= 1");
            }
            ask::run_ask(&cfg, &question, k, no_compose, json).await?
        }
        Commands::Chat { k } => ask::run_chat(&cfg, k).await?,
        Commands::Reset => stats::run_reset(&cfg).await?,
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
