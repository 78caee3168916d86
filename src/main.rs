//! # repo-help CLI
//!
//! ## Usage
//!
//! ```bash
//! repo-help --config ./config/repo-help.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repo-help init` | Create the store (SQLite schema or Chroma collection) |
//! | `repo-help ingest <owner/project>` | Index new files of a repository |
//! | `repo-help query <owner/project>` | Retrieve chunks for an issue without ingesting |
//! | `repo-help analyze <owner/project>` | Ingest, then retrieve |
//! | `repo-help list` | Page through stored entries |
//! | `repo-help serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! repo-help ingest acme/widgets --limit 25
//! repo-help query acme/widgets --title "Login fails" --body "500 after submit"
//! RUST_LOG=debug repo-help serve
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use repo_help::{commands, config, logging, server};

/// repo-help: index a repository's source files and find the code an
/// issue is about.
#[derive(Parser)]
#[command(
    name = "repo-help",
    about = "Index repository source files and retrieve the code relevant to an issue",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the file does not exist the built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/repo-help.toml")]
    config: PathBuf,

    /// Debug logging for repo-help itself (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configured store.
    ///
    /// Idempotent: running it against an existing store changes nothing.
    Init,

    /// Index files of a repository that are not indexed yet.
    Ingest {
        /// Repository as `owner/project`.
        repo: String,

        /// Only consider the first N listed files.
        #[arg(long)]
        limit: Option<usize>,

        /// Override `[ingest].concurrency`.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Retrieve the chunks closest to an issue.
    Query {
        /// Repository as `owner/project`.
        repo: String,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "")]
        body: String,
    },

    /// Ingest up to `[ingest].max_files` files, then query.
    Analyze {
        /// Repository as `owner/project`.
        repo: String,

        #[arg(long, default_value = "")]
        title: String,

        #[arg(long, default_value = "")]
        body: String,
    },

    /// List stored entries.
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Start the HTTP server.
    Serve,
}

fn load(path: &Path) -> Result<config::Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        config::parse_config("")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Ingest {
            repo,
            limit,
            concurrency,
        } => {
            commands::run_ingest(&cfg, &repo, limit, concurrency).await?;
        }
        Commands::Query { repo, title, body } => {
            commands::run_query(&cfg, &repo, &title, &body).await?;
        }
        Commands::Analyze { repo, title, body } => {
            commands::run_analyze(&cfg, &repo, &title, &body).await?;
        }
        Commands::List { page, limit } => {
            commands::run_list(&cfg, page, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
