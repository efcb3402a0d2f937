//! ragctx CLI, the main entry point.
//!
//! Commands:
//! - `chunk`   : Split a text file into token-bounded chunks
//! - `ingest`  : Chunk, embed and store a document under a domain
//! - `context` : Assemble the bounded prompt context for a message
//! - `config`  : Show, validate or locate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ragctx",
    about = "ragctx: bounded prompt context assembly for retrieval-augmented chat",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.ragctx/config.toml)
    #[arg(short, long, global = true, env = "RAGCTX_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a text file into token-bounded chunks
    Chunk {
        file: PathBuf,

        /// Override chunking.chunk_size_tokens
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override chunking.overlap_tokens
        #[arg(long)]
        overlap: Option<usize>,

        /// Print chunks as JSON
        #[arg(long)]
        json: bool,
    },

    /// Chunk, embed and store a document
    Ingest {
        file: PathBuf,

        /// Base domain to file the document under
        #[arg(short, long)]
        domain: String,

        /// Document id (default: the file stem)
        #[arg(long)]
        id: Option<String>,
    },

    /// Assemble the bounded context for a user message and print it as JSON
    Context {
        /// Base domain, or the general domain name to search all of them
        #[arg(short, long)]
        domain: String,

        /// The user message
        #[arg(short, long)]
        message: String,

        /// JSON file holding prior turns: [{"role": "user", "content": "..."}]
        #[arg(long)]
        history: Option<PathBuf>,

        /// Override the configured domain prompt
        #[arg(long, default_value = "")]
        system_prompt: String,

        /// Restrict retrieval to these document ids (repeatable)
        #[arg(long = "file-id")]
        file_ids: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration
    Validate,
    /// Print the default config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Chunk {
            file,
            chunk_size,
            overlap,
            json,
        } => commands::chunk::run(config_path, &file, chunk_size, overlap, json).await?,
        Commands::Ingest { file, domain, id } => {
            commands::ingest::run(config_path, &file, &domain, id).await?
        }
        Commands::Context {
            domain,
            message,
            history,
            system_prompt,
            file_ids,
        } => {
            commands::context::run(
                config_path,
                commands::context::Args {
                    domain,
                    message,
                    history,
                    system_prompt,
                    file_ids,
                },
            )
            .await?
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}
