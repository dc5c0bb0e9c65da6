//! codehelper CLI: the main entry point.
//!
//! Commands:
//! - `chat`     : interactive or single-message chat, streamed to stdout
//! - `gateway`  : start the HTTP/SSE server
//! - `ingest`   : index the document directory and report chunk counts
//! - `tools`    : list local and MCP tools

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "codehelper",
    about = "codehelper: a programming learning assistant",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Session to continue
        #[arg(short, long, default_value = "cli")]
        session: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Index the knowledge-base documents
    Ingest {
        /// Override the configured document directory
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List available tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { session, message } => commands::chat::run(session, message).await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Ingest { dir } => commands::ingest::run(dir).await?,
        Commands::Tools => commands::tools::run().await?,
    }

    Ok(())
}
