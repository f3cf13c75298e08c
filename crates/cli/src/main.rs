//! Docent CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the chat API server
//! - `generate` — Build the vector index from the data directory
//! - `chat`     — Talk to a running server from the terminal

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docent",
    about = "Docent — chat with your documents over a local index",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose log output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Build the vector index from the documents in the data directory
    Generate,

    /// Chat with a running server
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the -v flag when both are set
    let fallback = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Generate => commands::generate::run().await?,
        Commands::Chat { message } => commands::chat::run(message).await?,
    }

    Ok(())
}
