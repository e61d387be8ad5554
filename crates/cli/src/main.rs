//! Profesor CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write a default config file
//! - `chat`: Interactive or single-message chat
//! - `serve`: Start the HTTP gateway
//! - `models`: List chat models
//! - `status`: Show configuration and knowledge server status

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "profesor",
    about = "El Profesor — context-augmented streaming chat",
    version,
    author
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
    /// Write a default configuration file
    Onboard,

    /// Chat with El Profesor
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Wait for the full answer instead of streaming it
        #[arg(long)]
        no_stream: bool,

        /// Model to use instead of the configured default
        #[arg(long)]
        model: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List available chat models
    Models,

    /// Show configuration and knowledge server status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat {
            message,
            no_stream,
            model,
        } => commands::chat::run(message, !no_stream, model).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Models => commands::models::run().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
