//! Chofesh CLI binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chofesh::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("CHOFESH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Ask(args) => chofesh::cli::handle_ask(args).await,
        Commands::Chat(args) => chofesh::cli::handle_chat(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
