//! chainbook CLI — wallet-authenticated contact book.
//!
//! Signs in against the directory service with the local keystore
//! wallet and manages the contact list from the terminal.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// chainbook — wallet-authenticated contact book.
#[derive(Parser)]
#[command(name = "chainbook", version, about)]
struct Cli {
    /// Output in JSON format (no colors, machine-readable).
    #[arg(long, global = true)]
    json: bool,

    /// Base URL of the directory service.
    #[arg(
        long,
        global = true,
        env = "CHAINBOOK_DIRECTORY_URL",
        default_value = chainbook_types::config::DEFAULT_DIRECTORY_URL
    )]
    directory_url: String,

    /// Path to the wallet keystore file (default: platform data dir).
    #[arg(long, global = true, env = "CHAINBOOK_KEYSTORE")]
    keystore: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, default_value = "10")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wallet keystore management.
    Wallet {
        #[command(subcommand)]
        action: commands::wallet::WalletAction,
    },
    /// Manage the contact list (signs in first).
    Contacts {
        #[command(subcommand)]
        action: commands::contacts::ContactsAction,
    },
    /// Show provider detection and connection state.
    Status,
    /// Resolve an address to its registered name.
    Resolve {
        /// Address to resolve (0x + 40 hex chars).
        address: String,
    },
}

// ---------------------------------------------------------------------------
// Global options passed to every command handler
// ---------------------------------------------------------------------------

/// Shared options threaded into command handlers.
pub struct GlobalOpts {
    pub json: bool,
    pub directory_url: String,
    pub keystore: PathBuf,
    pub timeout_secs: u64,
}

/// Platform-specific default keystore location.
fn default_keystore_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chainbook")
        .join("keystore.json")
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let opts = GlobalOpts {
        json: cli.json,
        directory_url: cli.directory_url,
        keystore: cli.keystore.unwrap_or_else(default_keystore_path),
        timeout_secs: cli.timeout,
    };

    let result = dispatch(&opts, cli.command).await;

    if let Err(e) = result {
        output::print_error(&e, opts.json);
        std::process::exit(1);
    }
}

async fn dispatch(opts: &GlobalOpts, cmd: Commands) -> std::result::Result<(), String> {
    match cmd {
        Commands::Wallet { action } => commands::wallet::run(action, opts).await,
        Commands::Contacts { action } => commands::contacts::run(action, opts).await,
        Commands::Status => commands::status::run(opts).await,
        Commands::Resolve { address } => commands::resolve::run(&address, opts).await,
    }
}
