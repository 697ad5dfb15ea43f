//! Ankr Wallet CLI
//!
//! Key management and coin transfers for the Ankr chain.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ankr_wallet::config::{default_home, HOME_ENV};

mod commands;

use commands::{print_error, sendcoins::SendArgs, Context};

#[derive(Parser)]
#[command(name = "ankr-wallet")]
#[command(about = "Ankr wallet - manage keys and send ANKR")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Wallet home directory holding keystores and config.toml
    #[arg(long, global = true, env = HOME_ENV)]
    home: Option<PathBuf>,

    /// Read the keystore password from the first line of this file
    #[arg(long, global = true)]
    password_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key and store it encrypted
    Genkey {
        /// Name of the new key
        name: String,
    },

    /// List stored keys
    Listkey,

    /// Import a keystore file under a new name
    Importkey {
        /// Name for the imported key
        name: String,

        /// Keystore file to import
        #[arg(long)]
        keyfile: PathBuf,
    },

    /// Delete a stored key
    Deletekey {
        /// Name of the key to delete
        name: String,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Send coins to an address
    Sendcoins {
        /// Currency symbol, e.g. ANKR
        symbol: String,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Name of the signing key, or a path to a keystore file
        #[arg(long)]
        keyfile: String,

        /// Amount in the smallest unit
        #[arg(long)]
        amount: String,

        /// Transaction memo
        #[arg(long, default_value = "")]
        memo: String,

        /// Gas price in the smallest fee unit
        #[arg(long)]
        gas_price: Option<String>,

        /// Transaction version
        #[arg(long)]
        tx_version: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Query the balance of an address
    Getbalance {
        /// Account address
        address: String,

        /// Currency symbol
        #[arg(long, default_value = "ANKR")]
        symbol: String,
    },
}

async fn dispatch(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Genkey { name } => commands::genkey::run(ctx, &name).await,
        Commands::Listkey => commands::listkey::run(ctx).await,
        Commands::Importkey { name, keyfile } => {
            commands::importkey::run(ctx, &name, &keyfile).await
        }
        Commands::Deletekey { name, yes } => commands::deletekey::run(ctx, &name, yes).await,
        Commands::Sendcoins {
            symbol,
            to,
            keyfile,
            amount,
            memo,
            gas_price,
            tx_version,
            yes,
        } => {
            let args = SendArgs {
                symbol,
                to,
                keyfile,
                amount,
                memo,
                gas_price,
                tx_version,
                skip_confirm: yes,
            };
            commands::sendcoins::run(ctx, args).await
        }
        Commands::Getbalance { address, symbol } => {
            commands::balance::run(ctx, &address, &symbol).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let ctx = Context {
        home: cli.home.unwrap_or_else(default_home),
        password_file: cli.password_file,
    };

    if let Err(e) = dispatch(&ctx, cli.command).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
