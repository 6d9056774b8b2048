//! PurchaseKit Demo CLI
//!
//! Command-line interface for exercising PurchaseKit purchase flows against a
//! file-backed simulated storefront.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod store;
mod ui;

use store::SimulatedOutcome;

#[derive(Parser)]
#[command(name = "purchasekit-demo")]
#[command(about = "PurchaseKit Demo CLI - Simulate in-app purchases from a terminal", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom storage directory
    #[arg(long, global = true, env = "PURCHASEKIT_DEMO_DIR")]
    storage_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or refresh) the simulated store and its catalog
    Init {
        /// Also write a config.json with the default manager settings
        #[arg(long)]
        write_config: bool,
    },

    /// Show catalog products
    Products {
        /// Product ids to query (default: the whole demo catalog)
        ids: Vec<String>,
    },

    /// Purchase a product
    Buy {
        /// Product id (e.g., pro_plan)
        product_id: String,

        /// How the simulated storefront answers
        #[arg(short, long, value_enum, default_value_t = SimulatedOutcome::Verified)]
        outcome: SimulatedOutcome,

        /// Units to buy (consumables)
        #[arg(short, long, default_value = "1")]
        quantity: u32,

        /// Attach a fresh app account token
        #[arg(long)]
        account: bool,
    },

    /// Restore previous purchases
    Restore,

    /// Show entitlement status
    Status {
        /// Product ids (default: the whole demo catalog)
        ids: Vec<String>,
    },

    /// Run the update listener and deliver queued store updates
    Listen {
        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Queue a subscription renewal on the store side
    Renew {
        /// Subscription product id
        product_id: String,

        /// Make the renewal fail verification
        #[arg(long)]
        unverified: bool,
    },

    /// Revoke (refund) a transaction on the store side
    Revoke {
        /// Transaction id
        transaction_id: String,
    },

    /// Show every transaction the simulated store has issued
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over the verbosity flag.
    let default_filter = if cli.verbose {
        "purchasekit_demo_cli=debug,purchasekit_manager=debug,purchasekit_lib=debug"
    } else {
        "purchasekit_demo_cli=info,purchasekit_manager=warn,purchasekit_lib=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage_dir = if let Some(dir) = cli.storage_dir {
        std::path::PathBuf::from(dir)
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("purchasekit-demo")
    };

    match cli.command {
        Commands::Init { write_config } => {
            commands::init::run(&storage_dir, write_config, cli.verbose).await
        }
        Commands::Products { ids } => commands::products::run(&storage_dir, ids, cli.verbose).await,
        Commands::Buy {
            product_id,
            outcome,
            quantity,
            account,
        } => {
            commands::buy::run(
                &storage_dir,
                &product_id,
                outcome,
                quantity,
                account,
                cli.verbose,
            )
            .await
        }
        Commands::Restore => commands::restore::run(&storage_dir, cli.verbose).await,
        Commands::Status { ids } => commands::status::run(&storage_dir, ids, cli.verbose).await,
        Commands::Listen { duration } => {
            commands::listen::run(&storage_dir, duration, cli.verbose).await
        }
        Commands::Renew {
            product_id,
            unverified,
        } => commands::simulate::renew(&storage_dir, &product_id, unverified, cli.verbose).await,
        Commands::Revoke { transaction_id } => {
            commands::simulate::revoke(&storage_dir, &transaction_id, cli.verbose).await
        }
        Commands::History => commands::simulate::history(&storage_dir, cli.verbose).await,
    }
}
