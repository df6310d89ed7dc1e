//! Watchtower indexer process
//! Replays raw blocks through the confirmation pipeline and answers queries
//! against the confirmed store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use watchtower_module_confirmed_store::{ConfirmedStore, StoreConfig};

mod replay;

#[derive(Debug, Parser)]
#[command(name = "watchtower")]
#[command(about = "Embedded Cardano chain indexer")]
struct Args {
    /// Configuration files, later ones override earlier ones
    #[arg(long, value_name = "PATH", default_values_t = vec!["indexer.toml".to_string()])]
    config: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Feed block files through the indexer, in file name order
    Replay {
        /// Glob matching raw CBOR block files
        #[arg(long)]
        blocks: String,
    },

    /// Show the latest confirmed point and the most recent blocks
    Status {
        #[arg(long, default_value_t = 10)]
        count: usize,
    },

    /// List the outputs paying to an address
    Utxos {
        #[arg(long)]
        address: String,

        #[arg(long)]
        only_unused: bool,
    },

    /// Confirmed transactions not yet marked processed
    Pending {
        #[arg(long, default_value_t = 20)]
        max: usize,
    },

    /// Drop every stored output
    Reseed,
}

#[derive(Serialize)]
struct Status {
    latest_point: Option<watchtower_common::BlockPoint>,
    blocks: Vec<watchtower_common::CardanoBlock>,
}

fn load_config(files: &[String]) -> Result<Config> {
    let mut builder = Config::builder();
    for file in files {
        builder = builder.add_source(File::with_name(file));
    }
    builder
        .add_source(Environment::with_prefix("WATCHTOWER").separator("__"))
        .build()
        .context("loading configuration")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fjall=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args.config)?;
    let store_config = StoreConfig::try_load(&config).context("reading [store]")?;
    let store = ConfirmedStore::open(&store_config).context("opening confirmed store")?;

    match args.command {
        Command::Replay { blocks } => replay::run(&config, store.clone(), &blocks).await?,
        Command::Status { count } => print_json(&Status {
            latest_point: store.latest_point()?,
            blocks: store.latest_confirmed_blocks(count)?,
        })?,
        Command::Utxos {
            address,
            only_unused,
        } => print_json(&store.all_tx_outputs(&address, only_unused)?)?,
        Command::Pending { max } => print_json(&store.unprocessed_confirmed_txs(max)?)?,
        Command::Reseed => {
            store.batch().delete_all_tx_outputs_physically().execute()?;
            info!("Removed all stored outputs");
        }
    }

    store.close()?;
    Ok(())
}
