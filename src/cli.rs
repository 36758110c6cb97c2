use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::batch::{self, missing_dimension_count};
use crate::carrier::EasyPostClient;
use crate::config::Config;
use crate::fulfillment::{self, MarketplaceClient, DEFAULT_SELLER_BASE};
use crate::labels::LabelCache;
use crate::pdf::build_labels_pdf;
use crate::purchase::purchase_batch;
use crate::secrets::{
    self, EnvSecretStore, SecretStore, ACCOUNT_CARRIER, ACCOUNT_MARKETPLACE,
    ACCOUNT_MARKETPLACE_EMAIL, SERVICE,
};

/// CLI for shipbatch: classify marketplace orders, buy labels in bulk, and
/// build one printable PDF.
#[derive(Parser)]
#[clap(
    name = "shipbatch",
    version,
    about = "Convert order exports into purchased shipping labels and a merged label PDF"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify normalized orders into a prepared batch CSV
    Prepare {
        /// Normalized orders CSV (to_address.*, item_count, shipping_price, manapool.*)
        #[clap(long)]
        orders: PathBuf,
        /// Where to write the prepared batch CSV
        #[clap(long)]
        out: PathBuf,
        /// JSON config with rules/defaults (defaults used when absent)
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Create and buy a shipment per batch row, then build the merged label PDF
    Buy {
        /// Prepared batch CSV
        #[clap(long)]
        batch: PathBuf,
        /// Output path for the merged label PDF
        #[clap(long)]
        out: PathBuf,
        /// Label cache directory
        #[clap(long, default_value = "label_cache")]
        cache_dir: PathBuf,
        /// Push tracking data back to the marketplace after buying
        #[clap(long)]
        notify: bool,
        /// Fulfillment status to report when notifying
        #[clap(long, default_value = "shipped")]
        status: String,
        /// Also export fulfillment records to this CSV
        #[clap(long)]
        fulfillment_csv: Option<PathBuf>,
    },
    /// Rebuild the merged PDF for already-purchased shipment ids
    Labels {
        /// Shipment ids, in the page order wanted
        #[clap(required = true)]
        shipment_ids: Vec<String>,
        /// Output path for the merged label PDF
        #[clap(long)]
        out: PathBuf,
        /// Label cache directory
        #[clap(long, default_value = "label_cache")]
        cache_dir: PathBuf,
    },
    /// Push tracking data from a fulfillment CSV to the marketplace
    Fulfill {
        /// Fulfillment CSV (as exported by buy)
        #[clap(long)]
        records: PathBuf,
        /// Fulfillment status to report
        #[clap(long, default_value = "shipped")]
        status: String,
        /// Marketplace seller API base URL
        #[clap(long, default_value = DEFAULT_SELLER_BASE)]
        base_url: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p).with_context(|| format!("loading config {p:?}")),
        None => Ok(Config::default()),
    }
}

fn carrier_client(store: &dyn SecretStore) -> Result<EasyPostClient> {
    let api_key = secrets::require(store, SERVICE, ACCOUNT_CARRIER)?;
    Ok(EasyPostClient::new(&api_key)?)
}

fn marketplace_client(store: &dyn SecretStore, base_url: &str) -> Result<MarketplaceClient> {
    let email = secrets::require(store, SERVICE, ACCOUNT_MARKETPLACE_EMAIL)?;
    let api_key = secrets::require(store, SERVICE, ACCOUNT_MARKETPLACE)?;
    Ok(MarketplaceClient::with_base_url(&email, &api_key, base_url)?)
}

/// Extracted async CLI logic entrypoint for integration tests and main().
pub async fn run(cli: Cli) -> Result<()> {
    let store = EnvSecretStore;

    match cli.command {
        Commands::Prepare { orders, out, config } => {
            let config = load_config(config.as_ref())?;
            let orders = batch::read_orders(&orders, &config)?;
            let rows = batch::classify_orders(&config, &orders);
            let missing = missing_dimension_count(&rows);
            batch::write_batch(&out, &rows)?;
            println!("Prepared {} row(s) -> {}", rows.len(), out.display());
            if missing > 0 {
                println!("{missing} package row(s) need L/W/H/Weight before buying.");
            }
            Ok(())
        }

        Commands::Buy {
            batch,
            out,
            cache_dir,
            notify,
            status,
            fulfillment_csv,
        } => {
            let rows = batch::read_batch(&batch)?;
            if rows.is_empty() {
                bail!("batch {batch:?} has no rows");
            }
            let missing = missing_dimension_count(&rows);
            if missing > 0 {
                bail!("{missing} package row(s) are missing L/W/H/Weight; fill them before buying");
            }

            // Credentials are checked before any row is attempted.
            let client = carrier_client(&store)?;
            let marketplace = if notify {
                Some(marketplace_client(&store, DEFAULT_SELLER_BASE)?)
            } else {
                None
            };

            let report = purchase_batch(&client, &rows, |msg| println!("{msg}")).await?;

            let cache = LabelCache::new(cache_dir);
            let ids = report.shipment_ids();
            build_labels_pdf(&client, &cache, &ids, &out, &mut |msg| println!("{msg}")).await?;
            println!("Saved merged label PDF to {}", out.display());

            if let Some(path) = fulfillment_csv {
                fulfillment::export_csv(&report.fulfillments, &path)?;
            }
            if let Some(marketplace) = marketplace {
                let summary = marketplace
                    .notify_all(&report.fulfillments, &status, &mut |msg| println!("{msg}"))
                    .await;
                println!(
                    "Fulfillment: {} updated, {} failed",
                    summary.updated, summary.failed
                );
                for error in &summary.errors {
                    eprintln!("  {error}");
                }
            }

            if !report.failures.is_empty() {
                println!("Completed with {} row error(s):", report.failures.len());
                for failure in &report.failures {
                    eprintln!("  Row {}: {}", failure.row, failure.message);
                }
            }
            Ok(())
        }

        Commands::Labels {
            shipment_ids,
            out,
            cache_dir,
        } => {
            let client = carrier_client(&store)?;
            let cache = LabelCache::new(cache_dir);
            build_labels_pdf(&client, &cache, &shipment_ids, &out, &mut |msg| {
                println!("{msg}")
            })
            .await?;
            println!("Saved merged label PDF to {}", out.display());
            Ok(())
        }

        Commands::Fulfill {
            records,
            status,
            base_url,
        } => {
            let loaded = fulfillment::read_csv(&records)?;
            if loaded.is_empty() {
                bail!("no fulfillment records in {records:?}");
            }
            let marketplace = marketplace_client(&store, &base_url)?;
            let summary = marketplace
                .notify_all(&loaded, &status, &mut |msg| println!("{msg}"))
                .await;
            println!(
                "Fulfillment: {} updated, {} failed",
                summary.updated, summary.failed
            );
            for error in &summary.errors {
                eprintln!("  {error}");
            }
            Ok(())
        }
    }
}
