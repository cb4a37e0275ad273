use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use trafficsales::{
    config::Config,
    pipeline::{run_consumer, run_producer},
    sales::HttpSalesApi,
    workitems::JsonFileQueue,
};

/// Road traffic dataset → per-country work items → sales system.
#[derive(Parser, Debug)]
#[command(name = "trafficsales")]
struct Cli {
    /// YAML config file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Work item queue file
    #[arg(long, global = true)]
    work_items: Option<PathBuf>,

    /// Timeout for every HTTP call, in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    http_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the dataset and enqueue one work item per country
    Produce {
        #[arg(long)]
        dataset_url: Option<String>,
        /// Where the downloaded JSON is cached
        #[arg(long)]
        dataset_cache: Option<PathBuf>,
        /// Where the filtered table is written as CSV
        #[arg(long)]
        filtered_csv: Option<PathBuf>,
    },
    /// Validate pending work items and POST them to the sales system
    Consume {
        #[arg(long)]
        sales_api_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) configuration ────────────────────────────────────────────
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(p) = cli.work_items {
        config.work_items_path = p;
    }
    if let Some(t) = cli.http_timeout_secs {
        config.http_timeout_secs = t;
    }
    let client = config.http_client()?;

    // ─── 3) run the requested stage ──────────────────────────────────
    match cli.command {
        Command::Produce {
            dataset_url,
            dataset_cache,
            filtered_csv,
        } => {
            if let Some(u) = dataset_url {
                config.dataset_url = u;
            }
            if let Some(p) = dataset_cache {
                config.dataset_cache_path = p;
            }
            if let Some(p) = filtered_csv {
                config.filtered_csv_path = p;
            }
            info!(queue = %config.work_items_path.display(), "producer startup");
            let mut queue = JsonFileQueue::open(&config.work_items_path).await?;
            let summary = run_producer(&config, &client, &mut queue).await?;
            info!(items = summary.items_enqueued, "all done");
        }
        Command::Consume { sales_api_url } => {
            if let Some(u) = sales_api_url {
                config.sales_api_url = u;
            }
            info!(queue = %config.work_items_path.display(), "consumer startup");
            let api = HttpSalesApi::new(client, &config.sales_api_url)?;
            let mut queue = JsonFileQueue::open(&config.work_items_path).await?;
            let summary = run_consumer(&api, &mut queue).await?;
            info!(processed = summary.total(), "all done");
        }
    }

    Ok(())
}
