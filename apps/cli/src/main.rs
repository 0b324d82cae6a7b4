//! s3relay CLI - copy every URL of a CSV manifest into an S3-compatible bucket
//!
//! Configuration comes from flags, the environment, or a `.env` file in the
//! working directory.

mod commands;
mod output;
mod progress;

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use s3relay_core::{resolve_rates, RelayConfig, StoreSettings, ThrottleMode, DEFAULT_MANIFEST};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// s3relay - throttled URL-to-bucket copier
#[derive(Parser)]
#[command(name = "s3relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV manifest with one URL per row in the first column
    #[arg(long, env = "S3RELAY_MANIFEST", default_value = DEFAULT_MANIFEST)]
    manifest: PathBuf,

    /// Output format
    #[arg(long, default_value = "human")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// List the planned transfers without touching the network
    #[arg(long)]
    dry_run: bool,

    /// Exit with status 1 when any transfer fails
    #[arg(long)]
    strict: bool,

    #[command(flatten)]
    store: StoreArgs,

    #[command(flatten)]
    throttle: ThrottleArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Table,
}

#[derive(Args)]
struct StoreArgs {
    /// S3-compatible endpoint URL
    #[arg(long, env = "CLOUDFLARE_STORAGE_ENDPOINT")]
    endpoint: Option<String>,

    /// Signing region
    #[arg(long, env = "S3_REGION", default_value = "auto")]
    region: String,

    /// Destination bucket
    #[arg(long, env = "S3_BUCKET_NAME")]
    bucket: Option<String>,

    /// Access key id
    #[arg(long, env = "AWS_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// Secret access key
    #[arg(long, env = "AWS_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, env = "S3_PATH_STYLE", value_parser = FalseyValueParser::new())]
    path_style: bool,
}

#[derive(Args)]
struct ThrottleArgs {
    /// Rate for both phases unless overridden, e.g. "2MB/s" or "16Mbps"
    #[arg(long, env = "NETWORK_RATE_LIMIT")]
    network_rate: Option<String>,

    /// Download ceiling
    #[arg(long, env = "DOWNLOAD_RATE_LIMIT")]
    download_rate: Option<String>,

    /// Upload ceiling
    #[arg(long, env = "UPLOAD_RATE_LIMIT")]
    upload_rate: Option<String>,

    /// Pace each phase as a whole (scoped) or chunk by chunk (streaming)
    #[arg(long, env = "S3RELAY_THROTTLE_MODE", default_value_t = ThrottleMode::Scoped)]
    throttle_mode: ThrottleMode,

    /// Pause between items in milliseconds
    #[arg(long, env = "S3RELAY_ITEM_DELAY_MS", default_value_t = 1000)]
    item_delay_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

impl Cli {
    /// Assemble and validate the engine configuration
    fn relay_config(&self) -> Result<RelayConfig> {
        let (download_rate, upload_rate) = resolve_rates(
            self.throttle.network_rate.as_deref(),
            self.throttle.download_rate.as_deref(),
            self.throttle.upload_rate.as_deref(),
        )?;

        let store = StoreSettings {
            endpoint: self.store.endpoint.clone().unwrap_or_default(),
            region: self.store.region.clone(),
            bucket: self.store.bucket.clone().unwrap_or_default(),
            access_key: self.store.access_key.clone().unwrap_or_default(),
            secret_key: self.store.secret_key.clone().unwrap_or_default(),
            path_style: self.store.path_style,
        };

        let config = RelayConfig::new(store, download_rate, upload_rate)?
            .with_throttle_mode(self.throttle.throttle_mode)
            .with_item_delay(Duration::from_millis(self.throttle.item_delay_ms));

        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "s3relay_core=debug,s3relay=debug,info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Completions { shell }) = cli.command {
        use clap::CommandFactory;
        clap_complete::generate(shell, &mut Cli::command(), "s3relay", &mut std::io::stdout());
        return Ok(());
    }

    if cli.dry_run {
        return commands::plan(&cli.manifest, cli.output).await;
    }

    // Configuration problems stop the run before any transfer
    let config = cli.relay_config()?;
    let report = commands::run(config, &cli.manifest, cli.output).await?;

    if cli.strict && report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}
