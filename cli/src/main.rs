mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use kondate_core::config::DEFAULT_PROCESSED_LIST_POSTFIX;
use kondate_core::{default_registry, SitesConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kondate")]
#[command(about = "Collect TV recipe pages into a notes store", long_about = None)]
pub struct Cli {
    /// Sites configuration file
    #[arg(long, global = true, default_value = "config.yml")]
    pub config_yaml_filename: PathBuf,

    /// Directory holding caches, ledgers and local exports
    #[arg(long, global = true, default_value = ".")]
    pub work_dir: PathBuf,

    /// Credential file with the "notes" section
    #[arg(long, global = true, default_value = "credential.json")]
    pub credential_json_filename: PathBuf,

    /// Suffix of each site's ledger file name
    #[arg(long, global = true, default_value = DEFAULT_PROCESSED_LIST_POSTFIX)]
    pub processed_list_filename_postfix: String,

    /// Delay between requests to one host (overrides KONDATE_FETCH_DELAY_MS)
    #[arg(long, global = true)]
    pub fetch_delay_ms: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl sites and publish new recipes
    Run(RunArgs),
    /// Print the site configuration
    ViewConfig {
        /// Keep sites whose name or program name contains any of these
        filters: Vec<String>,
    },
    /// List the site adapters this build knows
    Sites,
}

#[derive(Args)]
pub struct RunArgs {
    /// Sites to run. Empty runs every enabled site; named sites run even if disabled.
    pub sites: Vec<String>,

    /// Create notes without looking for one with the same title
    #[arg(long)]
    pub no_check_existed: bool,

    /// Overwrite notes that already exist instead of skipping them
    #[arg(long, conflicts_with = "no_check_existed")]
    pub update_existed: bool,

    /// Write an ENEX file under the work directory instead of using the notes service
    #[arg(long)]
    pub use_local: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run(args) => run::run(&cli, args).await?,
        Commands::ViewConfig { filters } => {
            let sites = SitesConfig::load(&cli.config_yaml_filename)?;
            let yaml = sites
                .filtered(filters)
                .to_yaml()
                .context("Failed to serialize config")?;
            print!("{}", yaml);
        }
        Commands::Sites => {
            for name in default_registry().names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
