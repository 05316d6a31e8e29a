use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{error, info};

use photo_sorter_core::processing::RasterProcessor;
use photo_sorter_core::sync::remote::RestRemoteCatalog;
use photo_sorter_core::{logging, Config, PhotoSorter, RunReport};

#[derive(Parser)]
#[command(name = "photo-sorter")]
#[command(about = "Curate and publish a product photo catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonOpts {
    /// Root of the photo catalog
    #[arg(long, default_value = "photos")]
    root: PathBuf,

    /// Run without making changes
    #[arg(long)]
    dry_run: bool,

    /// Only show warnings and errors
    #[arg(long)]
    quiet: bool,

    /// Restrict the run to products whose path contains this substring
    #[arg(long)]
    only: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize source photo filenames across the catalog
    Rename {
        #[command(flatten)]
        common: CommonOpts,
    },

    /// Rebuild each product's _live directory from its selected photos
    Prepare {
        #[command(flatten)]
        common: CommonOpts,

        /// Rebuild every _live folder even when nothing changed
        #[arg(long)]
        reprocess_all: bool,
    },

    /// Reconcile _live directories against the remote catalog
    Publish {
        #[command(flatten)]
        common: CommonOpts,

        /// Number of parallel upload workers
        #[arg(long, default_value_t = 10)]
        workers: usize,
    },

    /// Check catalog structure and photo coverage without changing anything
    Validate {
        #[command(flatten)]
        common: CommonOpts,
    },

    /// Download the remote catalog into a fresh local catalog tree
    Mirror {
        #[command(flatten)]
        common: CommonOpts,

        /// Replace the catalog root if it already exists
        #[arg(long)]
        overwrite: bool,
    },
}

impl Commands {
    fn common(&self) -> &CommonOpts {
        match self {
            Commands::Rename { common }
            | Commands::Prepare { common, .. }
            | Commands::Publish { common, .. }
            | Commands::Validate { common }
            | Commands::Mirror { common, .. } => common,
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let common = cli.command.common();

    // Environment flags first, command line flags on top
    let mut config = Config::from_env(common.root.clone());
    config.dry_run |= common.dry_run;
    config.quiet |= common.quiet;
    config.path_filter = common.only.clone();

    match &cli.command {
        Commands::Prepare { reprocess_all, .. } => config.reprocess_all |= *reprocess_all,
        Commands::Publish { workers, .. } => config.upload_workers = *workers,
        // Validation is read-only and reports every violation it finds
        Commands::Validate { .. } => config.dry_run = true,
        _ => {}
    }

    // Mirroring creates the root itself, so there is nothing to validate yet
    if !matches!(cli.command, Commands::Mirror { .. }) {
        config.validate()?;
    }

    if logging::init_logger(config.quiet).is_err() {
        env_logger::init();
    }

    if config.dry_run {
        info!("Dry run, no changes will be made");
    }

    let processor = RasterProcessor;
    let sorter = PhotoSorter::new(config, &processor);

    let report = match cli.command {
        Commands::Rename { .. } => sorter.rename()?,
        Commands::Prepare { .. } => sorter.prepare()?,
        Commands::Validate { .. } => sorter.validate()?,
        Commands::Publish { .. } => {
            let remote = RestRemoteCatalog::from_env()
                .context("remote catalog credentials are not configured")?;
            sorter.publish(&remote)?
        }
        Commands::Mirror { overwrite, .. } => {
            let remote = RestRemoteCatalog::from_env()
                .context("remote catalog credentials are not configured")?;
            sorter.mirror(&remote, overwrite)?
        }
    };

    finish(report)
}

fn finish(report: RunReport) -> Result<(), anyhow::Error> {
    if report.is_success() {
        info!("Done");
        return Ok(());
    }
    for msg in report.errors() {
        error!("{}", msg);
    }
    anyhow::bail!("{} products failed", report.errors().len())
}
