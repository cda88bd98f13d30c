//! tbm command-line front end.
//!
//! `-c` checks for new versions, `-i` installs the given packages, `-u`
//! checks and then installs whatever changed. `*` selects every manifest in
//! the bucket.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use tbm_core::{
    scaffold_from_release_url, AssumeYes, CheckOutcome, CheckStatus, ConfirmOverwrite,
    HttpVersionChecker, InstallEvent, Installer, ManifestStore, Settings, StdinConfirm,
    UpdateOrchestrator,
};

/// Personal package manager for prebuilt Linux binaries.
#[derive(Debug, Parser)]
#[command(name = "tbm", version = tbm_core::VERSION)]
struct Cli {
    /// Check for updates
    #[arg(short = 'c', long = "check")]
    check: bool,

    /// Install the packages
    #[arg(short = 'i', long = "install")]
    install: bool,

    /// Check for updates and install the changed packages
    #[arg(short = 'u', long = "update")]
    update: bool,

    /// Write a starter manifest for a GitHub release download URL
    #[arg(long, value_name = "URL", conflicts_with_all = ["check", "install", "update"])]
    scaffold: Option<String>,

    /// Answer "yes" to every overwrite confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Manifest directory (overrides settings)
    #[arg(long, value_name = "DIR")]
    bucket: Option<PathBuf>,

    /// Architecture entry to install (overrides settings)
    #[arg(long, value_name = "ARCH")]
    arch: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Package ids, or `*` for every manifest in the bucket
    #[arg(value_name = "ID", required_unless_present = "scaffold")]
    ids: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::debug!("Starting tbm v{}", tbm_core::VERSION);

    let settings = load_settings(&cli)?;
    let store = ManifestStore::new(&settings.bucket_dir);

    if let Some(url) = &cli.scaffold {
        return scaffold(&store, url);
    }

    let ids = resolve_ids(&store, &cli.ids)?;

    let to_install = if cli.check || cli.update {
        check(&settings, &store, &ids).await?
    } else {
        ids
    };

    if cli.update || cli.install {
        let confirm: Arc<dyn ConfirmOverwrite> = if cli.yes {
            Arc::new(AssumeYes)
        } else {
            Arc::new(StdinConfirm)
        };
        install(&settings, &store, confirm, &to_install).await?;
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if verbose {
        if let Ok(directive) = "tbm_core=info".parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    if let Some(bucket) = &cli.bucket {
        settings.bucket_dir = bucket.clone();
    }
    if let Some(arch) = &cli.arch {
        settings.architecture = arch.clone();
    }
    settings.validate();

    tracing::debug!(?settings, "Settings loaded");
    Ok(settings)
}

/// Expands `*` into every manifest id in the bucket.
fn resolve_ids(store: &ManifestStore, args: &[String]) -> Result<Vec<String>> {
    if args.first().map(String::as_str) == Some("*") {
        return store.discover().with_context(|| {
            format!("Failed to list manifests in {}", store.bucket_dir().display())
        });
    }
    Ok(args.to_vec())
}

/// Runs the version checks and returns the ids whose version changed.
async fn check(settings: &Settings, store: &ManifestStore, ids: &[String]) -> Result<Vec<String>> {
    let checker =
        HttpVersionChecker::from_settings(settings).context("Failed to build HTTP client")?;
    let orchestrator = UpdateOrchestrator::new(store.clone(), Arc::new(checker))
        .with_concurrency(settings.concurrency);

    let report = orchestrator.check_all_with(ids, print_outcome).await;
    Ok(report.updated_ids())
}

fn print_outcome(outcome: &CheckOutcome) {
    let id = &outcome.id;
    match &outcome.status {
        CheckStatus::Missing => {}
        CheckStatus::Unchanged { version } => println!("[{id}]: <{version}>"),
        CheckStatus::Updated { from, to } => println!("[{id}]: <{from}> -> <{to}>"),
        CheckStatus::Indeterminate { version, reason } => {
            println!("[{id}]: <{version}> (latest version unknown: {reason})")
        }
        CheckStatus::Failed { error } => println!("[{id}]: error checking version. {error}"),
    }
}

/// Installs each id in order. A failing package is reported and skipped.
async fn install(
    settings: &Settings,
    store: &ManifestStore,
    confirm: Arc<dyn ConfirmOverwrite>,
    ids: &[String],
) -> Result<()> {
    tbm_core::paths::ensure_dirs_exist(&[
        settings.cache_dir.as_path(),
        settings.bin_dir.as_path(),
    ])?;
    let mut installer =
        Installer::from_settings(settings, confirm).context("Failed to build HTTP client")?;

    println!("********Installing********");
    for id in ids {
        let result = installer
            .install_package(store, id, |event| print_event(id, &event))
            .await;

        match result {
            Ok(_) => println!("[{id}]: done"),
            Err(e) => println!("[{id}]: error installing binary. {e}"),
        }
    }

    Ok(())
}

fn print_event(id: &str, event: &InstallEvent) {
    match event {
        InstallEvent::Downloading { url } => println!("[{id}]: downloading {url}"),
        InstallEvent::Downloaded { bytes } => println!("[{id}]: downloaded {bytes} bytes"),
        InstallEvent::Extracting { asset } => println!("[{id}]: extracting {asset}"),
        InstallEvent::Deploying {
            source,
            destination,
        } => println!("[{id}]: {} -> {}", source.display(), destination.display()),
        InstallEvent::Skipped { destination } => {
            println!("[{id}]: {} not updated", destination.display())
        }
    }
}

fn scaffold(store: &ManifestStore, url: &str) -> Result<()> {
    let scaffold = scaffold_from_release_url(url)?;
    store
        .create(&scaffold.manifest, &scaffold.id)
        .with_context(|| format!("Failed to write manifest for {}", scaffold.id))?;
    println!("[{}]: {}", scaffold.id, store.manifest_path(&scaffold.id).display());
    Ok(())
}
