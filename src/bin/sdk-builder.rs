use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sdk_builder::config::load_config;
use sdk_builder::preflight::check_backend_tools;
use sdk_builder::probe::ImageManifest;
use sdk_builder::sdk::{populate_sdk, PackageType, PopulateReport};

#[derive(Parser)]
#[command(name = "sdk-builder")]
#[command(about = "Populate SDK target and native sysroots")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wipe the output root and populate both sysroots
    Populate {
        /// SDK configuration file
        #[arg(short, long)]
        config: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the configured backend's host tools are installed
    CheckTools {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Check whether a deployed image manifest lists a package
    HasPackage {
        /// Image manifest file (`<image>.manifest`)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Regular expression searched in the manifest
        pattern: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Populate { config, json } => populate(&config, json),
        Commands::CheckTools { config } => check_tools(&config),
        Commands::HasPackage { manifest, pattern } => has_package(&manifest, &pattern),
    }
}

fn populate(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("loading '{}'", config_path.display()))?;
    let report = populate_sdk(&config)
        .with_context(|| format!("populating SDK at '{}'", config.layout.output.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &PopulateReport) {
    println!("SDK populated ({})", report.technology);
    println!("  output:         {}", report.output.display());
    println!("  target sysroot: {}", report.target_sysroot.display());
    println!("  native sysroot: {}", report.native_sysroot.display());
    println!("  sha256:         {}", report.digest);
    for skipped in &report.skipped {
        println!(
            "  skipped ({}): {}",
            skipped.sysroot,
            skipped.packages.join(" ")
        );
    }
}

fn check_tools(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("loading '{}'", config_path.display()))?;
    let pkgtype: PackageType = config.image_pkgtype.parse()?;
    check_backend_tools(pkgtype)?;
    println!("all {} host tools found", pkgtype);
    Ok(())
}

fn has_package(manifest_path: &Path, pattern: &str) -> Result<()> {
    let manifest = ImageManifest::load(manifest_path)?;
    if manifest.has_package(pattern)? {
        println!("{}: present", pattern);
        Ok(())
    } else {
        bail!("{}: not in {}", pattern, manifest.path().display())
    }
}
