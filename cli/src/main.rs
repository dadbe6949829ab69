//! CLI for the Jenkins plugin modernizer.
//!
//! Applies a modernization recipe to a batch of plugins and opens pull
//! requests with the result, publishing a modernization record per plugin.

use clap::{Args, Parser, Subcommand};
use plugin_modernizer::{
    clean_cache, ConfigError, Credentials, DuplicatePrStrategy, PluginTarget, RecipeBook,
    RunSummary, Runner, RunnerError, Settings, UnitOutcome,
};
use plugin_modernizer::config::SettingsFile;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Plugin Modernizer - Apply modernization recipes to Jenkins plugins and open pull requests.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a modernizer.toml settings file.
    #[arg(long, global = true, env = "MODERNIZER_CONFIG")]
    config: Option<PathBuf>,

    /// Cache directory for checkouts, facts and records.
    #[arg(long, global = true, env = "CACHE_DIR")]
    cache_path: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a recipe to plugins.
    Run(RunArgs),
    /// List available recipes.
    Recipes,
    /// Remove the cache directory.
    Cleanup,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Plugin names, comma separated.
    #[arg(long, value_delimiter = ',')]
    plugins: Vec<String>,

    /// File with one plugin name per line.
    #[arg(long)]
    plugin_file: Option<PathBuf>,

    /// Local plugin checkouts to operate on in place.
    #[arg(long)]
    plugin_path: Vec<PathBuf>,

    /// Recipe id, fully qualified or short.
    #[arg(long)]
    recipe: String,

    /// Transform and verify locally without forking, pushing or opening pull requests.
    #[arg(long)]
    dry_run: bool,

    /// Only fetch plugins and collect their metadata.
    #[arg(long)]
    fetch_metadata_only: bool,

    /// Skip build verification.
    #[arg(long)]
    skip_verification: bool,

    /// Do not publish modernization metadata.
    #[arg(long)]
    skip_metadata: bool,

    /// Delete forks before and after processing.
    #[arg(long)]
    remove_forks: bool,

    /// Process plugins marked as deprecated.
    #[arg(long)]
    allow_deprecated_plugins: bool,

    /// Open pull requests for plugins that opted out.
    #[arg(long)]
    override_opt_out_plugins: bool,

    /// Account or organization receiving the forks.
    #[arg(long, env = "GH_OWNER")]
    github_owner: Option<String>,

    /// What to do with an existing open pull request: skip, replace or ignore.
    #[arg(long)]
    duplicate_pr_strategy: Option<DuplicatePrStrategy>,

    /// Open pull requests as drafts.
    #[arg(long)]
    draft: bool,

    /// Extra recipe catalogue (TOML).
    #[arg(long)]
    recipes_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse arguments
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.debug);

    // Explicitly install aws-lc-rs as the process-wide TLS provider
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        error!("Failed to install TLS crypto provider");
        return ExitCode::from(2);
    }

    match execute(cli).await {
        Ok(Some(summary)) => {
            print_summary(&summary);
            if summary.has_failures() {
                ExitCode::from(1)
            } else {
                ExitCode::from(0)
            }
        }
        Ok(None) => ExitCode::from(0),
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(2)
        }
    }
}

/// Initializes tracing with environment filter support.
///
/// Sets up the global tracing subscriber with:
/// - Compact log formatting (single-line output)
/// - Log level filtering via `RUST_LOG` env var (defaults to "info", or "debug" with `--debug`)
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        // Use compact formatting without module target paths for cleaner output
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings, ConfigError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(SettingsFile::load(path)?),
        None => Settings::default(),
    };
    if let Some(path) = &cli.cache_path {
        settings.cache_path = path.clone();
    }
    settings.debug = cli.debug;
    Ok(settings)
}

/// Main execution logic.
async fn execute(cli: Cli) -> Result<Option<RunSummary>, RunnerError> {
    let mut settings = load_settings(&cli)?;
    match cli.command {
        Command::Recipes => {
            let book = RecipeBook::builtin()?;
            for recipe in book.iter() {
                println!("{} - {}", recipe.short_id(), recipe.description);
            }
            Ok(None)
        }
        Command::Cleanup => {
            clean_cache(&settings)?;
            Ok(None)
        }
        Command::Run(args) => {
            let mut book = RecipeBook::builtin()?;
            if let Some(path) = &args.recipes_file {
                book.extend(RecipeBook::load(path)?);
            }
            let recipe = book.find(&args.recipe)?.clone();
            let targets = targets(&args)?;

            settings.dry_run = args.dry_run;
            settings.metadata_only = args.fetch_metadata_only;
            settings.skip_verification = args.skip_verification;
            settings.skip_metadata = args.skip_metadata;
            settings.remove_forks = args.remove_forks;
            settings.allow_deprecated = args.allow_deprecated_plugins;
            settings.override_opt_out = args.override_opt_out_plugins;
            settings.draft |= args.draft;
            if args.github_owner.is_some() {
                settings.github_owner = args.github_owner;
            }
            if let Some(strategy) = args.duplicate_pr_strategy {
                settings.duplicate_pr_strategy = strategy;
            }

            let credentials = Credentials::from_env(&settings.ssh_private_key);
            let runner = Runner::new(settings, recipe, credentials).await?;
            Ok(Some(runner.run(&targets).await))
        }
    }
}

fn targets(args: &RunArgs) -> Result<Vec<PluginTarget>, ConfigError> {
    let mut names: Vec<String> = args.plugins.clone();
    if let Some(path) = &args.plugin_file {
        names.extend(read_plugin_file(path)?);
    }

    let mut targets: Vec<PluginTarget> = Vec::new();
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let target = PluginTarget::Name(name.to_string());
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets.extend(args.plugin_path.iter().cloned().map(PluginTarget::Path));

    if targets.is_empty() {
        return Err(ConfigError::ValidationError {
            path: "command line".to_string(),
            message: "no plugins given; use --plugins, --plugin-file or --plugin-path".to_string(),
        });
    }
    Ok(targets)
}

fn read_plugin_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Prints the final run summary.
fn print_summary(summary: &RunSummary) {
    println!("\nSummary:");
    let mode = if summary.metadata_only {
        "Metadata only"
    } else if summary.dry_run {
        "Dry Run"
    } else {
        "Live"
    };
    println!("  Mode: {mode}");
    println!("  Plugins processed: {}", summary.reports.len());
    println!("  Pull requests opened: {}", summary.published());
    println!("  Skipped: {}", summary.skipped());
    println!("  Failed: {}", summary.failed());

    for report in &summary.reports {
        println!();
        match &report.outcome {
            UnitOutcome::Failed { errors } => {
                println!("  {} failed:", report.name);
                for error in errors {
                    println!("    - {error}");
                }
            }
            UnitOutcome::Skipped => {
                println!("  {} was not found in the update center", report.name);
            }
            UnitOutcome::MetadataFetched { location } => {
                println!("  {} metadata fetched at {}", report.name, location.display());
            }
            UnitOutcome::DryRun { path, files } | UnitOutcome::Local { path, files } => {
                println!(
                    "  {} changes left in {} ({} files)",
                    report.name,
                    path.display(),
                    files.len()
                );
                for file in files {
                    println!("    - {file}");
                }
            }
            UnitOutcome::Published {
                pull_request,
                files,
            } => {
                println!(
                    "  {} pull request {pull_request} ({} files)",
                    report.name,
                    files.len()
                );
            }
            UnitOutcome::NoChanges => println!("  {} had no changes", report.name),
        }
        if let Some(record) = &report.record {
            println!("    Modernization metadata: {}", record.display());
        }
        for warning in &report.warnings {
            println!("    Warning: {warning}");
        }
    }
}
