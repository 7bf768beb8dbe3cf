//! Sumi-Sieve main entry point
//!
//! This is the command-line interface for the Sumi-Sieve email harvester.

use clap::Parser;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use sumi_sieve::config::{load_config_with_hash, Config};
use sumi_sieve::crawler::{Coordinator, CrawlTarget, ProgressEvent};
use sumi_sieve::input::read_targets;
use sumi_sieve::output::{
    format_email_list, generate_markdown_summary, generate_summary, load_statistics,
    print_statistics, write_email_list,
};
use sumi_sieve::storage::{EmailFilter, SqliteStorage, Storage};
use sumi_sieve::ConfigError;
use tracing_subscriber::EnvFilter;

/// Sumi-Sieve: a polite contact-email harvester
///
/// Sumi-Sieve fetches a list of pages at a fixed pace, extracts contact
/// email addresses, and keeps them in SQLite with their source, company,
/// and category.
#[derive(Parser, Debug)]
#[command(name = "sumi-sieve")]
#[command(version = "1.0.0")]
#[command(about = "A polite contact-email harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Process a single URL
    #[arg(long, conflicts_with = "file")]
    url: Option<String>,

    /// Process URLs listed in a file (one per line, optional ",company")
    #[arg(long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Category for --url/--file, or the only configured category to run
    #[arg(long)]
    category: Option<String>,

    /// Company name for --url
    #[arg(long, requires = "url")]
    company: Option<String>,

    /// Write the harvested email list to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and list the targets without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "cleanup", "backup"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["export_summary", "cleanup", "backup"])]
    stats: bool,

    /// Delete emails and finished statistics older than DAYS and exit
    #[arg(long, value_name = "DAYS", conflicts_with_all = ["export_summary", "backup"])]
    cleanup: Option<u32>,

    /// Copy the database to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with = "export_summary")]
    backup: Option<PathBuf>,

    /// Generate markdown summary of the latest run and exit
    #[arg(long)]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&cli, &config)?;
    } else if cli.stats {
        handle_stats(&cli, &config)?;
    } else if let Some(days) = cli.cleanup {
        handle_cleanup(&config, days)?;
    } else if let Some(destination) = &cli.backup {
        handle_backup(&config, destination)?;
    } else if cli.export_summary {
        handle_export_summary(&cli, &config)?;
    } else {
        handle_run(&cli, &config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_sieve=info,warn"),
            1 => EnvFilter::new("sumi_sieve=debug,info"),
            2 => EnvFilter::new("sumi_sieve=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Collects the targets selected on the command line
///
/// `--url` and `--file` take precedence; otherwise every configured
/// category is read in order, or just the one named by `--category`.
fn collect_targets(cli: &Cli, config: &Config) -> Result<Vec<CrawlTarget>, Box<dyn std::error::Error>> {
    if let Some(url) = &cli.url {
        let mut target = CrawlTarget::new(url.as_str());
        if let Some(company) = &cli.company {
            target = target.with_company(company.as_str());
        }
        if let Some(category) = &cli.category {
            target = target.with_category(category.as_str());
        }
        return Ok(vec![target]);
    }

    if let Some(file) = &cli.file {
        return Ok(read_targets(file, cli.category.as_deref())?);
    }

    let categories: Vec<_> = match &cli.category {
        Some(name) => vec![config
            .category(name)
            .ok_or_else(|| ConfigError::UnknownCategory(name.clone()))?],
        None => config.categories.iter().collect(),
    };

    let mut targets = Vec::new();
    for category in categories {
        match read_targets(&category.urls_file, Some(&category.name)) {
            Ok(mut found) => {
                tracing::info!("Category '{}': {} targets", category.name, found.len());
                targets.append(&mut found);
            }
            Err(e) => tracing::warn!("Skipping category '{}': {}", category.name, e),
        }
    }

    Ok(targets)
}

/// Handles the --dry-run mode: validates config and shows what would be fetched
fn handle_dry_run(cli: &Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sumi-Sieve Dry Run ===\n");

    let extraction = &config.extraction;
    println!("Extraction Configuration:");
    println!("  Delay between requests: {}s", extraction.delay_between_requests);
    println!("  Max retries: {}", extraction.max_retries);
    println!("  Timeout: {}s", extraction.timeout);
    println!("  Backoff: {:?}", extraction.fetch_policy().backoff);
    match extraction.proxy_pool() {
        Some(pool) => println!(
            "  Proxies: {} ({:?} rotation)",
            pool.len(),
            extraction.proxy_rotation
        ),
        None => println!("  Proxies: disabled"),
    }
    match extraction.user_agents().len() {
        0 => println!("  User agents: built-in browser list"),
        n => println!(
            "  User agents: {} ({:?} rotation)",
            n, extraction.user_agent_rotation
        ),
    }

    println!("\nDatabase: {}", config.database.path.display());

    let targets = collect_targets(cli, config)?;
    println!("\nTargets ({}):", targets.len());
    for target in &targets {
        println!(
            "  - {} [{}]{}",
            target.url,
            target.category.as_deref().unwrap_or("unknown"),
            target
                .company_name
                .as_deref()
                .map(|c| format!(" {}", c))
                .unwrap_or_default()
        );
    }

    let minimum = extraction.delay().as_secs_f64() * targets.len().saturating_sub(1) as f64;
    println!("\n✓ Configuration is valid");
    println!("✓ A run would take at least {:.0} seconds", minimum);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(cli: &Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.database.path.display());

    let storage = SqliteStorage::new(&config.database.path)?;
    let stats = load_statistics(&storage, cli.category.as_deref())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --cleanup mode: removes old data
fn handle_cleanup(config: &Config, days: u32) -> Result<(), Box<dyn std::error::Error>> {
    let mut storage = SqliteStorage::new(&config.database.path)?;
    let deleted = storage.cleanup_old_data(days)?;

    println!("✓ Deleted {} emails older than {} days", deleted, days);

    Ok(())
}

/// Handles the --backup mode: copies the database
fn handle_backup(config: &Config, destination: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let storage = SqliteStorage::new(&config.database.path)?;

    if !storage.backup(destination) {
        return Err(format!("backup to {} failed", destination.display()).into());
    }

    println!("✓ Database backed up to: {}", destination.display());

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(cli: &Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let output = cli
        .output
        .as_ref()
        .or(config.output.summary_path.as_ref())
        .ok_or("no summary path: pass -o or set output.summary-path")?;

    let storage = SqliteStorage::new(&config.database.path)?;

    tracing::info!("Loading run data from database...");
    let summary = generate_summary(&storage)?;
    generate_markdown_summary(&summary, output)?;

    println!("✓ Summary exported to: {}", output.display());

    Ok(())
}

/// Handles the main harvesting run
async fn handle_run(
    cli: &Cli,
    config: &Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let targets = collect_targets(cli, config)?;
    if targets.is_empty() {
        tracing::warn!("Nothing to do: no targets selected");
        return Ok(());
    }

    let storage = Arc::new(Mutex::new(SqliteStorage::new(&config.database.path)?));

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        let mut harvested = BTreeSet::new();
        while let Some(event) = progress_rx.recv().await {
            match event {
                ProgressEvent::Started { index, total, url } => {
                    tracing::info!("[{}/{}] {}", index + 1, total, url);
                }
                ProgressEvent::Extracted { emails, .. } => harvested.extend(emails),
                _ => {}
            }
        }
        harvested
    });

    let mut coordinator = Coordinator::from_config(config, Arc::clone(&storage))?
        .with_config_hash(config_hash)
        .with_progress(progress_tx);

    let result = coordinator.run(&targets).await;
    drop(coordinator);
    let harvested = printer.await.unwrap_or_default();

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            return Err(e.into());
        }
    };

    println!(
        "✓ Run {} finished: {} URLs, {} with emails, {} emails found ({:.1}s)",
        stats.run_id,
        stats.total_urls,
        stats.successful_extractions,
        stats.total_emails_found,
        stats.duration_seconds
    );

    let storage = storage
        .lock()
        .map_err(|_| "storage lock poisoned after run")?;
    write_reports(cli, config, &*storage)?;

    if cli.output.is_none() && config.output.emails_path.is_none() {
        print!("{}", format_email_list(&harvested));
        println!("\nFound {} unique emails", harvested.len());
    }

    Ok(())
}

/// Writes email lists and the summary configured for this run
fn write_reports(
    cli: &Cli,
    config: &Config,
    storage: &dyn Storage,
) -> Result<(), Box<dyn std::error::Error>> {
    for category in &config.categories {
        let Some(path) = &category.output_file else {
            continue;
        };
        let records = storage.get_all_emails(&EmailFilter::for_category(category.name.as_str()))?;
        let count = write_email_list(records.iter().map(|r| r.email.as_str()), path)?;
        tracing::info!("{} emails listed in {}", count, path.display());
    }

    if let Some(path) = cli.output.as_ref().or(config.output.emails_path.as_ref()) {
        let filter = EmailFilter {
            category: cli.category.clone(),
            ..EmailFilter::default()
        };
        let records = storage.get_all_emails(&filter)?;
        let count = write_email_list(records.iter().map(|r| r.email.as_str()), path)?;
        println!("✓ {} emails written to: {}", count, path.display());
    }

    if let Some(path) = &config.output.summary_path {
        let summary = generate_summary(storage)?;
        generate_markdown_summary(&summary, path)?;
        println!("✓ Summary written to: {}", path.display());
    }

    Ok(())
}
