//! opxdiag - Diagnostic Bundle Collector for OPX Switch Platforms
//!
//! A CLI tool that runs diagnostic plugins and gathers their command
//! output captures, file copies, and alerts into a support bundle.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, staging, plugin setup failure, etc.)
//!   2 - Collection steps failed or alerts raised (with --strict)

mod cli;
mod collector;
mod config;
mod models;
mod plugin;
mod process;
mod report;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cli::{Args, OutputFormat};
use collector::{CollectOptions, Collector, PluginSetup};
use config::Config;
use models::{CollectionReport, CollectionSummary, ReportMetadata};
use plugin::{PluginRegistry, SetupContext};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("opxdiag v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the collection
    match run_collection(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Collection failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .opxdiag.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".opxdiag.toml");

    if path.exists() {
        eprintln!("⚠️  .opxdiag.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .opxdiag.toml")?;

    println!("✅ Created .opxdiag.toml with default settings.");
    println!("   Edit it to customize output directory, timeouts, and report format.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete collection workflow. Returns exit code (0 or 2).
async fn run_collection(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let registry = PluginRegistry::builtin();

    // Handle --list-plugins: print the registry and exit
    if args.list_plugins {
        return handle_list_plugins(&registry);
    }

    // Step 1: Select plugins
    let only = args.only_plugins();
    let skip = args.skip_plugins();
    let selected = registry.select(args.profile.as_deref(), &only, &skip);

    if selected.is_empty() {
        anyhow::bail!("no plugins match the requested selection");
    }

    // Step 2: Run plugin setups (registration only, nothing executes yet)
    let mut setups = Vec::with_capacity(selected.len());
    for plugin in &selected {
        info!("Running setup for plugin: {}", plugin.name());
        let mut ctx = SetupContext::new(plugin.name());
        plugin
            .setup(&mut ctx)
            .with_context(|| format!("setup failed for plugin '{}'", plugin.name()))?;

        setups.push(PluginSetup {
            name: plugin.name().to_string(),
            profiles: plugin.profiles().iter().map(|s| s.to_string()).collect(),
            registrations: ctx.into_registrations(),
        });
    }

    // Handle --dry-run: show registrations and exit
    if args.dry_run {
        return handle_dry_run(&setups);
    }

    // Step 3: Stage the bundle
    let hostname = process::hostname();
    let started_at = Utc::now();
    let destination = bundle_destination(
        Path::new(&config.general.output_dir),
        &hostname,
        &started_at,
        args.label.as_deref(),
    );

    println!("📥 Collecting diagnostics from {} plugin(s)...", setups.len());
    println!("   Bundle: {}", destination.display());

    let opts = CollectOptions {
        default_timeout: config
            .collect
            .command_timeout
            .map(std::time::Duration::from_secs),
        max_output_bytes: config.collect.max_output_bytes,
        show_progress: config.collect.progress && !args.quiet,
    };
    let collector = Collector::stage(destination, opts)?;

    // Step 4: Execute registrations
    let records = collector.collect(setups).await?;

    // Step 5: Build the report
    let duration = start_time.elapsed().as_secs_f64();
    let summary = CollectionSummary::from_records(&records);

    let metadata = ReportMetadata {
        hostname,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        collection_date: started_at,
        duration_seconds: duration,
        plugins_run: records.len(),
    };

    let collection_report = CollectionReport {
        metadata,
        plugins: records,
        summary: summary.clone(),
    };

    // Step 6: Write reports and persist the bundle
    collector.write_bundle_file(
        "manifest.json",
        &report::generate_json_report(&collection_report)?,
    )?;

    let format = args
        .format
        .unwrap_or_else(|| OutputFormat::from_config_name(&config.report.format));
    if format == OutputFormat::Markdown {
        collector.write_bundle_file(
            "report.md",
            &report::generate_markdown_report(&collection_report),
        )?;
    }

    let bundle_path = collector.persist()?;

    // Surface plugin alerts to the operator
    for record in &collection_report.plugins {
        for alert in &record.alerts {
            println!("{}  {}", alert.level.emoji(), alert.message);
            warn!("[{}] {}", record.name, alert.message);
        }
    }

    // Print summary
    println!("\n📊 Collection Summary:");
    println!("   Plugins run: {}", collection_report.metadata.plugins_run);
    println!(
        "   Commands captured: {} ({} failed, {} timed out)",
        summary.commands_total, summary.commands_failed, summary.commands_timed_out
    );
    println!(
        "   Files copied: {} ({} registered paths missing)",
        summary.files_copied, summary.files_missing
    );
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Collection complete! Bundle at: {}",
        bundle_path.display()
    );

    // Check --strict threshold
    if config.general.strict && !summary.is_clean() {
        eprintln!("\n⛔ Collection finished with failures or alerts. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Handle --list-plugins: print names and profiles, exit.
fn handle_list_plugins(registry: &PluginRegistry) -> Result<i32> {
    println!("Available plugins:\n");
    for plugin in registry.iter() {
        println!("   📦 {} ({})", plugin.name(), plugin.profiles().join(", "));
    }
    Ok(0)
}

/// Handle --dry-run: print registrations, exit.
fn handle_dry_run(setups: &[PluginSetup]) -> Result<i32> {
    println!("\n🔍 Dry run: showing registrations (nothing is executed)...\n");

    for setup in setups {
        println!("   Plugin: {}", setup.name);

        for spec in &setup.registrations.commands {
            match spec.timeout_secs {
                Some(secs) => println!("     🖥️  {} (timeout: {}s)", spec.command, secs),
                None => println!("     🖥️  {}", spec.command),
            }
        }
        for spec in &setup.registrations.copy_specs {
            println!("     📄 copy {}", spec.path);
        }
        for alert in &setup.registrations.alerts {
            println!("     ⚠️  alert: {}", alert.message);
        }
        println!();
    }

    println!("✅ Dry run complete. No commands were run.");
    Ok(0)
}

/// Build the bundle destination path: `<output_dir>/opxdiag-<host>-<stamp>[-label]`.
fn bundle_destination(
    output_dir: &Path,
    hostname: &str,
    started_at: &DateTime<Utc>,
    label: Option<&str>,
) -> PathBuf {
    let mut name = format!(
        "opxdiag-{}-{}",
        hostname,
        started_at.format("%Y%m%d-%H%M%S")
    );
    if let Some(label) = label {
        name.push('-');
        name.push_str(label);
    }
    output_dir.join(name)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .opxdiag.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
