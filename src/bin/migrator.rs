//! Schema Migrator CLI
//!
//! Registers local Avro schemas with the schema registry.
//!
//! Usage:
//!   schema-migrator --config migrator.toml
//!   schema-migrator --root schemas --topic orders run --dry-run
//!   schema-migrator resolve

use std::path::PathBuf;

use anyhow::Context;
use avro_schema_migrator::{
    CachedRegistryClient, HttpRegistryClient, InMemoryRegistry, MigrationOrchestrator,
    MigrationReport, MigratorConfig, RegistrationStatus, RegistryClient, TopicMapping,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-migrator")]
#[command(about = "Register local Avro schemas with a schema registry")]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Registry URL (overrides config)
    #[arg(long)]
    url: Option<String>,

    /// Subject naming strategy (overrides config)
    #[arg(long)]
    strategy: Option<String>,

    /// Root directory holding one subdirectory per topic (overrides config)
    #[arg(long)]
    root: Option<String>,

    /// Topic to process under --root (repeatable)
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Explicit topic mapping as NAME=LOCATION (repeatable)
    #[arg(long = "map", value_parser = parse_mapping)]
    mappings: Vec<TopicMapping>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile schemas with the registry (default)
    Run {
        /// Reconcile against an empty in-memory registry instead
        #[arg(long)]
        dry_run: bool,

        /// Write the JSON report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List resolved topics and schema files without contacting the registry
    Resolve,

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn parse_mapping(value: &str) -> Result<TopicMapping, String> {
    let (name, location) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=LOCATION, got '{}'", value))?;
    Ok(TopicMapping::new(name.trim(), location.trim()))
}

fn load_config(cli: &Cli) -> anyhow::Result<MigratorConfig> {
    let path = cli.config.as_ref().map(|p| p.to_string_lossy().into_owned());
    let mut config = MigratorConfig::load_from(path.as_deref()).context("Failed to load configuration")?;

    if let Some(url) = &cli.url {
        config.registry.url = Some(url.clone());
    }
    if let Some(strategy) = &cli.strategy {
        config.subject.strategy = strategy.clone();
    }
    if let Some(root) = &cli.root {
        config.topics.root = Some(root.clone());
    }
    if !cli.topics.is_empty() {
        config.topics.names = cli.topics.clone();
    }
    if !cli.mappings.is_empty() {
        config.topics.mappings = cli.mappings.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = load_config(&cli)?;

    let command = cli.command.unwrap_or(Commands::Run {
        dry_run: false,
        report: None,
        format: "text".to_string(),
    });

    match command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
            Ok(0)
        }

        Commands::Resolve => {
            let resolution = config.topic_resolver()?.resolve();
            println!("🔍 Resolved {} topic(s)", resolution.topics.len());
            for topic in &resolution.topics {
                println!("📂 {} ({})", topic.name(), topic.mapping.location);
                for source in &topic.sources {
                    println!("   └─ {}", source);
                }
            }
            for warning in &resolution.warnings {
                println!("⚠️  {}", warning);
            }
            Ok(if resolution.is_empty() { 1 } else { 0 })
        }

        Commands::Run { dry_run, report, format } => {
            let settings = config.validate()?;

            let client: Box<dyn RegistryClient> = if dry_run {
                println!("🧪 Dry run: reconciling against an empty in-memory registry");
                Box::new(InMemoryRegistry::new())
            } else {
                let http = HttpRegistryClient::new(&settings.registry)?;
                Box::new(CachedRegistryClient::new(http, settings.registry.cache_capacity))
            };

            let result = MigrationOrchestrator::new(&settings, client.as_ref()).run();

            if let Some(path) = &report {
                std::fs::write(path, result.to_json()?)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                println!("✅ Report written to {:?}", path);
            }

            match format.as_str() {
                "json" => println!("{}", result.to_json()?),
                _ => print_text_report(&result),
            }

            if result.is_empty() {
                eprintln!("\n❌ No topics resolved. Check the [topics] configuration.");
                return Ok(1);
            }
            Ok(0)
        }
    }
}

fn print_text_report(report: &MigrationReport) {
    println!("📦 Schema Migration ({})", report.strategy);
    println!();

    let mut current_topic: Option<&str> = None;
    for outcome in &report.outcomes {
        if current_topic != Some(outcome.topic.as_str()) {
            println!("📂 {}", outcome.topic);
            current_topic = Some(outcome.topic.as_str());
        }

        let subject = outcome
            .subject
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        match outcome.status {
            RegistrationStatus::AlreadyRegistered => println!(
                "   ✅ {} → {} (id {}, already registered)",
                outcome.source,
                subject,
                outcome.schema_id.unwrap_or_default()
            ),
            RegistrationStatus::NewlyRegistered => println!(
                "   🆕 {} → {} (id {})",
                outcome.source,
                subject,
                outcome.schema_id.unwrap_or_default()
            ),
            RegistrationStatus::Failed => println!(
                "   ❌ {} → {}: {}",
                outcome.source,
                subject,
                outcome.error.as_ref().map(|e| e.message.as_str()).unwrap_or("unknown error")
            ),
        }
    }

    for warning in &report.warnings {
        println!("⚠️  {}", warning);
    }

    println!();
    println!("📊 Summary:");
    println!("  Newly registered:   {}", report.count(RegistrationStatus::NewlyRegistered));
    println!("  Already registered: {}", report.count(RegistrationStatus::AlreadyRegistered));
    println!("  Failed:             {}", report.count(RegistrationStatus::Failed));
    println!("  Skipped topics:     {}", report.warnings.len());
}
