//! archivist CLI
//!
//! Entry point for the `archivist` command-line tool.

use archivist::archive::{ArchiveNaming, RetentionPlan};
use archivist::client::{Deployment, ServiceDescription, PRIMARY_DEPLOYMENT};
use archivist::config::{EffectiveConfig, DEFAULT_CONFIG_PATH};
use archivist::health::{HealthReport, HealthSummary, PollOutcome};
use archivist::logging::{self, LogFormat};
use archivist::{evaluate_redeploy, IdentifierFormat, RetentionSelector, TimestampParser};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "archivist")]
#[command(about = "Tiered snapshot archiving and service upkeep", version)]
struct Cli {
    /// Path to config file (default: ./archivist.toml when present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide which snapshot identifiers to keep
    Retain {
        /// File with one identifier per line (default: stdin)
        #[arg(long)]
        ids: Option<PathBuf>,

        /// strftime pattern the identifiers were generated with
        #[arg(long, conflicts_with = "db")]
        format: Option<String>,

        /// Database whose archived copies are listed (overrides config)
        #[arg(long)]
        db: Option<String>,

        /// Reference time (RFC 3339, default: now)
        #[arg(long)]
        now: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check whether a deployment is due for a redeploy
    RedeployCheck {
        /// Creation time of the primary deployment (RFC 3339)
        #[arg(long)]
        deployed_at: String,

        /// Maximum deployment age in seconds (overrides config)
        #[arg(long)]
        max_age_seconds: Option<u64>,

        /// Reference time (RFC 3339, default: now)
        #[arg(long)]
        now: Option<String>,
    },

    /// Summarise task health documents into metrics
    HealthSummary {
        /// JSON array of /health documents
        #[arg(long)]
        reports: PathBuf,

        /// Reference time (RFC 3339, default: now)
        #[arg(long)]
        now: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    logging::init(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    match cli.command {
        Commands::Retain {
            ids,
            format,
            db,
            now,
            json,
        } => {
            let overrides = db.map(|db| json!({ "archive": { "db_identifier": db } }));
            let config = load_config(cli.config, overrides);
            run_retain(&config, ids, format, now, json);
        }
        Commands::Config { json } => {
            let config = load_config(cli.config, None);
            run_config(&config, json);
        }
        Commands::RedeployCheck {
            deployed_at,
            max_age_seconds,
            now,
        } => {
            let overrides =
                max_age_seconds.map(|s| json!({ "redeploy": { "max_age_seconds": s } }));
            let config = load_config(cli.config, overrides);
            run_redeploy_check(&config, &deployed_at, now);
        }
        Commands::HealthSummary { reports, now } => {
            let config = load_config(cli.config, None);
            run_health_summary(&config, &reports, now);
        }
    }
}

fn load_config(config_path: Option<PathBuf>, overrides: Option<Value>) -> EffectiveConfig {
    let path = config_path.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        default.exists().then_some(default)
    });

    match EffectiveConfig::build(path.as_deref(), std::env::vars(), overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    }
}

fn parse_now(now: Option<String>) -> DateTime<Utc> {
    match now {
        None => Utc::now(),
        Some(raw) => parse_time("--now", &raw),
    }
}

fn parse_time(flag: &str, raw: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            eprintln!("Error parsing {} '{}': {}", flag, raw, e);
            process::exit(1);
        }
    }
}

fn read_ids(path: Option<&Path>) -> Vec<String> {
    let contents = match path {
        Some(p) => fs::read_to_string(p),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map(|_| buf)
        }
    };

    match contents {
        Ok(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            eprintln!("Error reading identifiers: {}", e);
            process::exit(1);
        }
    }
}

fn run_retain(
    config: &EffectiveConfig,
    ids_path: Option<PathBuf>,
    format: Option<String>,
    now: Option<String>,
    json_output: bool,
) {
    let settings = config.settings();
    let now = parse_now(now);
    let mut ids = read_ids(ids_path.as_deref());

    let parser: Box<dyn TimestampParser> = match format {
        Some(pattern) => match IdentifierFormat::new(pattern) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        None => {
            let naming = match settings
                .require_db_identifier()
                .map_err(|e| e.to_string())
                .and_then(|db| ArchiveNaming::new(db).map_err(|e| e.to_string()))
            {
                Ok(n) => n,
                Err(e) => {
                    eprintln!("Error: {} (or pass --format)", e);
                    process::exit(1);
                }
            };
            ids.retain(|id| {
                let archived = naming.matches(id);
                if !archived {
                    tracing::debug!(id = %id, "ignoring identifier that is not an archived copy");
                }
                archived
            });
            Box::new(naming.format().clone())
        }
    };

    let selector = RetentionSelector::new(settings.retention.clone());
    let plan = match RetentionPlan::build(&ids, parser.as_ref(), &selector, now) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error applying retention: {}", e);
            process::exit(1);
        }
    };

    if json_output {
        match serde_json::to_string_pretty(&plan) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        for id in &plan.retained {
            println!("keep   {}", id);
        }
        for id in &plan.delete {
            println!("delete {}", id);
        }
        eprintln!(
            "{} kept, {} to delete",
            plan.retained.len(),
            plan.delete.len()
        );
    }
}

fn run_config(config: &EffectiveConfig, json_output: bool) {
    if json_output {
        match config.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Sources:");
    for source in &config.sources {
        let mut line = format!("  {:?}", source.origin).to_lowercase();
        if let Some(path) = &source.path {
            line.push_str(&format!(" {}", path));
        }
        if let Some(digest) = &source.digest {
            line.push_str(&format!(" (sha256 {})", &digest[..digest.len().min(12)]));
        }
        if !source.keys.is_empty() {
            line.push_str(&format!(" [{}]", source.keys.join(", ")));
        }
        println!("{}", line);
    }

    let settings = config.settings();
    println!();
    println!("Retention tiers:");
    for tier in settings.retention.tiers() {
        println!(
            "  age <= {:>4} days: keep one every {} days",
            tier.max_age_days, tier.required_gap_days
        );
    }
    println!(
        "  older:             keep one every {} days",
        settings.retention.default_gap_days()
    );
    println!();
    println!(
        "Database:            {}",
        settings.archive.db_identifier.as_deref().unwrap_or("(unset)")
    );
    println!("Latest max age:      {}h", settings.archive.max_latest_age_hours);
    println!("Redeploy max age:    {}s", settings.redeploy.max_age_seconds);
    println!("Dry run:             {}", settings.archive.dry_run);
}

fn run_redeploy_check(config: &EffectiveConfig, deployed_at: &str, now: Option<String>) {
    let settings = config.settings();
    let now = parse_now(now);
    let deployed_at = parse_time("--deployed-at", deployed_at);

    let service = ServiceDescription {
        name: settings
            .ecs
            .service
            .clone()
            .unwrap_or_else(|| "service".to_string()),
        deployments: vec![Deployment {
            id: "primary".to_string(),
            status: PRIMARY_DEPLOYMENT.to_string(),
            created_at: deployed_at,
        }],
        load_balancers: Vec::new(),
    };

    let decision = match evaluate_redeploy(&[service], now, settings.redeploy.max_age_seconds) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&decision) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_health_summary(config: &EffectiveConfig, reports_path: &Path, now: Option<String>) {
    let now = parse_now(now);

    let reports: Vec<HealthReport> = match fs::read_to_string(reports_path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error reading health reports from {}: {}", reports_path.display(), e);
            process::exit(1);
        }
    };

    let outcomes: Vec<PollOutcome> = reports.into_iter().map(PollOutcome::Healthy).collect();
    let summary = HealthSummary::aggregate(&outcomes, now);

    let output = json!({
        "namespace": config.settings().health.metric_namespace,
        "metrics": summary.metrics(now),
    });
    match serde_json::to_string_pretty(&output) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}
