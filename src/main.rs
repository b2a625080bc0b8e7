use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ingest_resources::config::Config;
use ingest_resources::kusto::{Authorization, KustoClient, ManagementClient};
use ingest_resources::resource::{IdentityPolicy, Manager, Registry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Inspect the ingestion resources a cluster hands out
#[derive(Parser, Debug)]
#[command(name = "ingest-resources", version, about, long_about = None)]
struct Args {
    /// Cluster endpoints (defaults to the config file's list)
    endpoints: Vec<String>,

    /// Bearer token (falls back to INGEST_RESOURCES_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Only print resources of this kind
    #[arg(short, long)]
    kind: Option<String>,

    /// Keep running and print every refresh interval
    #[arg(short, long)]
    watch: bool,

    /// Config file to read instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured identity policy
    #[arg(long, value_parser = parse_policy)]
    identity_policy: Option<IdentityPolicy>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn parse_policy(s: &str) -> Result<IdentityPolicy, String> {
    IdentityPolicy::from_str(s)
        .ok_or_else(|| format!("unknown identity policy '{}'", s))
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("ingest-resources started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("ingest-resources").join("ingest-resources.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ingest-resources").join("ingest-resources.log");
    }
    PathBuf::from("ingest-resources.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let endpoints = if args.endpoints.is_empty() {
        config.endpoints.clone()
    } else {
        args.endpoints.clone()
    };
    if endpoints.is_empty() {
        return Err(anyhow::anyhow!(
            "No endpoints given. Pass them as arguments or list them in the config file"
        ));
    }

    let auth = match args
        .token
        .clone()
        .or_else(|| std::env::var("INGEST_RESOURCES_TOKEN").ok())
    {
        Some(token) => Authorization::bearer(token),
        None => Authorization::anonymous(),
    };

    let mut manager_config = config.manager_config();
    if let Some(policy) = args.identity_policy {
        manager_config.identity_policy = policy;
    }
    let interval = manager_config.refresh_interval;
    let registry = Registry::new(manager_config);

    let mut managers: Vec<Manager> = Vec::new();
    for endpoint in &endpoints {
        let client: Arc<dyn ManagementClient> = Arc::new(KustoClient::new(endpoint, auth.clone())?);
        let manager = registry.get_or_create(client);
        if !managers.iter().any(|m| Manager::ptr_eq(m, &manager)) {
            managers.push(manager);
        }
    }

    loop {
        let outcomes = futures::future::join_all(managers.iter().map(|m| m.refresh())).await;
        for (manager, outcome) in managers.iter().zip(outcomes) {
            print_manager(manager, outcome, args.kind.as_deref());
        }

        if !args.watch {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(interval.max(Duration::from_secs(1))) => {}
        }
    }

    registry.shutdown();
    Ok(())
}

fn print_manager(manager: &Manager, outcome: ingest_resources::Result<()>, kind: Option<&str>) {
    println!("{}", manager.identity());

    if let Err(err) = outcome {
        println!("  refresh failed: {}", err);
    }

    let Some(snapshot) = manager.snapshot() else {
        println!("  no resources fetched yet");
        return;
    };

    println!(
        "  fetched {} ({} resources)",
        snapshot.fetched_at().format("%Y-%m-%d %H:%M:%S UTC"),
        snapshot.len()
    );
    for resource_kind in snapshot.kinds() {
        if kind.is_some_and(|k| k != resource_kind) {
            continue;
        }
        println!("  {}", resource_kind);
        for resource in snapshot.get(resource_kind) {
            match resource.storage_uri() {
                Ok(parsed) => println!("    {}/{}", parsed.account, parsed.object_name),
                Err(_) => println!("    {}", resource.uri()),
            }
        }
    }
}
