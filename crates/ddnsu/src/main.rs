// # ddnsu - DDNSU daemon and command line
//
// This binary is a THIN integration layer: all reconciliation logic lives
// in ddnsu-core. It is responsible for:
// 1. Parsing the command line
// 2. Initializing logging and the runtime
// 3. Registering providers and building the one selected by `target`
// 4. Running the engine until a shutdown signal (or once, for one-shot commands)
//
// ## Commands
//
// - `start`: run a pass now, then every `updateFrequency` milliseconds
// - `once`:  run a single pass and exit
// - `purge`: delete every DDNSU-tagged record on every configured provider and exit
// - `check`: validate the configuration file without touching the network
//
// ## Environment
//
// - `DDNSU_CONFIG`: configuration file path (default `./ddnsu.toml`)
// - `DDNSU_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `CLOUDFLARE_AUTH_TOKEN` / `VERCEL_AUTH_TOKEN`: override file tokens
//
// ## Example
//
// ```bash
// export CLOUDFLARE_AUTH_TOKEN=your_token
// ddnsu --config /etc/ddnsu/ddnsu.toml start
// ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use ddnsu_core::config::DdnsuConfig;
use ddnsu_core::traits::ConfigStore;
use ddnsu_core::{DdnsuEngine, EngineEvent, FileConfigStore, IpResolver, ProviderRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsuExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DdnsuExitCode> for ExitCode {
    fn from(code: DdnsuExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl DdnsuExitCode {
    fn for_error(err: &ddnsu_core::Error) -> Self {
        match err {
            ddnsu_core::Error::Config(_) | ddnsu_core::Error::Authentication(_) => Self::ConfigError,
            _ => Self::RuntimeError,
        }
    }
}

/// Keep DNS records pointed at this machine's public address
#[derive(Debug, Parser)]
#[command(name = "ddnsu", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, short, env = "DDNSU_CONFIG", default_value = "ddnsu.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run passes on the configured interval until interrupted
    Start,
    /// Run a single pass and exit
    Once,
    /// Delete every DDNSU-managed record and exit
    Purge,
    /// Validate the configuration without network access
    Check,
}

fn log_level_from_env() -> Result<Level> {
    let raw = std::env::var("DDNSU_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DDNSU_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match log_level_from_env() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsuExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsuExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsuExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(cli)).into()
}

async fn run(cli: Cli) -> DdnsuExitCode {
    let store = FileConfigStore::new(&cli.config);

    let config = match load_valid_config(&store).await {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error in {}: {}", cli.config.display(), e);
            return DdnsuExitCode::ConfigError;
        }
    };

    if cli.command == Command::Check {
        print_summary(&cli.config, &config);
        return DdnsuExitCode::CleanShutdown;
    }

    let (engine, events) = match build_engine(store, &config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {}", e);
            return DdnsuExitCode::for_error(&e);
        }
    };
    let event_log = tokio::spawn(log_events(events));

    let code = match cli.command {
        Command::Start => run_daemon(&engine, config.update_frequency).await,
        Command::Once => match engine.run_once().await {
            Ok(report) => {
                if !report.is_clean() {
                    warn!("Pass completed with failures; the next pass will retry them");
                }
                DdnsuExitCode::CleanShutdown
            }
            Err(e) => DdnsuExitCode::for_error(&e),
        },
        Command::Purge => match engine.purge_all().await {
            Ok(report) if report.is_clean() => DdnsuExitCode::CleanShutdown,
            Ok(report) => {
                error!(
                    "Purge incomplete: {} failure(s), {} domain(s) skipped",
                    report.failure_count(),
                    report.skipped.len()
                );
                DdnsuExitCode::RuntimeError
            }
            Err(e) => {
                error!("Purge failed: {}", e);
                DdnsuExitCode::for_error(&e)
            }
        },
        Command::Check => DdnsuExitCode::CleanShutdown,
    };

    drop(engine);
    let _ = event_log.await;
    code
}

async fn load_valid_config(store: &FileConfigStore) -> ddnsu_core::Result<DdnsuConfig> {
    let config = store.load().await?;
    config.validate()?;
    // Fails here, before any network activity, when no token resolves.
    config.provider_config()?;
    Ok(config)
}

/// Register the built-in providers and build the engine for `config`
fn build_engine(
    store: FileConfigStore,
    config: &DdnsuConfig,
) -> ddnsu_core::Result<(DdnsuEngine, mpsc::Receiver<EngineEvent>)> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    ddnsu_provider_cloudflare::register(&registry);

    #[cfg(feature = "vercel")]
    ddnsu_provider_vercel::register(&registry);

    debug!("Registered providers: {:?}", registry.list_providers());

    let provider_config = config.provider_config()?;
    info!("Using {:?}", provider_config);
    let provider = registry.create_provider(&provider_config)?;

    let sources = ddnsu_ip_http::sources_from(&config.additional_ip_providers);
    info!("Resolving public IP from {} endpoint(s)", sources.len());

    let (mut engine, events) = DdnsuEngine::new(IpResolver::new(sources), provider, Box::new(store));

    for target in config.inactive_targets() {
        match config
            .provider_config_for(target)
            .and_then(|inactive| registry.create_provider(&inactive))
        {
            Ok(inactive) => {
                info!(
                    "Purging {} domain(s) on {} too when rebuilding",
                    config.domains_for(target).len(),
                    target
                );
                engine = engine.with_purge_provider(inactive);
            }
            Err(e) => warn!("{} records will not be purged: {}", target, e),
        }
    }

    Ok((engine, events))
}

/// Run the scheduler until SIGTERM/SIGINT
async fn run_daemon(engine: &DdnsuEngine, interval_ms: u64) -> DdnsuExitCode {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Starting ddnsu daemon");
    let result = engine.run_with_shutdown(interval_ms, Some(shutdown_rx)).await;
    signals.abort();

    match result {
        Ok(()) => {
            info!("Shutting down daemon");
            DdnsuExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            DdnsuExitCode::for_error(&e)
        }
    }
}

async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

fn print_summary(path: &std::path::Path, config: &DdnsuConfig) {
    println!("Configuration OK: {}", path.display());
    println!("  target:     {}", config.target.as_deref().unwrap_or_default());
    println!("  interval:   {}ms", config.update_frequency);
    if let Ok(domains) = config.domain_targets() {
        println!("  domains:    {}", domains.join(", "));
    }
    for target in config.inactive_targets() {
        println!(
            "  purge-only: {} ({})",
            target,
            config.domains_for(target).join(", ")
        );
    }
    println!(
        "  endpoints:  {} default + {} additional",
        ddnsu_ip_http::DEFAULT_ENDPOINTS.len(),
        config.additional_ip_providers.len()
    );
    println!("  records:");
    for record in &config.records {
        let name = if record.is_apex() { "(apex)" } else { record.name.as_str() };
        println!(
            "    {:<6} {:<24} ttl={:<6} {}",
            record.record_type.as_str(),
            name,
            record.ttl,
            record.tag()
        );
    }
    match &config.past {
        Some(past) if !past.is_empty() => println!("  committed:  {}", past),
        _ => println!("  committed:  (none, next pass is a first run)"),
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
