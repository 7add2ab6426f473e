// # netwatchd - Connectivity Daemon
//
// A thin integration layer over netwatch-core. All validation, retry and
// state logic lives in the library; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Registers the link, HTTP and ping validators
// 4. Runs one of the three flows and maps the outcome to an exit code
//
// ## Configuration
//
// ### Base file
// - `NETWATCH_CONFIG`: JSON file with validator settings (optional)
//
// ### Probes
// - `NETWATCH_HTTP_URLS`: Comma-separated URLs for the HTTP probe
// - `NETWATCH_HTTP_TIMEOUT_SECS`: Per-request timeout
// - `NETWATCH_HTTP_RETRY_BUDGET_SECS`: Retry budget (defaults to the timeout)
// - `NETWATCH_PING_HOSTS`: Comma-separated hosts for the ping probe
// - `NETWATCH_PING_TIMEOUT_MS`: Per-host timeout
// - `NETWATCH_PING_RETRY_BUDGET_MS`: Retry budget (defaults to the timeout)
//
// ### Backoff
// - `NETWATCH_BASE_RETRY_INTERVAL_MS`, `NETWATCH_MAX_RETRY_INTERVAL_MS`
// - `NETWATCH_BACKOFF_MULTIPLIER`
//
// ### Behavior
// - `NETWATCH_MODE`: check, connect or track (default: track)
// - `NETWATCH_VALIDATION`: Preset (default, all, web, ping_check) or list (link,http)
// - `NETWATCH_CONNECT_DURATION_SECS`: Duration of connect mode (default: 30)
// - `NETWATCH_VERBOSE`: Per-attempt diagnostics (true/false)
// - `NETWATCH_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export NETWATCH_MODE=connect
// export NETWATCH_VALIDATION=all
// export NETWATCH_PING_HOSTS=1.1.1.1,8.8.8.8
//
// netwatchd && echo online
// ```

mod config;

use anyhow::Result;
use config::{Config, Mode};
use netwatch_core::{ConnectionOutcome, ConnectivityEvent, ConnectivityService, ValidatorRegistry};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Connected, or clean shutdown of track mode
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
/// - 3: Not connected (check and connect modes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetwatchExitCode {
    /// Connected, or clean shutdown
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// Connectivity could not be confirmed
    Disconnected = 3,
}

impl From<NetwatchExitCode> for ExitCode {
    fn from(code: NetwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<ConnectionOutcome> for NetwatchExitCode {
    fn from(outcome: ConnectionOutcome) -> Self {
        match outcome {
            ConnectionOutcome::Connected => NetwatchExitCode::Success,
            ConnectionOutcome::Disconnected => NetwatchExitCode::Disconnected,
            // Only a shutdown signal cancels the daemon's own operations
            ConnectionOutcome::Cancelled => NetwatchExitCode::Success,
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NetwatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return NetwatchExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NetwatchExitCode::ConfigError.into();
    }

    info!(mode = %config.mode, validation = %config.validation, "Starting netwatchd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NetwatchExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                NetwatchExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Register the validators compiled into this binary
fn build_registry(config: &Arc<netwatch_core::ValidatorConfig>) -> Result<ValidatorRegistry> {
    let registry = ValidatorRegistry::new();

    #[cfg(feature = "link")]
    netwatch_link::register(&registry, config);

    #[cfg(feature = "http")]
    netwatch_probe_http::register(&registry, config)?;

    #[cfg(feature = "ping")]
    netwatch_probe_ping::register(&registry, config);

    info!(kinds = ?registry.kinds(), "Validators registered");
    Ok(registry)
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<NetwatchExitCode> {
    let validator_config = Arc::new(config.validator.clone());
    let registry = build_registry(&validator_config)?;

    for kind in config.validation.kinds() {
        if !registry.has(kind) {
            anyhow::bail!("Probe '{}' is selected but not compiled into this build", kind);
        }
    }

    let service = ConnectivityService::new(validator_config, registry)?;

    match config.mode {
        Mode::Check => {
            let outcome = service.check_connection(config.validation).await?;
            info!(?outcome, "Connection check finished");
            Ok(outcome.into())
        }
        Mode::Connect => {
            let duration = config.connect_duration();
            let outcome = tokio::select! {
                outcome = service.try_connect(duration, config.validation) => outcome?,
                signal = wait_for_shutdown() => {
                    info!("Received shutdown signal: {}", signal?);
                    service.shutdown();
                    ConnectionOutcome::Cancelled
                }
            };
            info!(?outcome, "Connect attempt finished");
            Ok(outcome.into())
        }
        Mode::Track => run_tracking(&service, &config).await,
    }
}

/// Track until a shutdown signal, logging every event
async fn run_tracking(service: &ConnectivityService, config: &Config) -> Result<NetwatchExitCode> {
    let mut events = Box::pin(service.events().stream());
    let logger = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                ConnectivityEvent::StatusChanged { connected } => {
                    info!(connected, "Connectivity changed")
                }
                ConnectivityEvent::NetworkError { error } => {
                    warn!(%error, "Tracking stopped by network error")
                }
                other => tracing::debug!(event = other.label(), "Connectivity event"),
            }
        }
    });

    let handle = service.start_tracking(config.validation);
    info!(session = handle.id(), "Tracking connectivity");

    let signal = wait_for_shutdown().await;

    service.shutdown();
    logger.abort();

    let signal = signal?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    Ok(NetwatchExitCode::Success)
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
