// # shieldsync - one-shot allow-list synchronizer
//
// This binary is a thin integration layer: it reads its environment,
// fetches the synchronizer configuration from AWS Secrets Manager, wires
// the engine through the registry, runs exactly one reconciliation pass,
// and exits. Scheduling is external (cron, EventBridge, CI); there is no
// internal loop.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `SHIELDSYNC_SECRET_NAME`: Secrets Manager secret holding the
//   synchronizer configuration JSON (required)
// - `SHIELDSYNC_SECRET_REGION`: region of that secret (required)
// - `SHIELDSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Exit codes
//
// - 0: pass completed (including completed with per-target failures;
//      those are logged and will be retried when the provider re-proposes)
// - 1: configuration could not be loaded or validated
// - 2: fatal runtime error (upstream listing failed, engine not built)

use std::env;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use tracing::{Instrument, Level, error, info, info_span, warn};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use shieldsync_core::engine::{Reconciler, RunReport};
use shieldsync_core::registry::TargetRegistry;
use shieldsync_core::Error;

/// Exit codes for the different termination scenarios
#[derive(Debug, Clone, Copy)]
enum SyncExitCode {
    /// Pass completed
    Success = 0,
    /// Configuration error
    ConfigError = 1,
    /// Fatal runtime error
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process configuration, from environment variables
struct Config {
    secret_name: String,
    secret_region: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            secret_name: env::var("SHIELDSYNC_SECRET_NAME").map_err(|_| {
                anyhow::anyhow!(
                    "SHIELDSYNC_SECRET_NAME is required. \
                    Set it via: export SHIELDSYNC_SECRET_NAME=shieldsync/config"
                )
            })?,
            secret_region: env::var("SHIELDSYNC_SECRET_REGION").map_err(|_| {
                anyhow::anyhow!(
                    "SHIELDSYNC_SECRET_REGION is required. \
                    Set it via: export SHIELDSYNC_SECRET_REGION=eu-west-1"
                )
            })?,
            log_level: env::var("SHIELDSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.secret_name.is_empty() {
            anyhow::bail!("SHIELDSYNC_SECRET_NAME cannot be empty");
        }
        if self.secret_region.is_empty() {
            anyhow::bail!("SHIELDSYNC_SECRET_REGION cannot be empty");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SHIELDSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn tracing_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return SyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("configuration error: {e}");
        return SyncExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set tracing subscriber: {e}");
        return SyncExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {e}");
            return SyncExitCode::RuntimeError.into();
        }
    };

    let run_id = Uuid::new_v4();
    let started = Instant::now();

    let outcome = rt.block_on(
        run_pass(&config).instrument(info_span!("sync", run_id = %run_id)),
    );

    let exit = match outcome {
        Ok(report) => {
            if report.has_failures() {
                warn!(
                    failed_targets = report.failed_target_count(),
                    "completed with failures; unacknowledged maps will be re-proposed"
                );
            }
            SyncExitCode::Success
        }
        Err(e) if matches!(e, Error::Config(_) | Error::Cidr(_)) => {
            error!(error = %e, "aborting: configuration invalid");
            SyncExitCode::ConfigError
        }
        Err(e) => {
            error!(error = %e, "aborting: reconciliation failed");
            SyncExitCode::RuntimeError
        }
    };

    info!(
        run_time_secs = started.elapsed().as_secs_f64(),
        exit_code = exit as u8,
        "shutting down"
    );
    exit.into()
}

/// Fetch configuration, assemble the engine, and run one pass
async fn run_pass(config: &Config) -> Result<RunReport, Error> {
    info!(secret = %config.secret_name, region = %config.secret_region, "loading configuration");
    let sync_config =
        shieldsync_target_aws::fetch_sync_config(&config.secret_name, &config.secret_region)
            .await?;
    info!(mappings = sync_config.mappings.len(), "configuration loaded");

    let registry = TargetRegistry::new();
    shieldsync_target_aws::register(&registry);
    shieldsync_source_siteshield::register(&registry);

    let (engine, mut events) = Reconciler::from_config(&sync_config, &registry).await?;

    // Keep the event channel drained; the engine drops events (with a
    // warning) when nobody reads them.
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "engine event");
        }
    });

    let result = engine.run().await;
    drain.abort();
    let report = result?;

    for map in &report.maps {
        info!(
            map_id = map.map_id,
            alias = %map.alias,
            acknowledged = map.acknowledged,
            targets = map.outcomes.len(),
            skipped = ?map.skipped,
            "map reconciled"
        );
    }
    info!(
        maps = report.maps.len(),
        acknowledged = report.acknowledged_count(),
        failed_targets = report.failed_target_count(),
        "pass complete"
    );

    Ok(report)
}
