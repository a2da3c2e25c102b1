// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Daemon entry point: logging, configuration discovery, service wiring.

use std::path::PathBuf;
use std::sync::Arc;

use olsync_core::Config;
use olsync_engine::{LogLifecycle, LogStatusSink, SyncService};
use olsync_outlook::UnavailableHost;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = Config::discover()?;
    let config = Config::load(&path)?;
    let _log_guard = init_logging(&config);
    tracing::info!(config = %path.display(), "olsync starting");

    // The platform automation host plugs in here; without one the service
    // runs in no-data mode and leaves the destination untouched.
    let host = Box::new(UnavailableHost);

    let service = SyncService::new(
        config,
        host,
        Arc::new(LogStatusSink),
        Arc::new(LogLifecycle),
    )?;

    let shutdown = service.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown.shutdown();
        }
    });

    service.run().await;
    Ok(())
}

/// Installs the rolling file sink next to the executable, teed to stderr.
///
/// The returned guard flushes the file writer on drop; hold it for the
/// process lifetime.
fn init_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));

    let log_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"));

    let appender = tracing_appender::rolling::daily(log_dir, "olsync.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file_writer.and(std::io::stderr))
        .with_ansi(false)
        .init();

    Some(guard)
}
