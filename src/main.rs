// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::process::ExitCode;

use anyhow::{Context, Result};
use irkerd::{
    cfg::{cli::DaemonArgs, config::Config, logger::init_logger},
    irc::{Driver, facade::RealDriver},
    listener,
    multiplexer::Multiplexer,
    pool::Pool,
};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The logger may not have initialized yet (e.g. a panic before
            // `init_logger`), so always also print to stderr.
            eprintln!("irkerd: fatal: {e:#}");
            error!(error = %e, "fatal startup error");
            ExitCode::FAILURE
        },
    }
}

async fn run() -> Result<()> {
    let args = DaemonArgs::parse(std::env::args().skip(1)).context("failed to parse arguments")?;

    let _logger_guard = init_logger(args.debug_level).context("failed to initialize logger")?;

    let cfg = Config::load_from_file("irkerd.yaml").context("failed to load configuration")?;
    info!(
        port = args.port,
        debug_level = args.debug_level,
        ttl_secs = cfg.ttl.as_secs(),
        connect_max = cfg.connect_max,
        "irkerd starting"
    );

    // The facade is asked to log one level below the daemon's own (spec.md
    // §6); the bundled `RealDriver`/`RealHandle` only emit fixed-level
    // `tracing` events, so this is recorded for operators rather than wired
    // through as a separate verbosity knob.
    let facade_level = args.debug_level.saturating_sub(1);
    tracing::debug!(facade_debug_level = facade_level, "facade logging level derived");

    let driver = Driver::new(RealDriver::new(cfg.connect_timeout));
    let pool = Pool::new(driver.clone(), cfg.connect_max, cfg.nickname_prefix.clone());
    let mux = Multiplexer::new(pool, driver.clone(), cfg.ttl, cfg.queue_soft_cap, cfg.shutdown_timeout);

    let cancel = CancellationToken::new();
    let listener_cancel = cancel.clone();
    let listener_mux = mux.clone();
    let listener_task =
        tokio::spawn(async move { listener::run(args.port, listener_mux, listener_cancel).await });

    wait_for_shutdown_signal().await?;
    info!("shutdown signal received, draining sessions");

    cancel.cancel();
    mux.shutdown().await;
    match listener_task.await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => return Err(e.into()),
        Err(e) => return Err(e.into()),
    }

    info!("irkerd exited cleanly");
    Ok(())
}

/// Waits for SIGINT or SIGTERM. Exit code 0 on clean (signal-initiated)
/// shutdown (spec.md §6).
async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
    Ok(())
}
