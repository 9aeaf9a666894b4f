use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use args::DaemonOptions;
use control::{control_address, ControlServer};
use processing::{event::TrackerEvent, TrackerModule};
use ticker::TickModule;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    storage::state_store::RedundantStateStore,
    tracker::{audit::FileAuditLog, Tracker, TrackerConfig},
    utils::{
        clock::{Clock, DefaultClock},
        dir::audit_log_path,
    },
};

pub mod args;
pub mod control;
pub mod processing;
pub mod shutdown;
pub mod ticker;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, port: u16, options: &DaemonOptions) -> Result<()> {
    let dir = std::path::absolute(dir)?;
    std::env::set_current_dir("/")?;

    // Binding first makes a second daemon fail before it touches the state files.
    let listener = TcpListener::bind(control_address(port))
        .await
        .with_context(|| format!("Control port {port} is taken, is the daemon running?"))?;

    run_daemon(
        dir,
        listener,
        options.tracker_config(),
        options.tick_interval(),
        CancellationToken::new(),
        DefaultClock,
    )
    .await
}

async fn run_daemon(
    dir: PathBuf,
    listener: TcpListener,
    config: TrackerConfig,
    tick_interval: Duration,
    shutdown_token: CancellationToken,
    clock: impl Clock + Clone,
) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<TrackerEvent>(10);

    let store = RedundantStateStore::in_dir(&dir)?;
    let audit = FileAuditLog::new(audit_log_path(&dir));
    let tracker = Tracker::open(store, audit, config, clock.time()).await;
    let (processor, views) = TrackerModule::start(receiver, tracker, Box::new(clock.clone())).await;
    info!("Tracker started with {:?}", *views.borrow());

    let ticker = TickModule::new(
        sender.clone(),
        shutdown_token.clone(),
        tick_interval,
        Box::new(clock),
    );
    let control = ControlServer::new(listener, sender, views, shutdown_token.clone());

    let (_, tick_result, control_result, processing_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        ticker.run(),
        control.run(),
        processor.run(),
    );

    if let Err(tick_result) = tick_result {
        error!("Tick module got an error {:?}", tick_result);
    }

    if let Err(control_result) = control_result {
        error!("Control server got an error {:?}", control_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Tracker module got an error {:?}", processing_result);
    }

    Ok(())
}
