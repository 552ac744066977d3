use iot_config::Config;
use iot_device::setup::build_orchestrator;
use iot_drivers::{Driver, RandomDataDriver};
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(err) = run().await {
        eprintln!("iot-device: fatal: {err}");
        process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_args::<_, std::ffi::OsString>(std::env::args_os())?;
    iot_logging::init(&config.raw.log)?;

    info!(device_id = %config.raw.device.id, "iot-device starting");

    let cancel = CancellationToken::new();
    let driver: Arc<dyn Driver> = Arc::new(RandomDataDriver::new());

    let (orchestrator, broker) = build_orchestrator(
        &config.raw,
        config.raw.device.id.clone(),
        driver,
        cancel.clone(),
    )
    .await?;

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        signal_cancel.cancel();
    });

    orchestrator.run().await;

    if let Err(err) = broker.close().await {
        error!(error = %err, "error closing broker connection during shutdown");
    }

    info!("iot-device stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
