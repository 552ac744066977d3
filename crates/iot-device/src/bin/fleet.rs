use iot_config::{Config, MultiDeviceCliArgs};
use iot_device::setup::build_orchestrator;
use iot_drivers::{Driver, RandomDataDriver};
use std::process;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(err) = run().await {
        eprintln!("iot-device-fleet: fatal: {err}");
        process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use clap::Parser;
    let args = MultiDeviceCliArgs::parse_from(std::env::args_os());
    let config = Config::load_from_path(&args.base.config)?;
    iot_logging::init(&config.raw.log)?;

    info!(num_devices = args.num_devices, "iot-device-fleet starting");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        signal_cancel.cancel();
    });

    let mut devices = JoinSet::new();
    for i in 0..args.num_devices {
        let mut raw = config.raw.clone();
        raw.device.id = format!("device-{i}");
        let cancel = cancel.clone();

        devices.spawn(async move {
            let driver: Arc<dyn Driver> = Arc::new(RandomDataDriver::new());
            let device_id = raw.device.id.clone();
            let (orchestrator, broker) =
                match build_orchestrator(&raw, device_id.clone(), driver, cancel).await {
                    Ok(pair) => pair,
                    Err(err) => {
                        error!(device_id = %device_id, error = %err, "failed to start device");
                        return;
                    }
                };
            orchestrator.run().await;
            if let Err(err) = broker.close().await {
                warn!(device_id = %device_id, error = %err, "error closing broker during shutdown");
            }
        });
    }

    while devices.join_next().await.is_some() {}

    info!("iot-device-fleet stopped");
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
