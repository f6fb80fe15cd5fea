use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::time::sleep;

use tilt_monitor::bluetooth::scanner::{parse_events, start_hci_scan, stop_hci_scan, BluezDiscovery};
use tilt_monitor::bluetooth::HciSocket;
use tilt_monitor::config::{MonitorConfig, ScanDriver};
use tilt_monitor::tilt::{distinct, TiltTable};
use tilt_monitor::utils::{build_readings, format_datetime, local_offset_or, now_local};

async fn main_loop(
    config: &MonitorConfig,
    socket: Arc<HciSocket>,
    table: &TiltTable,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Tilt logger on hci{}", socket.dev_id());

    loop {
        let batch_socket = Arc::clone(&socket);
        let batch_size = config.batch_size;
        let addressing = config.addressing;

        // Receives block, keep them off the runtime thread
        let batch = tokio::task::spawn_blocking(move || {
            parse_events(&batch_socket, batch_size, addressing)
        })
        .await?;

        match batch {
            Ok(beacons) => {
                let beacons = distinct(beacons);
                debug!("{} distinct beacons this cycle", beacons.len());

                let offset = local_offset_or(config.local_offset);
                let timestamp = format_datetime(&now_local(offset));
                let readings = build_readings(&beacons, table, &timestamp, config.celsius);
                for reading in &readings {
                    info!("{}", reading);
                }
            }
            Err(e) => error!("Batch read failed: {}", e),
        }

        sleep(config.poll_interval).await;
    }
}

async fn run(config: MonitorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let socket = match HciSocket::open(config.hci_device) {
        Ok(socket) => Arc::new(socket),
        Err(e) => {
            error!("Error accessing bluetooth device hci{}: {}", config.hci_device, e);
            return Err(e.into());
        }
    };

    let _discovery = match config.scan_driver {
        ScanDriver::Hci => {
            start_hci_scan(&socket)?;
            None
        }
        ScanDriver::Bluez => Some(BluezDiscovery::start(config.hci_device).await?),
    };

    let table = TiltTable::new();

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(&config, Arc::clone(&socket), &table) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    if config.scan_driver == ScanDriver::Hci {
        if let Err(e) = stop_hci_scan(&socket) {
            warn!("Failed to disable LE scan: {}", e);
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration while still single-threaded
    let config = match MonitorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(config));

    // A batch may still be parked in a blocking receive
    runtime.shutdown_background();
    result
}
