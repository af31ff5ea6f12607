use clap::Parser;
use log::{error, info};
use pnet::datalink::MacAddr;
use sniffer::capture::{run_capture, CaptureConfig};
use sniffer::dispatch::run_dispatcher;
use sniffer::game::GameState;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Main-method of the application.
/// Parses command-line arguments, then wires the capture loop to the
/// dispatch worker and waits for Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Source IPs the arena hardware broadcasts from
        #[clap(
            short,
            long,
            value_delimiter = ',',
            default_value = "192.168.0.10,192.168.0.11"
        )]
        sources: Vec<Ipv4Addr>,
        /// Broadcast destination IP the hardware sends to
        #[clap(short, long, default_value = "192.168.0.255")]
        broadcast: Ipv4Addr,
        /// MAC address of the preferred capture interface
        #[clap(short, long)]
        interface_mac: Option<String>,
        /// Capture read timeout in milliseconds
        #[clap(short = 't', long, default_value = "1000")]
        read_timeout_ms: u64,
        /// Dispatch queue depth (frames buffered during bursts)
        #[clap(short, long, default_value = "1024")]
        queue_depth: usize,
    }

    env_logger::init();

    let args = Args::parse();

    let preferred_mac = args
        .interface_mac
        .as_deref()
        .map(|mac| mac.parse::<MacAddr>())
        .transpose()
        .map_err(|err| format!("invalid interface MAC address: {}", err))?;

    let config = CaptureConfig {
        source_ips: args.sources,
        broadcast_ip: args.broadcast,
        preferred_mac,
        read_timeout: Duration::from_millis(args.read_timeout_ms),
    };

    let state = Arc::new(GameState::new());
    let (payload_tx, payload_rx) = mpsc::channel(args.queue_depth);
    let shutdown = Arc::new(AtomicBool::new(false));

    // Echo lifecycle events; real consumers subscribe the same way.
    let mut events = state.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("Event: {:?}", event);
        }
    });

    let worker = tokio::spawn(run_dispatcher(Arc::clone(&state), payload_rx));

    let mut capture = {
        let shutdown = Arc::clone(&shutdown);
        tokio::task::spawn_blocking(move || run_capture(config, payload_tx, shutdown))
    };

    // Run until capture stops on its own or Ctrl+C asks it to.
    let capture_result = tokio::select! {
        result = &mut capture => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.store(true, Ordering::Relaxed);
            None
        }
    };

    let capture_result = match capture_result {
        Some(result) => result,
        None => capture.await,
    };

    match capture_result {
        Ok(Ok(())) => info!("Capture loop stopped"),
        Ok(Err(err)) => error!("Failed to start capture: {}", err),
        Err(err) => error!("Capture task panicked: {}", err),
    }

    // Capture dropped its queue handle; let the worker drain what is left.
    worker.await?;

    Ok(())
}
