//! Capture front-end
//!
//! Opens a datalink channel in promiscuous mode on the preferred interface
//! (falling back to the first usable device), dissects each captured frame
//! down to its UDP payload, filters by the arena's source IPs and broadcast
//! destination, and forwards matching payloads into the dispatch queue.
//! Capture never blocks on dispatch: a full queue drops the frame with a
//! warning. Per-frame dissection failures are skipped; only the inability
//! to open a device at all is an error, and that is fatal to starting
//! capture, not to the process.

use log::{debug, info, warn};
use pnet::datalink::{self, Channel, Config, MacAddr, NetworkInterface};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Where and what to capture, supplied by the configuration collaborator.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Source IPs the arena hardware broadcasts from.
    pub source_ips: Vec<Ipv4Addr>,
    /// Broadcast destination the hardware sends to.
    pub broadcast_ip: Ipv4Addr,
    /// Hardware address of the interface to capture on, if any.
    pub preferred_mac: Option<MacAddr>,
    /// Bounded read timeout so shutdown is observed between frames.
    pub read_timeout: Duration,
}

/// Capture could not be started. The caller decides whether to retry.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no usable capture devices were found")]
    NoDevice,
    #[error("interface {0} does not provide an Ethernet channel")]
    UnsupportedChannel(String),
    #[error("failed to open capture channel on {interface}: {source}")]
    Channel {
        interface: String,
        source: io::Error,
    },
}

/// Picks the capture interface: the one matching the preferred MAC if
/// given, else the first usable device (with a warning about the fallback).
pub fn select_interface(
    interfaces: &[NetworkInterface],
    preferred_mac: Option<MacAddr>,
) -> Result<NetworkInterface, CaptureError> {
    if let Some(mac) = preferred_mac {
        if let Some(interface) = interfaces.iter().find(|i| i.mac == Some(mac)) {
            return Ok(interface.clone());
        }
        warn!(
            "Could not find the preferred interface with MAC address {}, defaulting to first usable device",
            mac
        );
    }

    interfaces
        .iter()
        .find(|i| !i.is_loopback() && i.mac.is_some())
        .or_else(|| interfaces.first())
        .cloned()
        .ok_or(CaptureError::NoDevice)
}

/// Runs the capture loop until `shutdown` is set or the dispatch queue is
/// dropped. Blocking: run it under `tokio::task::spawn_blocking`.
pub fn run_capture(
    config: CaptureConfig,
    payloads: mpsc::Sender<Vec<u8>>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), CaptureError> {
    let interfaces = datalink::interfaces();
    let interface = select_interface(&interfaces, config.preferred_mac)?;
    info!(
        "Capturing on interface {} (MAC {:?})",
        interface.name, interface.mac
    );

    let channel_config = Config {
        promiscuous: true,
        read_timeout: Some(config.read_timeout),
        ..Config::default()
    };

    let (_, mut rx) = match datalink::channel(&interface, channel_config) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => return Err(CaptureError::UnsupportedChannel(interface.name)),
        Err(source) => {
            return Err(CaptureError::Channel {
                interface: interface.name,
                source,
            })
        }
    };

    while !shutdown.load(Ordering::Relaxed) {
        let frame = match rx.next() {
            Ok(frame) => frame,
            Err(err)
                if err.kind() == io::ErrorKind::TimedOut
                    || err.kind() == io::ErrorKind::WouldBlock =>
            {
                // Read timeout: loop around and re-check the shutdown flag.
                continue;
            }
            Err(err) => {
                warn!("Capture read failed: {}", err);
                continue;
            }
        };

        let Some(payload) = extract_payload(frame, &config) else {
            continue;
        };

        debug!(
            "Captured an arena frame that aligns with the filters ({} payload bytes)",
            payload.len()
        );

        match payloads.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Dispatch queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                info!("Dispatch queue closed, stopping capture");
                break;
            }
        }
    }

    Ok(())
}

/// Dissects one link-layer frame and returns its UDP payload if the frame
/// matches the arena filter: IPv4, UDP, an allowed source, the broadcast
/// destination, and a non-empty payload. Anything else is dropped.
pub fn extract_payload(frame: &[u8], config: &CaptureConfig) -> Option<Vec<u8>> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }

    let ip = Ipv4Packet::new(ethernet.payload())?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Udp {
        return None;
    }
    if !config.source_ips.contains(&ip.get_source()) {
        return None;
    }
    if ip.get_destination() != config.broadcast_ip {
        return None;
    }

    let udp = UdpPacket::new(ip.payload())?;
    if udp.payload().is_empty() {
        return None;
    }

    Some(udp.payload().to_vec())
}
