//! # Arena Telemetry Sniffer
//!
//! Real-time ingestion engine for the laser-tag arena's proprietary UDP
//! broadcast protocol. The arena hardware periodically broadcasts frames
//! carrying game timing, per-player scores, status transitions and
//! shot-confirmation events; this crate captures them off the wire and
//! folds them into a live game-state model that downstream consumers
//! (score displays, the playback relay) subscribe to.
//!
//! ## Pipeline
//!
//! ```text
//! capture (promiscuous datalink read, IP filter)
//!     → bounded payload queue
//!     → dispatch worker (decode → classify → apply, in arrival order)
//!     → GameState (one mutex, mutation methods)
//!     → broadcast channel (GameStarted / GameEnded / PlayerHit /
//!       TimeRemainingUpdated)
//! ```
//!
//! Capture runs on a dedicated blocking task and never waits for frame
//! handling; the single dispatch worker is what serializes state mutation,
//! so transitions are applied in frame-arrival order even under bursts
//! (the queue is bounded — overflow drops frames rather than growing).
//! No error from one frame can terminate capture or affect the next frame.
//!
//! ## Module organization
//!
//! - [`capture`] — interface selection, promiscuous capture loop,
//!   Ethernet/IPv4/UDP dissection and the source/broadcast filter
//! - [`dispatch`] — the serializing worker applying classified packets
//! - [`game`] — the state machine and its event subscription surface
//!
//! The wire format itself (hex-encoded ASCII, comma-separated fields,
//! leading packet-type code) lives in the `shared` crate.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sniffer::capture::{run_capture, CaptureConfig};
//! use sniffer::dispatch::run_dispatcher;
//! use sniffer::game::GameState;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CaptureConfig {
//!         source_ips: vec!["192.168.0.10".parse().unwrap()],
//!         broadcast_ip: "192.168.0.255".parse().unwrap(),
//!         preferred_mac: None,
//!         read_timeout: Duration::from_millis(1000),
//!     };
//!
//!     let state = Arc::new(GameState::new());
//!     let mut events = state.subscribe();
//!
//!     let (tx, rx) = mpsc::channel(1024);
//!     let shutdown = Arc::new(AtomicBool::new(false));
//!     tokio::spawn(run_dispatcher(Arc::clone(&state), rx));
//!     tokio::task::spawn_blocking(move || run_capture(config, tx, shutdown));
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod capture;
pub mod dispatch;
pub mod game;
