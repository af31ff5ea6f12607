//! Serializing dispatch worker
//!
//! Capture pushes raw UDP payloads into a bounded queue; one worker drains
//! it and applies frames to the game state in arrival order. Serializing
//! through a single consumer is what keeps state transitions ordered even
//! though capture never waits for a frame to be handled. Per-frame errors
//! are logged and the frame is dropped — nothing that happens to one frame
//! can take down the worker or affect the next frame.

use crate::game::GameState;
use log::{debug, error, info, warn};
use shared::{classify, ArenaPacket, DecodedFrame, GameStatus, PlayerScore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Drains the payload queue until capture drops the sending side.
pub async fn run_dispatcher(state: Arc<GameState>, mut payloads: mpsc::Receiver<Vec<u8>>) {
    while let Some(payload) = payloads.recv().await {
        process_payload(&state, &payload);
    }
    info!("Payload queue closed, dispatch worker exiting");
}

/// Decodes, classifies and applies one payload. Errors are logged at the
/// level the taxonomy assigns: unknown codes are expected on a shared
/// network and warrant a warning, malformed frames are errors.
pub fn process_payload(state: &GameState, payload: &[u8]) {
    let frame = match DecodedFrame::from_payload(payload) {
        Ok(frame) => frame,
        Err(err) => {
            error!("Dropping undecodable payload ({} bytes): {}", payload.len(), err);
            return;
        }
    };

    apply_frame(state, &frame);
}

/// Classifies an already-decoded frame and applies it.
pub fn apply_frame(state: &GameState, frame: &DecodedFrame) {
    match classify(frame) {
        Ok(packet) => apply_packet(state, packet),
        Err(err) if err.is_unknown_code() => {
            warn!("Dropping frame {:?}: {}", frame.raw, err);
        }
        Err(err) => {
            error!("Dropping frame {:?}: {}", frame.raw, err);
        }
    }
}

/// Folds one classified packet into the game state.
pub fn apply_packet(state: &GameState, packet: ArenaPacket) {
    match packet {
        ArenaPacket::Timing { time_left_secs } => apply_timing(state, time_left_secs),
        ArenaPacket::TeamScore => {
            // Derivable from per-player scores; deliberately not processed.
            debug!("Ignoring team score frame");
        }
        ArenaPacket::PlayerScore {
            gun_id,
            score,
            accuracy,
        } => {
            state.update_player_score(PlayerScore::new(gun_id, score, accuracy));
            info!(
                "Player score updated: gun_id={}, score={}, accuracy={}",
                gun_id, score, accuracy
            );
        }
        ArenaPacket::StatusChanged(status) => apply_status(state, status),
        ArenaPacket::SettingsChanged {
            game_length_mins,
            sound_set,
            game_mode,
        } => {
            if let Some(mins) = game_length_mins {
                state.update_game_length(Duration::from_secs(u64::from(mins) * 60));
                info!("Game length updated to {} minutes", mins);
            }
            // Numeric meaning of these two is unresolved upstream; surface
            // the raw values and move on.
            if let Some(value) = sound_set {
                debug!("Sound set setting changed (raw value {})", value);
            }
            if let Some(value) = game_mode {
                debug!("Game mode setting changed (raw value {})", value);
            }
        }
        ArenaPacket::ShotConfirmed {
            shot_by_gun_id,
            shot_gun_id,
        } => {
            info!(
                "Shot confirmed: shooter gun_id={}, target gun_id={}",
                shot_by_gun_id, shot_gun_id
            );
            state.record_hit(shot_by_gun_id, shot_gun_id);
        }
    }
}

/// Timing frames drive the start/end lifecycle.
///
/// The hardware keeps repeating the zero-time frame after a game ends, so
/// the end transition only fires on the first one of a run. A positive time
/// while no game is running means we joined mid-countdown or the status
/// frame got lost: start the game before applying the time.
fn apply_timing(state: &GameState, time_left_secs: i64) {
    if time_left_secs <= 0 {
        if state.current_status() == GameStatus::NotStarted {
            return;
        }
        info!("Game end detected from timing frame");
        state.handle_game_ended();
    } else {
        if state.current_status() == GameStatus::NotStarted {
            info!("Game start detected from timing frame");
            state.handle_game_started();
        }
        state.update_time_remaining(Duration::from_secs(time_left_secs as u64));
        debug!("Time left updated to {} seconds", time_left_secs);
    }
}

/// Status frames set the phase directly; only the edges into and out of a
/// running game carry lifecycle events.
fn apply_status(state: &GameState, status: GameStatus) {
    let current = state.current_status();
    match status {
        GameStatus::NotStarted if current != GameStatus::NotStarted => {
            state.handle_game_ended();
        }
        GameStatus::InGame
            if current != GameStatus::InGame && current != GameStatus::GetReady =>
        {
            state.handle_game_started();
        }
        // Idempotent repeats, GetReady, and InGame-after-countdown just
        // record the status.
        _ => state.set_status(status),
    }
}
