//! Authoritative in-memory game state and event broadcasting
//!
//! One [`GameState`] exists per process. It is explicitly constructed and
//! handed to the dispatch worker as an `Arc` — there is no ambient global.
//! All mutation goes through one mutex; events are sent on a broadcast
//! channel *after* the lock is released, from the post-mutation value, so a
//! slow or lagging subscriber can never stall or deadlock the mutation path.

use log::info;
use shared::{GameEvent, GameStatus, PlayerHit, PlayerScore};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Buffered events per subscriber before it starts observing `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
struct StateInner {
    status: GameStatus,
    time_remaining: Duration,
    game_length: Duration,
    player_scores: HashMap<u32, PlayerScore>,
}

/// The game state machine.
///
/// Cycles between `NotStarted`, `GetReady` and `InGame` for the process
/// lifetime; there is no terminal state. Every operation is total — none
/// can fail on typed input.
#[derive(Debug)]
pub struct GameState {
    inner: Mutex<StateInner>,
    events: broadcast::Sender<GameEvent>,
}

impl GameState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(StateInner {
                status: GameStatus::NotStarted,
                time_remaining: Duration::ZERO,
                game_length: Duration::ZERO,
                player_scores: HashMap::new(),
            }),
            events,
        }
    }

    /// Opens a subscription to lifecycle events. Unsubscribing is dropping
    /// the receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    pub fn current_status(&self) -> GameStatus {
        self.lock().status
    }

    pub fn time_remaining(&self) -> Duration {
        self.lock().time_remaining
    }

    pub fn game_length(&self) -> Duration {
        self.lock().game_length
    }

    pub fn player_score(&self, gun_id: u32) -> Option<PlayerScore> {
        self.lock().player_scores.get(&gun_id).cloned()
    }

    pub fn all_player_scores(&self) -> Vec<PlayerScore> {
        self.lock().player_scores.values().cloned().collect()
    }

    /// Sets the remaining game time and notifies subscribers.
    pub fn update_time_remaining(&self, time_remaining: Duration) {
        self.lock().time_remaining = time_remaining;
        self.emit(GameEvent::TimeRemainingUpdated(time_remaining));
    }

    /// Sets the configured game length. No event: length changes between
    /// games, not during them.
    pub fn update_game_length(&self, game_length: Duration) {
        self.lock().game_length = game_length;
    }

    /// Upserts one player's score sheet.
    ///
    /// First sighting of a gun id inserts the record as given; later
    /// sightings overwrite `score` and `accuracy` in place and leave
    /// `gun_name` and `team` untouched. There is never more than one entry
    /// per gun id.
    pub fn update_player_score(&self, player_score: PlayerScore) {
        let mut state = self.lock();
        match state.player_scores.entry(player_score.gun_id) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.score = player_score.score;
                existing.accuracy = player_score.accuracy;
            }
            Entry::Vacant(entry) => {
                entry.insert(player_score);
            }
        }
    }

    /// Emits a [`PlayerHit`] without touching the score table; hit deltas
    /// show up through the next score frame.
    pub fn record_hit(&self, shot_by_gun_id: u32, shot_gun_id: u32) {
        self.emit(GameEvent::PlayerHit(PlayerHit {
            shot_by_gun_id,
            shot_gun_id,
        }));
    }

    /// Transitions into a running game: status becomes `InGame`, the score
    /// table from the previous game is cleared, `GameStarted` is emitted.
    pub fn handle_game_started(&self) {
        {
            let mut state = self.lock();
            state.status = GameStatus::InGame;
            state.player_scores.clear();
        }
        info!("Game started");
        self.emit(GameEvent::GameStarted);
    }

    /// Transitions out of a running game: status becomes `NotStarted`,
    /// `GameEnded` is emitted. Scores stay readable until the next start.
    pub fn handle_game_ended(&self) {
        self.lock().status = GameStatus::NotStarted;
        info!("Game ended");
        self.emit(GameEvent::GameEnded);
    }

    /// Overwrites the status without lifecycle side effects. Used for
    /// transitions that carry no event, like `GetReady` or an `InGame`
    /// report while the arena is already counting down.
    pub fn set_status(&self, status: GameStatus) {
        self.lock().status = status;
    }

    fn emit(&self, event: GameEvent) {
        // Send only fails when there are no subscribers, which is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        // A poisoned lock means a panic elsewhere mid-mutation; every
        // mutation here leaves the state consistent, so keep going.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
