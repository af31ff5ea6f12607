//! Wire protocol for the arena's UDP broadcast telemetry
//!
//! The arena hardware broadcasts frames whose UDP payload is hex-encoded
//! ASCII text: every payload byte renders as two hex digits, and every
//! two-digit group decodes back to one ASCII character. The decoded string
//! is a comma-separated field list whose first field is the packet-type
//! code. This crate owns that format end to end:
//!
//! - [`DecodedFrame`] — payload bytes decoded into the raw string plus its
//!   ordered fields
//! - [`classify`] — packet-type dispatch into the [`ArenaPacket`] sum type
//! - the domain types carried by the state machine ([`GameStatus`],
//!   [`PlayerScore`], [`PlayerHit`], [`GameEvent`])
//!
//! Everything here is pure; capture and state mutation live in the
//! `sniffer` crate.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Wire value marking a settings-change frame rather than a status change.
pub const SETTINGS_MARKER: i64 = 4;

/// Settings sub-field prefix carrying the game length in minutes.
pub const SETTING_GAME_LENGTH: &str = "016";
/// Settings sub-field prefix carrying the sound-set selection.
pub const SETTING_SOUND_SET: &str = "017";
/// Settings sub-field prefix carrying the game-mode selection.
pub const SETTING_GAME_MODE: &str = "00";

/// Lifecycle phase of the arena, as reported by the hardware.
///
/// Wire values are the ones the arena actually broadcasts: 14, 15 and 16.
/// (An older firmware variant used 0/1/2; those frames are treated as
/// unknown codes, not silently remapped.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    NotStarted,
    InGame,
    GetReady,
}

impl GameStatus {
    /// Maps a wire integer to a status, `None` for unrecognized values.
    pub fn from_wire(value: i64) -> Option<GameStatus> {
        match value {
            14 => Some(GameStatus::NotStarted),
            15 => Some(GameStatus::InGame),
            16 => Some(GameStatus::GetReady),
            _ => None,
        }
    }

    /// The integer the hardware broadcasts for this status.
    pub fn wire_value(self) -> i64 {
        match self {
            GameStatus::NotStarted => 14,
            GameStatus::InGame => 15,
            GameStatus::GetReady => 16,
        }
    }
}

/// Team assignment of a player unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    Red,
    Green,
}

impl Team {
    /// Maps a wire integer to a team (red is 0, green is 2).
    pub fn from_wire(value: i64) -> Option<Team> {
        match value {
            0 => Some(Team::Red),
            2 => Some(Team::Green),
            _ => None,
        }
    }
}

/// Score sheet for one player unit, keyed by gun id.
///
/// Created the first time a gun id shows up in a score frame; score and
/// accuracy are overwritten on later sightings while `gun_name` and `team`
/// (filled in by the roster collaborator) are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    pub gun_id: u32,
    pub gun_name: Option<String>,
    pub team: Option<Team>,
    pub score: i32,
    /// Hit percentage, 0-100.
    pub accuracy: u8,
}

impl PlayerScore {
    pub fn new(gun_id: u32, score: i32, accuracy: u8) -> Self {
        Self {
            gun_id,
            gun_name: None,
            team: None,
            score,
            accuracy,
        }
    }
}

/// One confirmed hit. Transient: emitted to subscribers, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerHit {
    pub shot_by_gun_id: u32,
    pub shot_gun_id: u32,
}

/// Lifecycle events emitted by the game state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    GameStarted,
    GameEnded,
    PlayerHit(PlayerHit),
    TimeRemainingUpdated(Duration),
}

/// A positional field failed to parse as the expected integer type.
///
/// Carries the field's name and raw value so the log line can point at the
/// exact offender. A frame that produces this error is dropped whole; no
/// partial state update is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {field} does not parse as an integer (raw value {value:?})")]
pub struct FieldParseError {
    pub field: &'static str,
    pub value: String,
}

/// Why a payload could not be decoded or classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    EmptyPayload,
    #[error("hex string has odd length ({0} digits)")]
    OddLength(usize),
    #[error("invalid hex digit at offset {0}")]
    InvalidHexDigit(usize),
    #[error("packet type field {0:?} is not an integer")]
    BadPacketType(String),
    #[error("unknown packet type code {0}")]
    UnknownPacketType(i64),
    #[error(transparent)]
    Field(#[from] FieldParseError),
}

impl DecodeError {
    /// Unknown codes are expected on a live arena network and only warrant
    /// a warning; everything else means a malformed frame.
    pub fn is_unknown_code(&self) -> bool {
        matches!(
            self,
            DecodeError::UnknownPacketType(_) | DecodeError::BadPacketType(_)
        )
    }
}

/// One UDP payload decoded into its comma-separated fields.
///
/// The full decoded string is kept alongside the split fields because
/// settings-change frames are re-split on `@` rather than `,`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub raw: String,
    pub fields: Vec<String>,
}

impl DecodedFrame {
    /// Decodes a raw UDP payload.
    ///
    /// The payload is rendered as a hex string and each two-digit group is
    /// decoded back to one ASCII character, mirroring the hardware's
    /// encoding, then the result is split on commas.
    pub fn from_payload(payload: &[u8]) -> Result<DecodedFrame, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }

        let mut hex = String::with_capacity(payload.len() * 2);
        for byte in payload {
            hex.push_str(&format!("{:02X}", byte));
        }

        Ok(DecodedFrame::from_ascii(decode_hex_ascii(&hex)?))
    }

    /// Builds a frame from an already-decoded ASCII string.
    pub fn from_ascii(raw: String) -> DecodedFrame {
        let fields = raw.split(',').map(str::to_owned).collect();
        DecodedFrame { raw, fields }
    }
}

/// Decodes a hex string into the ASCII string it encodes.
///
/// Rejects odd-length input and non-hex digits; never panics.
pub fn decode_hex_ascii(hex: &str) -> Result<String, DecodeError> {
    let bytes = hex.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }

    let mut decoded = String::with_capacity(bytes.len() / 2);
    for (index, pair) in bytes.chunks_exact(2).enumerate() {
        let hi = (pair[0] as char)
            .to_digit(16)
            .ok_or(DecodeError::InvalidHexDigit(index * 2))?;
        let lo = (pair[1] as char)
            .to_digit(16)
            .ok_or(DecodeError::InvalidHexDigit(index * 2 + 1))?;
        decoded.push((hi * 16 + lo) as u8 as char);
    }

    Ok(decoded)
}

/// Typed view of one classified frame.
///
/// Replaces per-type handler objects with a sum type: the classifier parses
/// every significant positional field up front, so a packet that reaches the
/// state machine can no longer fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaPacket {
    /// Type 1. Field 3 is the remaining game time in seconds; zero or
    /// negative means the game is over.
    Timing { time_left_secs: i64 },
    /// Type 2. Classified but never processed: team totals are derivable
    /// from per-player scores.
    TeamScore,
    /// Type 3. Fields 1, 3 and 7 of the eight-field layout.
    PlayerScore { gun_id: u32, score: i32, accuracy: u8 },
    /// Status-valued marker (14/15/16) in the type position.
    StatusChanged(GameStatus),
    /// Type 4: the game's settings changed, not its status. Sub-fields are
    /// found by re-splitting the raw frame text on `@`. Sound-set and
    /// game-mode carry raw integers; their meaning is unresolved upstream.
    SettingsChanged {
        game_length_mins: Option<u32>,
        sound_set: Option<u32>,
        game_mode: Option<u32>,
    },
    /// Type 5. Fields 1 and 2 are shooter and target gun ids.
    ShotConfirmed { shot_by_gun_id: u32, shot_gun_id: u32 },
}

/// Classifies a decoded frame by its leading packet-type code.
///
/// The code is field 0 stripped of any leading `@` (status frames arrive
/// `@`-prefixed). Codes 1/2/3/5 select the layouts above, 4 selects a
/// settings-change frame, and a bare status value selects a status change.
/// Anything else is an unknown code: callers log a warning and drop the
/// frame.
pub fn classify(frame: &DecodedFrame) -> Result<ArenaPacket, DecodeError> {
    let type_field = frame.fields.first().map(String::as_str).unwrap_or("");
    let code: i64 = type_field
        .trim_start_matches('@')
        .parse()
        .map_err(|_| DecodeError::BadPacketType(type_field.to_owned()))?;

    match code {
        1 => Ok(ArenaPacket::Timing {
            time_left_secs: parse_field(&frame.fields, 3, "time_left_secs")?,
        }),
        2 => Ok(ArenaPacket::TeamScore),
        3 => Ok(ArenaPacket::PlayerScore {
            gun_id: parse_field(&frame.fields, 1, "gun_id")?,
            score: parse_field(&frame.fields, 3, "score")?,
            accuracy: parse_field(&frame.fields, 7, "accuracy")?,
        }),
        SETTINGS_MARKER => classify_settings(frame),
        5 => Ok(ArenaPacket::ShotConfirmed {
            shot_by_gun_id: parse_field(&frame.fields, 1, "shot_by_gun_id")?,
            shot_gun_id: parse_field(&frame.fields, 2, "shot_gun_id")?,
        }),
        other => GameStatus::from_wire(other)
            .map(ArenaPacket::StatusChanged)
            .ok_or(DecodeError::UnknownPacketType(other)),
    }
}

/// Parses the `@`-delimited sub-fields of a settings-change frame.
///
/// Each sub-field is matched by prefix; unrecognized prefixes are ignored
/// silently (the hardware packs more settings than this protocol decodes).
fn classify_settings(frame: &DecodedFrame) -> Result<ArenaPacket, DecodeError> {
    let mut game_length_mins = None;
    let mut sound_set = None;
    let mut game_mode = None;

    for sub_field in frame.raw.split('@') {
        if let Some(rest) = sub_field.strip_prefix(SETTING_GAME_LENGTH) {
            game_length_mins = Some(parse_setting(rest, "game_length_mins")?);
        } else if let Some(rest) = sub_field.strip_prefix(SETTING_SOUND_SET) {
            sound_set = Some(parse_setting(rest, "sound_set")?);
        } else if let Some(rest) = sub_field.strip_prefix(SETTING_GAME_MODE) {
            game_mode = Some(parse_setting(rest, "game_mode")?);
        }
    }

    Ok(ArenaPacket::SettingsChanged {
        game_length_mins,
        sound_set,
        game_mode,
    })
}

/// Parses the digits that immediately follow a settings prefix. Trailing
/// non-digit text (the next comma-separated field) is not part of the value.
fn parse_setting(rest: &str, field: &'static str) -> Result<u32, FieldParseError> {
    let digits: &str = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);

    digits.parse().map_err(|_| FieldParseError {
        field,
        value: rest.to_owned(),
    })
}

fn parse_field<T: FromStr>(
    fields: &[String],
    index: usize,
    field: &'static str,
) -> Result<T, FieldParseError> {
    let value = fields.get(index).map(String::as_str).unwrap_or("");
    value.parse().map_err(|_| FieldParseError {
        field,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> DecodedFrame {
        DecodedFrame::from_ascii(text.to_owned())
    }

    #[test]
    fn test_hex_ascii_decoding() {
        assert_eq!(decode_hex_ascii("48656C6C6F").unwrap(), "Hello");
        assert_eq!(decode_hex_ascii("312C302C302C363030").unwrap(), "1,0,0,600");
        assert_eq!(decode_hex_ascii("").unwrap(), "");
    }

    #[test]
    fn test_hex_ascii_rejects_odd_length() {
        assert_eq!(decode_hex_ascii("48656"), Err(DecodeError::OddLength(5)));
    }

    #[test]
    fn test_hex_ascii_rejects_non_hex_digits() {
        assert_eq!(
            decode_hex_ascii("48ZZ"),
            Err(DecodeError::InvalidHexDigit(2))
        );
        assert_eq!(decode_hex_ascii("4G"), Err(DecodeError::InvalidHexDigit(1)));
    }

    #[test]
    fn test_payload_decoding_roundtrip() {
        // The hardware hex-encodes ASCII text, so decoding a payload must
        // reproduce the original field sequence byte for byte.
        let decoded = DecodedFrame::from_payload(b"1,0,0,600").unwrap();
        assert_eq!(decoded.raw, "1,0,0,600");
        assert_eq!(decoded.fields, vec!["1", "0", "0", "600"]);
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert_eq!(
            DecodedFrame::from_payload(b""),
            Err(DecodeError::EmptyPayload)
        );
    }

    #[test]
    fn test_classify_timing() {
        let packet = classify(&frame("1,0,0,600")).unwrap();
        assert_eq!(packet, ArenaPacket::Timing { time_left_secs: 600 });

        let packet = classify(&frame("1,0,0,0")).unwrap();
        assert_eq!(packet, ArenaPacket::Timing { time_left_secs: 0 });
    }

    #[test]
    fn test_classify_timing_bad_time_field() {
        let err = classify(&frame("1,0,0,abc")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Field(FieldParseError {
                field: "time_left_secs",
                value: "abc".to_owned(),
            })
        );
    }

    #[test]
    fn test_classify_team_score_is_inert() {
        assert_eq!(classify(&frame("2,50,70")).unwrap(), ArenaPacket::TeamScore);
    }

    #[test]
    fn test_classify_player_score() {
        let packet = classify(&frame("3,1,0,150,0,0,0,87")).unwrap();
        assert_eq!(
            packet,
            ArenaPacket::PlayerScore {
                gun_id: 1,
                score: 150,
                accuracy: 87,
            }
        );
    }

    #[test]
    fn test_classify_player_score_names_offending_field() {
        let err = classify(&frame("3,x,0,150,0,0,0,87")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Field(FieldParseError {
                field: "gun_id",
                value: "x".to_owned(),
            })
        );

        let err = classify(&frame("3,1,0,150,0,0,0,bad")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Field(FieldParseError {
                field: "accuracy",
                value: "bad".to_owned(),
            })
        );
    }

    #[test]
    fn test_classify_player_score_missing_fields() {
        // Truncated frame: index 7 is absent, reported as an empty value.
        let err = classify(&frame("3,1,0,150")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Field(FieldParseError {
                field: "accuracy",
                value: String::new(),
            })
        );
    }

    #[test]
    fn test_classify_status_change() {
        assert_eq!(
            classify(&frame("@014,0")).unwrap(),
            ArenaPacket::StatusChanged(GameStatus::NotStarted)
        );
        assert_eq!(
            classify(&frame("15,0")).unwrap(),
            ArenaPacket::StatusChanged(GameStatus::InGame)
        );
        assert_eq!(
            classify(&frame("@016")).unwrap(),
            ArenaPacket::StatusChanged(GameStatus::GetReady)
        );
    }

    #[test]
    fn test_classify_settings_without_known_subfields() {
        // Only a sub-field with an unrecognized prefix: nothing is
        // extracted, and no status change can come out of a settings frame.
        let packet = classify(&frame("4,@015,0")).unwrap();
        assert_eq!(
            packet,
            ArenaPacket::SettingsChanged {
                game_length_mins: None,
                sound_set: None,
                game_mode: None,
            }
        );
    }

    #[test]
    fn test_classify_settings_game_length() {
        let packet = classify(&frame("4,@016010,0")).unwrap();
        assert_eq!(
            packet,
            ArenaPacket::SettingsChanged {
                game_length_mins: Some(10),
                sound_set: None,
                game_mode: None,
            }
        );
    }

    #[test]
    fn test_classify_settings_sound_set_and_game_mode() {
        let packet = classify(&frame("4,@0172@005")).unwrap();
        assert_eq!(
            packet,
            ArenaPacket::SettingsChanged {
                game_length_mins: None,
                sound_set: Some(2),
                game_mode: Some(5),
            }
        );
    }

    #[test]
    fn test_classify_settings_without_digits_is_an_error() {
        let err = classify(&frame("4,@016,0")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Field(FieldParseError {
                field: "game_length_mins",
                value: ",0".to_owned(),
            })
        );
    }

    #[test]
    fn test_classify_shot_confirmed() {
        let packet = classify(&frame("5,2,7")).unwrap();
        assert_eq!(
            packet,
            ArenaPacket::ShotConfirmed {
                shot_by_gun_id: 2,
                shot_gun_id: 7,
            }
        );
    }

    #[test]
    fn test_classify_unknown_code() {
        assert_eq!(
            classify(&frame("9,1,2")).unwrap_err(),
            DecodeError::UnknownPacketType(9)
        );
        // Legacy 0/1/2 status encoding is not remapped.
        assert_eq!(
            classify(&frame("0,0")).unwrap_err(),
            DecodeError::UnknownPacketType(0)
        );
    }

    #[test]
    fn test_classify_non_integer_type_field() {
        assert_eq!(
            classify(&frame("junk,1,2")).unwrap_err(),
            DecodeError::BadPacketType("junk".to_owned())
        );
        assert_eq!(
            classify(&frame("")).unwrap_err(),
            DecodeError::BadPacketType(String::new())
        );
    }

    #[test]
    fn test_error_severity_split() {
        assert!(DecodeError::UnknownPacketType(9).is_unknown_code());
        assert!(DecodeError::BadPacketType("x".to_owned()).is_unknown_code());
        assert!(!DecodeError::EmptyPayload.is_unknown_code());
        assert!(!DecodeError::Field(FieldParseError {
            field: "score",
            value: "x".to_owned(),
        })
        .is_unknown_code());
    }

    #[test]
    fn test_game_status_wire_mapping() {
        for status in [
            GameStatus::NotStarted,
            GameStatus::InGame,
            GameStatus::GetReady,
        ] {
            assert_eq!(GameStatus::from_wire(status.wire_value()), Some(status));
        }
        assert_eq!(GameStatus::from_wire(17), None);
        assert_eq!(GameStatus::from_wire(0), None);
    }

    #[test]
    fn test_team_wire_mapping() {
        assert_eq!(Team::from_wire(0), Some(Team::Red));
        assert_eq!(Team::from_wire(2), Some(Team::Green));
        assert_eq!(Team::from_wire(1), None);
    }

    #[test]
    fn test_player_score_construction() {
        let score = PlayerScore::new(3, 150, 87);
        assert_eq!(score.gun_id, 3);
        assert_eq!(score.score, 150);
        assert_eq!(score.accuracy, 87);
        assert_eq!(score.gun_name, None);
        assert_eq!(score.team, None);
    }

    #[test]
    fn test_event_json_handoff() {
        // Relay collaborators forward events as JSON.
        let event = GameEvent::PlayerHit(PlayerHit {
            shot_by_gun_id: 2,
            shot_gun_id: 7,
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: GameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);

        let score = PlayerScore {
            team: Some(Team::Green),
            gun_name: Some("Maverick".to_owned()),
            ..PlayerScore::new(5, 300, 64)
        };
        let json = serde_json::to_string(&score).unwrap();
        let back: PlayerScore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, score);
    }
}
