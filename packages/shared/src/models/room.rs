use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::identity::UserIdentity;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const ROOM_CODE_LENGTH: usize = 6;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    White,
    Black,
}

impl PlayerColor {
    pub fn opponent(self) -> Self {
        match self {
            PlayerColor::White => PlayerColor::Black,
            PlayerColor::Black => PlayerColor::White,
        }
    }

    /// Color expected to move once `move_count` moves have been played from the start.
    pub fn to_move_after(move_count: usize) -> Self {
        if move_count % 2 == 0 {
            PlayerColor::White
        } else {
            PlayerColor::Black
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerColor::White => "white",
            PlayerColor::Black => "black",
        }
    }
}

impl fmt::Display for PlayerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomMode {
    Create,
    Join,
    Random,
}

impl RoomMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomMode::Create => "create",
            RoomMode::Join => "join",
            RoomMode::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoomStatus::Waiting => "waiting",
            RoomStatus::Playing => "playing",
            RoomStatus::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl Winner {
    pub fn color(self) -> Option<PlayerColor> {
        match self {
            Winner::White => Some(PlayerColor::White),
            Winner::Black => Some(PlayerColor::Black),
            Winner::Draw => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Winner::White => "white",
            Winner::Black => "black",
            Winner::Draw => "draw",
        }
    }
}

impl From<PlayerColor> for Winner {
    fn from(color: PlayerColor) -> Self {
        match color {
            PlayerColor::White => Winner::White,
            PlayerColor::Black => Winner::Black,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    pub fn from_identity(identity: &UserIdentity, joined_at: DateTime<Utc>) -> Self {
        Player {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.name(),
            avatar_url: identity.avatar_url.clone().unwrap_or_default(),
            joined_at,
        }
    }
}

/// Seat map of a room. An empty seat is absent from the stored item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white: Option<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black: Option<Player>,
}

impl Seats {
    pub fn get(&self, color: PlayerColor) -> Option<&Player> {
        match color {
            PlayerColor::White => self.white.as_ref(),
            PlayerColor::Black => self.black.as_ref(),
        }
    }

    pub fn set(&mut self, color: PlayerColor, player: Player) {
        match color {
            PlayerColor::White => self.white = Some(player),
            PlayerColor::Black => self.black = Some(player),
        }
    }

    pub fn is_full(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    /// First empty seat, white before black.
    pub fn open_seat(&self) -> Option<PlayerColor> {
        if self.white.is_none() {
            Some(PlayerColor::White)
        } else if self.black.is_none() {
            Some(PlayerColor::Black)
        } else {
            None
        }
    }

    /// Seat held by `uid`, white checked first.
    pub fn color_of(&self, uid: &str) -> Option<PlayerColor> {
        if self.white.as_ref().is_some_and(|p| p.uid == uid) {
            Some(PlayerColor::White)
        } else if self.black.as_ref().is_some_and(|p| p.uid == uid) {
            Some(PlayerColor::Black)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub code: String,
    pub mode: RoomMode,
    pub status: RoomStatus,
    #[serde(default)]
    pub players: Seats,
    pub current_turn: PlayerColor,
    pub board_state: String,
    #[serde(default)]
    pub move_log: Vec<String>,
    pub last_move_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
}

impl Room {
    /// A room with the creator seated as white, waiting for an opponent.
    pub fn new_waiting(code: String, mode: RoomMode, white: Player, now: DateTime<Utc>) -> Self {
        Room {
            room_id: Uuid::new_v4().to_string(),
            code,
            mode,
            status: RoomStatus::Waiting,
            players: Seats {
                white: Some(white),
                black: None,
            },
            current_turn: PlayerColor::White,
            board_state: STARTING_FEN.to_string(),
            move_log: Vec::new(),
            last_move_at: now,
            created_at: now,
            winner: None,
        }
    }

    /// A matchmade room, already playing.
    pub fn new_matched(code: String, white: Player, black: Player, now: DateTime<Utc>) -> Self {
        Room {
            room_id: Uuid::new_v4().to_string(),
            code,
            mode: RoomMode::Random,
            status: RoomStatus::Playing,
            players: Seats {
                white: Some(white),
                black: Some(black),
            },
            current_turn: PlayerColor::White,
            board_state: STARTING_FEN.to_string(),
            move_log: Vec::new(),
            last_move_at: now,
            created_at: now,
            winner: None,
        }
    }

    pub fn seat_owner(&self, color: PlayerColor) -> Option<&str> {
        self.players.get(color).map(|p| p.uid.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.status == RoomStatus::Finished
    }

    /// Checks the stored record against the room invariants. Stores call this
    /// on every read so malformed items never reach the services.
    pub fn validate(&self) -> Result<(), String> {
        if self.room_id.is_empty() {
            return Err("room_id is empty".to_string());
        }
        if !is_valid_room_code(&self.code) {
            return Err(format!("invalid room code '{}'", self.code));
        }
        if self.status == RoomStatus::Waiting && self.players.is_full() {
            return Err("waiting room has both seats taken".to_string());
        }
        let expected_turn = PlayerColor::to_move_after(self.move_log.len());
        if self.current_turn != expected_turn {
            return Err(format!(
                "current_turn is {} after {} moves, expected {}",
                self.current_turn,
                self.move_log.len(),
                expected_turn
            ));
        }
        match (self.status, self.winner) {
            (RoomStatus::Finished, None) => {
                return Err("finished room has no winner".to_string());
            }
            (RoomStatus::Waiting | RoomStatus::Playing, Some(winner)) => {
                return Err(format!(
                    "{} room already has winner {}",
                    self.status.as_str(),
                    winner.as_str()
                ));
            }
            _ => {}
        }
        if self.board_state.split_whitespace().count() < 4 {
            return Err(format!("board_state '{}' is not FEN", self.board_state));
        }
        Ok(())
    }
}

/// Result of creating, joining or being matched into a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAssignment {
    pub room_id: String,
    pub code: String,
    pub color: PlayerColor,
    pub mode: RoomMode,
}

/// Lifecycle changes observed between two snapshots of the same room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomActivity {
    Created,
    OpponentJoined,
    MovePlayed { notation: String, total: usize },
    Finished(Winner),
}

/// Snapshots are full-state replaces, so intermediate moves may be skipped;
/// only the latest move is reported along with the new total.
pub fn room_activity(previous: Option<&Room>, current: &Room) -> Vec<RoomActivity> {
    let mut activity = Vec::new();
    let Some(previous) = previous else {
        activity.push(RoomActivity::Created);
        if current.is_finished() {
            if let Some(winner) = current.winner {
                activity.push(RoomActivity::Finished(winner));
            }
        }
        return activity;
    };

    if previous.status == RoomStatus::Waiting && current.status == RoomStatus::Playing {
        activity.push(RoomActivity::OpponentJoined);
    }
    if current.move_log.len() > previous.move_log.len() {
        if let Some(last) = current.move_log.last() {
            activity.push(RoomActivity::MovePlayed {
                notation: last.clone(),
                total: current.move_log.len(),
            });
        }
    }
    if !previous.is_finished() && current.is_finished() {
        if let Some(winner) = current.winner {
            activity.push(RoomActivity::Finished(winner));
        }
    }
    activity
}

pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_room_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}
