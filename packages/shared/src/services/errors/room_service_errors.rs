use std::fmt;

use crate::repositories::errors::matchmaking_repository_errors::MatchmakingRepositoryError;
use crate::repositories::errors::membership_repository_errors::MembershipRepositoryError;
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;

#[derive(Debug, PartialEq)]
pub enum RoomServiceError {
    NotAuthenticated,
    NotFound(String),
    RoomFull,
    Unauthorized,
    TurnViolation,
    GameOver,
    NotStarted,
    InvalidCode(String),
    NotQueued,
    SyncFailure(String),
}

impl fmt::Display for RoomServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RoomServiceError::NotAuthenticated => write!(f, "Not signed in"),
            RoomServiceError::NotFound(what) => write!(f, "Not found: {}", what),
            RoomServiceError::RoomFull => write!(f, "Room is full"),
            RoomServiceError::Unauthorized => write!(f, "You are not playing that color"),
            RoomServiceError::TurnViolation => write!(f, "Not your turn"),
            RoomServiceError::GameOver => write!(f, "Game is already over"),
            RoomServiceError::NotStarted => write!(f, "Game has not started"),
            RoomServiceError::InvalidCode(code) => write!(f, "Invalid room code '{}'", code),
            RoomServiceError::NotQueued => write!(f, "Not waiting for a match"),
            RoomServiceError::SyncFailure(msg) => write!(f, "Sync failure: {}", msg),
        }
    }
}

impl std::error::Error for RoomServiceError {}

impl From<RoomRepositoryError> for RoomServiceError {
    fn from(err: RoomRepositoryError) -> Self {
        match err {
            RoomRepositoryError::NotFound => RoomServiceError::NotFound("room".to_string()),
            other => RoomServiceError::SyncFailure(other.to_string()),
        }
    }
}

impl From<MatchmakingRepositoryError> for RoomServiceError {
    fn from(err: MatchmakingRepositoryError) -> Self {
        RoomServiceError::SyncFailure(err.to_string())
    }
}

impl From<MembershipRepositoryError> for RoomServiceError {
    fn from(err: MembershipRepositoryError) -> Self {
        RoomServiceError::SyncFailure(err.to_string())
    }
}
