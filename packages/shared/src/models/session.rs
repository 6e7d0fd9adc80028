use std::fmt;

use crate::models::identity::UserIdentity;
use crate::models::room::{PlayerColor, RoomAssignment, Winner};

/// Everything a client knows about the game it is currently in.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaySession {
    pub identity: UserIdentity,
    pub assignment: RoomAssignment,
}

impl PlaySession {
    pub fn new(identity: UserIdentity, assignment: RoomAssignment) -> Self {
        PlaySession {
            identity,
            assignment,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.assignment.room_id
    }

    pub fn color(&self) -> PlayerColor {
        self.assignment.color
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Move,
    Capture,
    Invalid,
    Win,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Text of the status bar.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusLine {
    YourTurn { check: bool },
    OpponentTurn { name: String, check: bool },
    Checkmate { winner_name: String, you_won: bool },
    Draw,
    WaitingForRoom,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::YourTurn { check } => {
                write!(f, "YOUR TURN")?;
                if *check {
                    write!(f, " CHECK!")?;
                }
                Ok(())
            }
            StatusLine::OpponentTurn { name, check } => {
                write!(f, "{}'S TURN", name.to_uppercase())?;
                if *check {
                    write!(f, " CHECK!")?;
                }
                Ok(())
            }
            StatusLine::Checkmate {
                winner_name,
                you_won,
            } => {
                if *you_won {
                    write!(f, "GAME OVER: YOU WIN!")
                } else {
                    write!(f, "GAME OVER: {} WINS!", winner_name.to_uppercase())
                }
            }
            StatusLine::Draw => write!(f, "GAME OVER: DRAW"),
            StatusLine::WaitingForRoom => write!(f, "Waiting (No Data)"),
        }
    }
}

/// Events pushed from the lifecycle controller to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    BoardChanged {
        fen: String,
    },
    OpponentJoined,
    Signal(Signal),
    Notification {
        level: NotificationLevel,
        message: String,
    },
    Status(StatusLine),
    GameOver {
        winner: Winner,
        winner_name: String,
        did_i_win: bool,
    },
}

/// Input from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    Move { from: String, to: String },
    Leave,
}
