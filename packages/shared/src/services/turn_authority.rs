use tracing::{debug, warn};

use crate::models::room::{PlayerColor, Room, Winner};
use crate::services::chess_service::{ChessGame, MoveOutcome, RulesEngine};
use crate::services::errors::chess_service_errors::ChessServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapbackReason {
    GameOver,
    NotYourTurn,
    Desynced,
    NotYourPiece,
    IllegalMove,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveDecision {
    /// The piece goes back to its square; nothing was applied.
    Snapback(SnapbackReason),
    /// Applied to the local engine, still to be submitted to the room.
    Accepted(MoveOutcome),
}

/// Decides whether a local move attempt may go ahead, using the last known
/// room snapshot as the source of truth for turn and board.
///
/// Without an assigned color (local play) only the rules are enforced.
pub struct TurnAuthority<E: RulesEngine> {
    engine: E,
    color: Option<PlayerColor>,
}

impl<E: RulesEngine> TurnAuthority<E> {
    pub fn new(engine: E, color: Option<PlayerColor>) -> Self {
        TurnAuthority { engine, color }
    }

    pub fn color(&self) -> Option<PlayerColor> {
        self.color
    }

    pub fn set_color(&mut self, color: Option<PlayerColor>) {
        self.color = color;
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Adopts the room's board, with its move log as position history.
    pub fn sync(&mut self, room: &Room) -> Result<(), ChessServiceError> {
        self.engine.load_history(&room.move_log, &room.board_state)
    }

    pub fn attempt(&mut self, from: &str, to: &str, remote: Option<&Room>) -> MoveDecision {
        if self.engine.is_game_over() || remote.is_some_and(|room| room.is_finished()) {
            return MoveDecision::Snapback(SnapbackReason::GameOver);
        }

        if let (Some(color), Some(room)) = (self.color, remote) {
            if room.current_turn != color {
                return MoveDecision::Snapback(SnapbackReason::NotYourTurn);
            }
            if room.board_state != self.engine.fen() {
                if let Err(e) = self.sync(room) {
                    warn!("Cannot load board of room {}: {}", room.room_id, e);
                    return MoveDecision::Snapback(SnapbackReason::Desynced);
                }
                debug!("Reloaded local board from room {}", room.room_id);
            }
        }

        if let Some(color) = self.color {
            if self.engine.piece_color_at(from) != Some(color) {
                return MoveDecision::Snapback(SnapbackReason::NotYourPiece);
            }
        }

        match self.engine.attempt_move(from, to) {
            Ok(outcome) => MoveDecision::Accepted(outcome),
            Err(e) => {
                debug!("Rejected {}{}: {}", from, to, e);
                MoveDecision::Snapback(SnapbackReason::IllegalMove)
            }
        }
    }

    /// Takes back an accepted move the room refused.
    pub fn rollback(&mut self) -> bool {
        self.engine.undo()
    }

    /// Result of the position on the board: the side that just delivered
    /// mate wins, any drawn position is a draw.
    pub fn terminal_outcome(&self) -> Option<Winner> {
        if self.engine.is_checkmate() {
            Some(Winner::from(self.engine.turn().opponent()))
        } else if self.engine.is_draw() {
            Some(Winner::Draw)
        } else {
            None
        }
    }

    pub fn is_my_turn(&self) -> bool {
        self.color.map_or(true, |color| self.engine.turn() == color)
    }
}

/// Replays the room's move log and compares it with the stored board.
/// The stored board stays authoritative either way.
pub fn audit(room: &Room) -> bool {
    match ChessGame::replay(&room.move_log) {
        Ok(game) if game.fen() == room.board_state => true,
        Ok(game) => {
            warn!(
                "Room {} board '{}' does not match its move log (replayed '{}')",
                room.room_id,
                room.board_state,
                game.fen()
            );
            false
        }
        Err(e) => {
            warn!("Room {} move log cannot be replayed: {}", room.room_id, e);
            false
        }
    }
}
