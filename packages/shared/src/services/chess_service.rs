use chess::{BitBoard, Board, BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square};
use std::str::FromStr;

use crate::models::room::PlayerColor;
use crate::services::errors::chess_service_errors::ChessServiceError;

#[cfg(test)]
use mockall::automock;

/// A move the engine accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub from: String,
    pub to: String,
    pub captured: bool,
    pub promoted: bool,
    /// Coordinate notation as stored in the move log (`e2e4`, `e7e8q`).
    pub notation: String,
    pub fen: String,
}

/// Move-legality oracle. Pawns reaching the last rank always become queens.
#[cfg_attr(test, automock)]
pub trait RulesEngine: Send {
    fn load(&mut self, fen: &str) -> Result<(), ChessServiceError>;
    /// Loads `fen` along with the moves that reached it, so positions seen
    /// before the reload still count towards repetition. Falls back to the
    /// bare board when the moves do not lead to `fen`.
    fn load_history(&mut self, moves: &[String], fen: &str) -> Result<(), ChessServiceError>;
    fn fen(&self) -> String;
    fn turn(&self) -> PlayerColor;
    fn attempt_move(&mut self, from: &str, to: &str) -> Result<MoveOutcome, ChessServiceError>;
    /// Takes back the last accepted move. `false` if there is nothing to undo.
    fn undo(&mut self) -> bool;
    fn piece_color_at(&self, square: &str) -> Option<PlayerColor>;
    fn is_check(&self) -> bool;
    fn is_checkmate(&self) -> bool;
    fn is_draw(&self) -> bool;
    fn is_game_over(&self) -> bool;
    /// Destination squares reachable from `square` by the side to move.
    fn legal_targets(&self, square: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
struct Position {
    board: Board,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

/// Full game state on top of `chess::Board`, which does not keep move
/// counters or an en passant target that cannot be captured.
#[derive(Debug, Clone)]
pub struct ChessGame {
    position: Position,
    undo_stack: Vec<Position>,
    seen_positions: Vec<u64>,
}

impl Default for ChessGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ChessGame {
    pub fn new() -> Self {
        let board = Board::default();
        ChessGame {
            seen_positions: vec![board.get_hash()],
            position: Position {
                board,
                en_passant: None,
                halfmove_clock: 0,
                fullmove_number: 1,
            },
            undo_stack: Vec::new(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, ChessServiceError> {
        let mut game = ChessGame::new();
        game.load(fen)?;
        Ok(game)
    }

    /// Plays `moves` from the starting position.
    pub fn replay(moves: &[String]) -> Result<Self, ChessServiceError> {
        let mut game = ChessGame::new();
        for notation in moves {
            let (from, to) = split_notation(notation)?;
            game.attempt_move(from, to)?;
        }
        Ok(game)
    }

    fn board(&self) -> &Board {
        &self.position.board
    }

    fn repetition_count(&self) -> usize {
        let current = self.board().get_hash();
        self.seen_positions
            .iter()
            .filter(|hash| **hash == current)
            .count()
    }
}

impl RulesEngine for ChessGame {
    fn load(&mut self, fen: &str) -> Result<(), ChessServiceError> {
        let position = parse_position(fen)?;
        self.seen_positions = vec![position.board.get_hash()];
        self.undo_stack.clear();
        self.position = position;
        Ok(())
    }

    fn load_history(&mut self, moves: &[String], fen: &str) -> Result<(), ChessServiceError> {
        match ChessGame::replay(moves) {
            Ok(mut game) if game.fen() == fen => {
                game.undo_stack.clear();
                *self = game;
                Ok(())
            }
            _ => self.load(fen),
        }
    }

    fn fen(&self) -> String {
        let board = self.board();
        let side = match board.side_to_move() {
            Color::White => "w",
            Color::Black => "b",
        };
        let en_passant = self
            .position
            .en_passant
            .map(|sq| sq.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{} {} {} {} {} {}",
            placement(board),
            side,
            castling(board),
            en_passant,
            self.position.halfmove_clock,
            self.position.fullmove_number
        )
    }

    fn turn(&self) -> PlayerColor {
        player_color(self.board().side_to_move())
    }

    fn attempt_move(&mut self, from: &str, to: &str) -> Result<MoveOutcome, ChessServiceError> {
        let source = parse_square(from)?;
        let dest = parse_square(to)?;
        let board = self.board();

        let moving = board
            .piece_on(source)
            .ok_or_else(|| ChessServiceError::IllegalMove(format!("no piece on {}", source)))?;
        let promotion = if moving == Piece::Pawn
            && (dest.get_rank() == Rank::Eighth || dest.get_rank() == Rank::First)
        {
            Some(Piece::Queen)
        } else {
            None
        };

        let chess_move = ChessMove::new(source, dest, promotion);
        if !MoveGen::new_legal(board).any(|m| m == chess_move) {
            return Err(ChessServiceError::IllegalMove(format!(
                "{}{} is not legal",
                source, dest
            )));
        }

        // A pawn changing file onto an empty square is an en passant capture.
        let captured = board.piece_on(dest).is_some()
            || (moving == Piece::Pawn && source.get_file() != dest.get_file());
        let mover = board.side_to_move();

        let next = Position {
            board: board.make_move_new(chess_move),
            en_passant: double_push_target(moving, source, dest),
            halfmove_clock: if moving == Piece::Pawn || captured {
                0
            } else {
                self.position.halfmove_clock + 1
            },
            fullmove_number: if mover == Color::Black {
                self.position.fullmove_number + 1
            } else {
                self.position.fullmove_number
            },
        };

        let previous = std::mem::replace(&mut self.position, next);
        self.undo_stack.push(previous);
        self.seen_positions.push(self.position.board.get_hash());

        let notation = match promotion {
            Some(_) => format!("{}{}q", source, dest),
            None => format!("{}{}", source, dest),
        };

        Ok(MoveOutcome {
            from: source.to_string(),
            to: dest.to_string(),
            captured,
            promoted: promotion.is_some(),
            notation,
            fen: self.fen(),
        })
    }

    fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(previous) => {
                self.position = previous;
                self.seen_positions.pop();
                true
            }
            None => false,
        }
    }

    fn piece_color_at(&self, square: &str) -> Option<PlayerColor> {
        let square = parse_square(square).ok()?;
        self.board().color_on(square).map(player_color)
    }

    fn is_check(&self) -> bool {
        self.board().checkers().popcnt() > 0
    }

    fn is_checkmate(&self) -> bool {
        self.board().status() == BoardStatus::Checkmate
    }

    fn is_draw(&self) -> bool {
        self.board().status() == BoardStatus::Stalemate
            || self.position.halfmove_clock >= 100
            || insufficient_material(self.board())
            || self.repetition_count() >= 3
    }

    fn is_game_over(&self) -> bool {
        self.is_checkmate() || self.is_draw()
    }

    fn legal_targets(&self, square: &str) -> Vec<String> {
        let Ok(source) = parse_square(square) else {
            return Vec::new();
        };
        let mut targets: Vec<String> = MoveGen::new_legal(self.board())
            .filter(|m| m.get_source() == source)
            .map(|m| m.get_dest().to_string())
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }
}

/// Splits `e2e4` / `e7e8q` into its two squares.
pub fn split_notation(notation: &str) -> Result<(&str, &str), ChessServiceError> {
    match (notation.get(0..2), notation.get(2..4), notation.len()) {
        (Some(from), Some(to), 4 | 5) => Ok((from, to)),
        _ => Err(ChessServiceError::IllegalMove(format!(
            "'{}' is not coordinate notation",
            notation
        ))),
    }
}

pub fn player_color(color: Color) -> PlayerColor {
    match color {
        Color::White => PlayerColor::White,
        Color::Black => PlayerColor::Black,
    }
}

fn parse_square(square: &str) -> Result<Square, ChessServiceError> {
    Square::from_str(&square.to_ascii_lowercase())
        .map_err(|_| ChessServiceError::InvalidSquare(square.to_string()))
}

fn parse_position(fen: &str) -> Result<Position, ChessServiceError> {
    let board = Board::from_str(fen)
        .map_err(|e| ChessServiceError::InvalidPosition(format!("'{}': {}", fen, e)))?;
    let fields: Vec<&str> = fen.split_whitespace().collect();

    let en_passant = match fields.get(3) {
        None | Some(&"-") => None,
        Some(square) => Some(parse_square(square)?),
    };
    let counter = |index: usize, default: u32| -> Result<u32, ChessServiceError> {
        match fields.get(index) {
            Some(value) => value.parse::<u32>().map_err(|_| {
                ChessServiceError::InvalidPosition(format!("'{}': bad move counter", fen))
            }),
            None => Ok(default),
        }
    };

    Ok(Position {
        board,
        en_passant,
        halfmove_clock: counter(4, 0)?,
        fullmove_number: counter(5, 1)?,
    })
}

fn double_push_target(moving: Piece, source: Square, dest: Square) -> Option<Square> {
    let from_rank = source.get_rank().to_index();
    let to_rank = dest.get_rank().to_index();
    if moving != Piece::Pawn || from_rank.abs_diff(to_rank) != 2 {
        return None;
    }
    Some(Square::make_square(
        Rank::from_index((from_rank + to_rank) / 2),
        source.get_file(),
    ))
}

fn piece_char(piece: Piece, color: Color) -> char {
    let c = match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    };
    match color {
        Color::White => c.to_ascii_uppercase(),
        Color::Black => c,
    }
}

fn placement(board: &Board) -> String {
    let mut out = String::new();
    for rank in (0..8).rev() {
        let mut empty = 0;
        for file in 0..8 {
            let square = Square::make_square(Rank::from_index(rank), File::from_index(file));
            match (board.piece_on(square), board.color_on(square)) {
                (Some(piece), Some(color)) => {
                    if empty > 0 {
                        out.push_str(&empty.to_string());
                        empty = 0;
                    }
                    out.push(piece_char(piece, color));
                }
                _ => empty += 1,
            }
        }
        if empty > 0 {
            out.push_str(&empty.to_string());
        }
        if rank > 0 {
            out.push('/');
        }
    }
    out
}

fn castling(board: &Board) -> String {
    let mut rights = String::new();
    let white = board.castle_rights(Color::White);
    let black = board.castle_rights(Color::Black);
    if white.has_kingside() {
        rights.push('K');
    }
    if white.has_queenside() {
        rights.push('Q');
    }
    if black.has_kingside() {
        rights.push('k');
    }
    if black.has_queenside() {
        rights.push('q');
    }
    if rights.is_empty() {
        rights.push('-');
    }
    rights
}

/// Bare kings, a single minor piece, or bishops that all share a square color.
fn insufficient_material(board: &Board) -> bool {
    let heavy: BitBoard =
        *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if heavy.popcnt() > 0 {
        return false;
    }

    let knights = board.pieces(Piece::Knight).popcnt();
    let bishops = *board.pieces(Piece::Bishop);
    if knights + bishops.popcnt() <= 1 {
        return true;
    }
    if knights > 0 {
        return false;
    }

    let mut shades = bishops.map(|sq| (sq.get_rank().to_index() + sq.get_file().to_index()) % 2);
    match shades.next() {
        Some(first) => shades.all(|shade| shade == first),
        None => true,
    }
}
