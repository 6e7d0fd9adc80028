use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ChessServiceError {
    InvalidPosition(String),
    InvalidSquare(String),
    IllegalMove(String),
}

impl fmt::Display for ChessServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChessServiceError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            ChessServiceError::InvalidSquare(square) => write!(f, "Invalid square '{}'", square),
            ChessServiceError::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
        }
    }
}

impl std::error::Error for ChessServiceError {}
