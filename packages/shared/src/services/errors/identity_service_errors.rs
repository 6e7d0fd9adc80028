use std::fmt;

#[derive(Debug, PartialEq)]
pub enum IdentityServiceError {
    JwtError(String),
    InvalidToken,
    ExpiredToken,
}

impl fmt::Display for IdentityServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdentityServiceError::JwtError(msg) => write!(f, "JWT error: {}", msg),
            IdentityServiceError::InvalidToken => write!(f, "Invalid ID token"),
            IdentityServiceError::ExpiredToken => write!(f, "ID token has expired"),
        }
    }
}

impl std::error::Error for IdentityServiceError {}
