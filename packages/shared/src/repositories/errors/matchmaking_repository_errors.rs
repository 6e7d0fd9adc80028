#[derive(Debug)]
pub enum MatchmakingRepositoryError {
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for MatchmakingRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchmakingRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            MatchmakingRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for MatchmakingRepositoryError {}
