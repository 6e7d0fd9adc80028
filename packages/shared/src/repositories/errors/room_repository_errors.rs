#[derive(Debug)]
pub enum RoomRepositoryError {
    NotFound,
    ConditionFailed,
    InvalidRecord(String),
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for RoomRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomRepositoryError::NotFound => write!(f, "Room not found"),
            RoomRepositoryError::ConditionFailed => {
                write!(f, "Room changed before the update could be applied")
            }
            RoomRepositoryError::InvalidRecord(msg) => write!(f, "Invalid room record: {}", msg),
            RoomRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            RoomRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for RoomRepositoryError {}
