#[derive(Debug)]
pub enum MembershipRepositoryError {
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for MembershipRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            MembershipRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for MembershipRepositoryError {}
