use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};

use crate::config::StoreConfig;
use crate::models::matchmaking::MatchmakingEntry;
use crate::repositories::errors::matchmaking_repository_errors::MatchmakingRepositoryError;

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MatchmakingRepository: Send + Sync {
    /// Inserts or replaces the caller's entry.
    async fn enqueue(&self, entry: &MatchmakingEntry) -> Result<(), MatchmakingRepositoryError>;

    /// Entry with the smallest timestamp, if the queue is not empty.
    async fn oldest_entry(&self) -> Result<Option<MatchmakingEntry>, MatchmakingRepositoryError>;

    /// Removes `uid` only if it is still queued. `false` means another
    /// client claimed it first.
    async fn claim_entry(&self, uid: &str) -> Result<bool, MatchmakingRepositoryError>;

    async fn remove_entry(&self, uid: &str) -> Result<(), MatchmakingRepositoryError>;
}

pub struct DynamoDbMatchmakingRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbMatchmakingRepository {
    pub fn new(client: Client, config: &StoreConfig) -> Self {
        Self {
            client,
            table_name: config.matchmaking_table.clone(),
        }
    }
}

/// Oldest entry by timestamp; ties go to the lexically smaller uid so every
/// client picks the same opponent.
pub fn oldest<I>(entries: I) -> Option<MatchmakingEntry>
where
    I: IntoIterator<Item = MatchmakingEntry>,
{
    entries.into_iter().min_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.uid.cmp(&b.uid))
    })
}

#[async_trait]
impl MatchmakingRepository for DynamoDbMatchmakingRepository {
    async fn enqueue(&self, entry: &MatchmakingEntry) -> Result<(), MatchmakingRepositoryError> {
        let item =
            to_item(entry).map_err(|e| MatchmakingRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| MatchmakingRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn oldest_entry(&self) -> Result<Option<MatchmakingEntry>, MatchmakingRepositoryError> {
        let mut entries = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .consistent_read(true)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| MatchmakingRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let entry: MatchmakingEntry = from_item(item)
                    .map_err(|e| MatchmakingRepositoryError::Serialization(e.to_string()))?;
                entries.push(entry);
            }

            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        Ok(oldest(entries))
    }

    async fn claim_entry(&self, uid: &str) -> Result<bool, MatchmakingRepositoryError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key("uid", AttributeValue::S(uid.to_string()))
            .condition_expression("attribute_exists(uid)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let already_claimed = e
                    .as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception());
                if already_claimed {
                    Ok(false)
                } else {
                    Err(MatchmakingRepositoryError::DynamoDb(e.to_string()))
                }
            }
        }
    }

    async fn remove_entry(&self, uid: &str) -> Result<(), MatchmakingRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("uid", AttributeValue::S(uid.to_string()))
            .send()
            .await
            .map_err(|e| MatchmakingRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }
}
