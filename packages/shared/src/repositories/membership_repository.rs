use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};

use crate::config::StoreConfig;
use crate::models::membership::Membership;
use crate::repositories::errors::membership_repository_errors::MembershipRepositoryError;
use crate::repositories::subscription::{poll_for_changes, Subscription};

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn add_membership(&self, membership: &Membership)
        -> Result<(), MembershipRepositoryError>;

    async fn remove_membership(
        &self,
        uid: &str,
        room_id: &str,
    ) -> Result<(), MembershipRepositoryError>;

    async fn list_memberships(&self, uid: &str)
        -> Result<Vec<Membership>, MembershipRepositoryError>;

    /// Snapshots of every room index entry for `uid`.
    async fn watch_memberships(
        &self,
        uid: &str,
    ) -> Result<Subscription<Vec<Membership>>, MembershipRepositoryError>;
}

#[derive(Clone)]
pub struct DynamoDbMembershipRepository {
    pub client: Client,
    pub table_name: String,
    pub poll_interval: Duration,
}

impl DynamoDbMembershipRepository {
    pub fn new(client: Client, config: &StoreConfig) -> Self {
        Self {
            client,
            table_name: config.memberships_table.clone(),
            poll_interval: config.watch_poll_interval,
        }
    }
}

#[async_trait]
impl MembershipRepository for DynamoDbMembershipRepository {
    async fn add_membership(
        &self,
        membership: &Membership,
    ) -> Result<(), MembershipRepositoryError> {
        let item = to_item(membership)
            .map_err(|e| MembershipRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| MembershipRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn remove_membership(
        &self,
        uid: &str,
        room_id: &str,
    ) -> Result<(), MembershipRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("uid", AttributeValue::S(uid.to_string()))
            .key("room_id", AttributeValue::S(room_id.to_string()))
            .send()
            .await
            .map_err(|e| MembershipRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn list_memberships(
        &self,
        uid: &str,
    ) -> Result<Vec<Membership>, MembershipRepositoryError> {
        let mut memberships = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("#uid = :uid")
                .expression_attribute_names("#uid", "uid")
                .expression_attribute_values(":uid", AttributeValue::S(uid.to_string()))
                .consistent_read(true)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| MembershipRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                let membership: Membership = from_item(item)
                    .map_err(|e| MembershipRepositoryError::Serialization(e.to_string()))?;
                memberships.push(membership);
            }

            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        memberships.sort_by_key(|m| m.added_at);
        Ok(memberships)
    }

    async fn watch_memberships(
        &self,
        uid: &str,
    ) -> Result<Subscription<Vec<Membership>>, MembershipRepositoryError> {
        let repository = self.clone();
        let uid = uid.to_string();

        Ok(poll_for_changes(
            self.poll_interval,
            format!("rooms of {}", uid),
            move || {
                let repository = repository.clone();
                let uid = uid.clone();
                async move { repository.list_memberships(&uid).await.map(Some) }
            },
        ))
    }
}
