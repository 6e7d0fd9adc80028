use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_attribute_value, to_item};
use tracing::debug;

use crate::config::StoreConfig;
use crate::models::room::{Room, RoomStatus};
use crate::models::room_update::RoomUpdate;
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::repositories::subscription::{poll_for_changes, Subscription};

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create_room(&self, room: &Room) -> Result<(), RoomRepositoryError>;

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, RoomRepositoryError>;

    /// Every room advertised under `code`, newest first. Codes are not unique.
    async fn find_rooms_by_code(&self, code: &str) -> Result<Vec<Room>, RoomRepositoryError>;

    /// Applies `update` only if its guard holds against the stored room, and
    /// returns the room as written. Fails with `ConditionFailed` otherwise.
    async fn update_room(
        &self,
        room_id: &str,
        update: &RoomUpdate,
    ) -> Result<Room, RoomRepositoryError>;

    async fn watch_room(&self, room_id: &str) -> Result<Subscription<Room>, RoomRepositoryError>;
}

#[derive(Clone)]
pub struct DynamoDbRoomRepository {
    pub client: Client,
    pub table_name: String,
    pub poll_interval: Duration,
}

impl DynamoDbRoomRepository {
    pub fn new(client: Client, config: &StoreConfig) -> Self {
        Self {
            client,
            table_name: config.rooms_table.clone(),
            poll_interval: config.watch_poll_interval,
        }
    }
}

fn decode_room(item: HashMap<String, AttributeValue>) -> Result<Room, RoomRepositoryError> {
    let room: Room =
        from_item(item).map_err(|e| RoomRepositoryError::Serialization(e.to_string()))?;
    room.validate()
        .map_err(|msg| RoomRepositoryError::InvalidRecord(format!("{}: {}", room.room_id, msg)))?;
    Ok(room)
}

/// Update, condition and placeholder maps for one guarded room write.
#[derive(Debug)]
pub struct UpdateExpression {
    pub update: String,
    pub condition: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl UpdateExpression {
    fn new(update: &str, condition: &str) -> Self {
        let mut names = HashMap::new();
        names.insert("#room_id".to_string(), "room_id".to_string());
        names.insert("#status".to_string(), "status".to_string());
        UpdateExpression {
            update: update.to_string(),
            condition: format!("attribute_exists(#room_id) AND {}", condition),
            names,
            values: HashMap::new(),
        }
    }

    fn name(mut self, placeholder: &str, attribute: &str) -> Self {
        self.names
            .insert(placeholder.to_string(), attribute.to_string());
        self
    }

    fn value(mut self, placeholder: &str, value: AttributeValue) -> Self {
        self.values.insert(placeholder.to_string(), value);
        self
    }
}

fn status_value(status: RoomStatus) -> AttributeValue {
    AttributeValue::S(status.as_str().to_string())
}

pub fn build_update_expression(
    update: &RoomUpdate,
) -> Result<UpdateExpression, RoomRepositoryError> {
    let serialization = |e: serde_dynamo::Error| RoomRepositoryError::Serialization(e.to_string());

    let expression = match update {
        RoomUpdate::TakeSeat { color, player } => UpdateExpression::new(
            "SET #players.#seat = :player, #status = :playing",
            "#status = :waiting AND attribute_not_exists(#players.#seat)",
        )
        .name("#players", "players")
        .name("#seat", color.as_str())
        .value(":player", to_attribute_value(player).map_err(serialization)?)
        .value(":playing", status_value(RoomStatus::Playing))
        .value(":waiting", status_value(RoomStatus::Waiting)),
        RoomUpdate::AppendMove {
            acting,
            uid,
            board_state,
            notation,
            at,
        } => UpdateExpression::new(
            "SET #board = :board, \
             #move_log = list_append(if_not_exists(#move_log, :empty), :move), \
             #turn = :next, #last_move_at = :at",
            "#status <> :finished AND #turn = :acting AND #players.#seat.#uid = :uid",
        )
        .name("#board", "board_state")
        .name("#move_log", "move_log")
        .name("#turn", "current_turn")
        .name("#last_move_at", "last_move_at")
        .name("#players", "players")
        .name("#seat", acting.as_str())
        .name("#uid", "uid")
        .value(":board", AttributeValue::S(board_state.clone()))
        .value(":empty", AttributeValue::L(Vec::new()))
        .value(":move", AttributeValue::L(vec![AttributeValue::S(notation.clone())]))
        .value(":next", AttributeValue::S(acting.opponent().as_str().to_string()))
        .value(":at", to_attribute_value(at).map_err(serialization)?)
        .value(":finished", status_value(RoomStatus::Finished))
        .value(":acting", AttributeValue::S(acting.as_str().to_string()))
        .value(":uid", AttributeValue::S(uid.clone())),
        RoomUpdate::Finish { winner } => UpdateExpression::new(
            "SET #status = :finished, #winner = :winner",
            "#status = :playing",
        )
        .name("#winner", "winner")
        .value(":finished", status_value(RoomStatus::Finished))
        .value(":playing", status_value(RoomStatus::Playing))
        .value(":winner", AttributeValue::S(winner.as_str().to_string())),
    };

    Ok(expression)
}

#[async_trait]
impl RoomRepository for DynamoDbRoomRepository {
    async fn create_room(&self, room: &Room) -> Result<(), RoomRepositoryError> {
        let item = to_item(room).map_err(|e| RoomRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(room_id)")
            .send()
            .await
            .map_err(|e| RoomRepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, RoomRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("room_id", AttributeValue::S(room_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| RoomRepositoryError::DynamoDb(e.to_string()))?;

        output.item.map(decode_room).transpose()
    }

    async fn find_rooms_by_code(&self, code: &str) -> Result<Vec<Room>, RoomRepositoryError> {
        let mut rooms = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("#code = :code")
                .expression_attribute_names("#code", "code")
                .expression_attribute_values(":code", AttributeValue::S(code.to_string()))
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| RoomRepositoryError::DynamoDb(e.to_string()))?;

            for item in output.items.unwrap_or_default() {
                rooms.push(decode_room(item)?);
            }

            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }

        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rooms)
    }

    async fn update_room(
        &self,
        room_id: &str,
        update: &RoomUpdate,
    ) -> Result<Room, RoomRepositoryError> {
        let expression = build_update_expression(update)?;
        debug!("Applying {} to room {}", update.describe(), room_id);

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("room_id", AttributeValue::S(room_id.to_string()))
            .update_expression(expression.update)
            .condition_expression(expression.condition)
            .set_expression_attribute_names(Some(expression.names))
            .set_expression_attribute_values(Some(expression.values))
            .return_values(aws_sdk_dynamodb::types::ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => match output.attributes {
                Some(item) => decode_room(item),
                None => Err(RoomRepositoryError::NotFound),
            },
            Err(e) => {
                let condition_failed = e
                    .as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception());
                if condition_failed {
                    Err(RoomRepositoryError::ConditionFailed)
                } else {
                    Err(RoomRepositoryError::DynamoDb(e.to_string()))
                }
            }
        }
    }

    async fn watch_room(&self, room_id: &str) -> Result<Subscription<Room>, RoomRepositoryError> {
        let repository = self.clone();
        let id = room_id.to_string();

        Ok(poll_for_changes(
            self.poll_interval,
            format!("room {}", room_id),
            move || {
                let repository = repository.clone();
                let id = id.clone();
                async move { repository.get_room(&id).await }
            },
        ))
    }
}
