pub mod errors;
pub mod matchmaking_repository;
pub mod membership_repository;
pub mod memory_store;
pub mod room_repository;
pub mod subscription;

use std::sync::Arc;

use aws_sdk_dynamodb::Client;

use crate::config::StoreConfig;
use matchmaking_repository::{DynamoDbMatchmakingRepository, MatchmakingRepository};
use membership_repository::{DynamoDbMembershipRepository, MembershipRepository};
use memory_store::InMemoryStore;
use room_repository::{DynamoDbRoomRepository, RoomRepository};

/// The three collections a client talks to, behind one handle.
#[derive(Clone)]
pub struct Repositories {
    pub rooms: Arc<dyn RoomRepository + Send + Sync>,
    pub matchmaking: Arc<dyn MatchmakingRepository + Send + Sync>,
    pub memberships: Arc<dyn MembershipRepository + Send + Sync>,
}

impl Repositories {
    /// Collections backed by one shared process-local store.
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Repositories {
            rooms: store.clone(),
            matchmaking: store.clone(),
            memberships: store,
        }
    }

    pub async fn dynamodb(config: &StoreConfig) -> Self {
        let aws_config = aws_config::load_from_env().await;
        let client = Client::new(&aws_config);

        Repositories {
            rooms: Arc::new(DynamoDbRoomRepository::new(client.clone(), config)),
            matchmaking: Arc::new(DynamoDbMatchmakingRepository::new(client.clone(), config)),
            memberships: Arc::new(DynamoDbMembershipRepository::new(client, config)),
        }
    }
}
