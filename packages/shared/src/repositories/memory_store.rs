use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use crate::models::matchmaking::MatchmakingEntry;
use crate::models::membership::Membership;
use crate::models::room::Room;
use crate::models::room_update::RoomUpdate;
use crate::repositories::errors::matchmaking_repository_errors::MatchmakingRepositoryError;
use crate::repositories::errors::membership_repository_errors::MembershipRepositoryError;
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::repositories::matchmaking_repository::{oldest, MatchmakingRepository};
use crate::repositories::membership_repository::MembershipRepository;
use crate::repositories::room_repository::RoomRepository;
use crate::repositories::subscription::Subscription;

/// Process-local store with push subscriptions. Every record lives behind a
/// watch channel so subscribers see each committed write.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    rooms: HashMap<String, watch::Sender<Option<Room>>>,
    queue: HashMap<String, MatchmakingEntry>,
    memberships: HashMap<String, watch::Sender<Option<Vec<Membership>>>>,
}

impl StoreState {
    fn room_channel(&mut self, room_id: &str) -> &watch::Sender<Option<Room>> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
    }

    /// Drops channels opened by watchers of rooms that were never created
    /// once nobody is watching them any more.
    fn prune_unused_room_channels(&mut self) {
        self.rooms
            .retain(|_, channel| channel.borrow().is_some() || channel.receiver_count() > 0);
    }

    fn membership_channel(&mut self, uid: &str) -> &watch::Sender<Option<Vec<Membership>>> {
        self.memberships
            .entry(uid.to_string())
            .or_insert_with(|| watch::channel(None).0)
    }

    fn stored_room(&self, room_id: &str) -> Option<Room> {
        self.rooms
            .get(room_id)
            .and_then(|channel| channel.borrow().clone())
    }
}

fn checked(room: Room) -> Result<Room, RoomRepositoryError> {
    room.validate()
        .map_err(|msg| RoomRepositoryError::InvalidRecord(format!("{}: {}", room.room_id, msg)))?;
    Ok(room)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn create_room(&self, room: &Room) -> Result<(), RoomRepositoryError> {
        let mut state = self.state.lock().await;
        let channel = state.room_channel(&room.room_id);
        if channel.borrow().is_some() {
            return Err(RoomRepositoryError::ConditionFailed);
        }
        channel.send_replace(Some(room.clone()));
        Ok(())
    }

    async fn get_room(&self, room_id: &str) -> Result<Option<Room>, RoomRepositoryError> {
        let state = self.state.lock().await;
        state.stored_room(room_id).map(checked).transpose()
    }

    async fn find_rooms_by_code(&self, code: &str) -> Result<Vec<Room>, RoomRepositoryError> {
        let state = self.state.lock().await;
        let mut rooms = state
            .rooms
            .values()
            .filter_map(|channel| channel.borrow().clone())
            .filter(|room| room.code == code)
            .map(checked)
            .collect::<Result<Vec<_>, _>>()?;
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rooms)
    }

    async fn update_room(
        &self,
        room_id: &str,
        update: &RoomUpdate,
    ) -> Result<Room, RoomRepositoryError> {
        let state = self.state.lock().await;
        let Some(channel) = state.rooms.get(room_id) else {
            return Err(RoomRepositoryError::NotFound);
        };

        let mut result = Err(RoomRepositoryError::NotFound);
        channel.send_if_modified(|slot| {
            let Some(room) = slot.as_mut() else {
                return false;
            };
            if !update.guard_holds(room) {
                result = Err(RoomRepositoryError::ConditionFailed);
                return false;
            }
            update.apply_to(room);
            result = Ok(room.clone());
            true
        });
        result
    }

    async fn watch_room(&self, room_id: &str) -> Result<Subscription<Room>, RoomRepositoryError> {
        let mut state = self.state.lock().await;
        state.prune_unused_room_channels();
        Ok(Subscription::from_receiver(
            state.room_channel(room_id).subscribe(),
        ))
    }
}

#[async_trait]
impl MatchmakingRepository for InMemoryStore {
    async fn enqueue(&self, entry: &MatchmakingEntry) -> Result<(), MatchmakingRepositoryError> {
        let mut state = self.state.lock().await;
        state.queue.insert(entry.uid.clone(), entry.clone());
        Ok(())
    }

    async fn oldest_entry(&self) -> Result<Option<MatchmakingEntry>, MatchmakingRepositoryError> {
        let state = self.state.lock().await;
        Ok(oldest(state.queue.values().cloned()))
    }

    async fn claim_entry(&self, uid: &str) -> Result<bool, MatchmakingRepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state.queue.remove(uid).is_some())
    }

    async fn remove_entry(&self, uid: &str) -> Result<(), MatchmakingRepositoryError> {
        let mut state = self.state.lock().await;
        state.queue.remove(uid);
        Ok(())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn add_membership(
        &self,
        membership: &Membership,
    ) -> Result<(), MembershipRepositoryError> {
        let mut state = self.state.lock().await;
        state.membership_channel(&membership.uid).send_modify(|slot| {
            let list = slot.get_or_insert_with(Vec::new);
            list.retain(|m| m.room_id != membership.room_id);
            list.push(membership.clone());
            list.sort_by_key(|m| m.added_at);
        });
        Ok(())
    }

    async fn remove_membership(
        &self,
        uid: &str,
        room_id: &str,
    ) -> Result<(), MembershipRepositoryError> {
        let mut state = self.state.lock().await;
        state.membership_channel(uid).send_if_modified(|slot| match slot {
            Some(list) => {
                let before = list.len();
                list.retain(|m| m.room_id != room_id);
                list.len() != before
            }
            None => false,
        });
        Ok(())
    }

    async fn list_memberships(
        &self,
        uid: &str,
    ) -> Result<Vec<Membership>, MembershipRepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .get(uid)
            .and_then(|channel| channel.borrow().clone())
            .unwrap_or_default())
    }

    async fn watch_memberships(
        &self,
        uid: &str,
    ) -> Result<Subscription<Vec<Membership>>, MembershipRepositoryError> {
        let mut state = self.state.lock().await;
        Ok(Subscription::from_receiver(
            state.membership_channel(uid).subscribe(),
        ))
    }
}
