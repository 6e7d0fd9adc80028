use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::models::identity::UserIdentity;
use crate::models::matchmaking::{MatchmakingEntry, MatchmakingOutcome, MatchmakingState};
use crate::models::membership::{newest_unknown, room_ids, Membership};
use crate::models::room::{generate_room_code, Player, PlayerColor, Room, RoomAssignment};
use crate::repositories::matchmaking_repository::MatchmakingRepository;
use crate::repositories::membership_repository::MembershipRepository;
use crate::repositories::room_repository::RoomRepository;
use crate::repositories::Repositories;
use crate::services::errors::room_service_errors::RoomServiceError;
use crate::services::identity_service::IdentityProvider;
use crate::services::room_service::require_caller;

/// How many times a caller tries to claim the head of the queue before
/// giving up and queueing itself.
const CLAIM_ATTEMPTS: usize = 3;

/// Pairs the caller with the oldest waiting player, or queues the caller.
///
/// Two callers arriving on an empty queue at the same moment both queue
/// themselves and stay unpaired until a third caller claims one of them.
#[derive(Clone)]
pub struct MatchmakingService {
    rooms: Arc<dyn RoomRepository + Send + Sync>,
    queue: Arc<dyn MatchmakingRepository + Send + Sync>,
    memberships: Arc<dyn MembershipRepository + Send + Sync>,
    identity: Arc<dyn IdentityProvider>,
    state: Arc<Mutex<MatchmakingState>>,
}

impl MatchmakingService {
    pub fn new(repositories: &Repositories, identity: Arc<dyn IdentityProvider>) -> Self {
        MatchmakingService {
            rooms: repositories.rooms.clone(),
            queue: repositories.matchmaking.clone(),
            memberships: repositories.memberships.clone(),
            identity,
            state: Arc::new(Mutex::new(MatchmakingState::Idle)),
        }
    }

    pub async fn state(&self) -> MatchmakingState {
        self.state.lock().await.clone()
    }

    pub async fn join_matchmaking(&self) -> Result<MatchmakingOutcome, RoomServiceError> {
        let caller = require_caller(self.identity.as_ref())?;

        for _ in 0..CLAIM_ATTEMPTS {
            let Some(opponent) = self.queue.oldest_entry().await? else {
                break;
            };
            if opponent.uid == caller.uid {
                debug!("{} is already at the head of the queue", caller.uid);
                break;
            }
            if !self.queue.claim_entry(&opponent.uid).await? {
                debug!("{} was claimed by another player", opponent.uid);
                continue;
            }

            let assignment = self.create_match(&caller, &opponent).await?;
            *self.state.lock().await = MatchmakingState::Matched(assignment.clone());
            return Ok(MatchmakingOutcome::Matched(assignment));
        }

        let known_rooms = room_ids(&self.memberships.list_memberships(&caller.uid).await?);
        let since = Utc::now();
        self.queue
            .enqueue(&MatchmakingEntry::from_identity(&caller, since))
            .await?;
        *self.state.lock().await = MatchmakingState::Waiting { since, known_rooms };
        info!("{} is waiting for an opponent", caller.uid);

        Ok(MatchmakingOutcome::Waiting)
    }

    /// Resolves once another player has matched the caller. Watches the
    /// caller's room index instead of polling the queue.
    pub async fn wait_for_match(&self) -> Result<RoomAssignment, RoomServiceError> {
        let known_rooms = match &*self.state.lock().await {
            MatchmakingState::Waiting { known_rooms, .. } => known_rooms.clone(),
            MatchmakingState::Matched(assignment) => return Ok(assignment.clone()),
            MatchmakingState::Idle => return Err(RoomServiceError::NotQueued),
        };
        let caller = require_caller(self.identity.as_ref())?;

        let mut subscription = self.memberships.watch_memberships(&caller.uid).await?;
        while let Some(memberships) = subscription.next().await {
            let Some(membership) = newest_unknown(&memberships, &known_rooms) else {
                continue;
            };
            let room = self
                .rooms
                .get_room(&membership.room_id)
                .await?
                .ok_or_else(|| RoomServiceError::NotFound(membership.room_id.clone()))?;
            let color = room
                .players
                .color_of(&caller.uid)
                .ok_or(RoomServiceError::Unauthorized)?;
            subscription.unsubscribe();

            let assignment = RoomAssignment {
                room_id: room.room_id,
                code: room.code,
                color,
                mode: room.mode,
            };
            info!(
                "{} matched into room {} as {}",
                caller.uid, assignment.room_id, color
            );
            *self.state.lock().await = MatchmakingState::Matched(assignment.clone());
            return Ok(assignment);
        }

        Err(RoomServiceError::SyncFailure(
            "room index subscription closed".to_string(),
        ))
    }

    pub async fn cancel_matchmaking(&self) -> Result<(), RoomServiceError> {
        let caller = require_caller(self.identity.as_ref())?;
        self.queue.remove_entry(&caller.uid).await?;
        *self.state.lock().await = MatchmakingState::Idle;
        debug!("{} left the queue", caller.uid);
        Ok(())
    }

    pub(crate) async fn reset(&self) {
        *self.state.lock().await = MatchmakingState::Idle;
    }

    async fn publish_to_opponent(
        &self,
        room: &Room,
        opponent_uid: &str,
    ) -> Result<(), RoomServiceError> {
        self.rooms.create_room(room).await?;
        self.memberships
            .add_membership(&Membership::new(opponent_uid, &room.room_id, room.created_at))
            .await?;
        Ok(())
    }

    /// Puts a claimed opponent back with their original timestamp after the
    /// match could not be written, so they keep their place at the head.
    async fn requeue(&self, opponent: &MatchmakingEntry) {
        warn!(
            "Could not create a match with {}, putting them back",
            opponent.uid
        );
        if let Err(e) = self.queue.enqueue(opponent).await {
            error!("Failed to requeue {}: {}", opponent.uid, e);
        }
    }

    /// The opponent waited longer, so they take white.
    async fn create_match(
        &self,
        caller: &UserIdentity,
        opponent: &MatchmakingEntry,
    ) -> Result<RoomAssignment, RoomServiceError> {
        let now = Utc::now();
        let room = Room::new_matched(
            generate_room_code(),
            opponent.to_player(now),
            Player::from_identity(caller, now),
            now,
        );

        // Until the opponent's membership exists they can only be found
        // through the queue.
        if let Err(e) = self.publish_to_opponent(&room, &opponent.uid).await {
            self.requeue(opponent).await;
            return Err(e);
        }
        self.memberships
            .add_membership(&Membership::new(&caller.uid, &room.room_id, now))
            .await?;
        if let Err(e) = self.queue.remove_entry(&caller.uid).await {
            warn!("Could not clear queue entry of {}: {}", caller.uid, e);
        }

        info!(
            "Matched {} (white) with {} (black) in room {}",
            opponent.uid, caller.uid, room.room_id
        );

        Ok(RoomAssignment {
            room_id: room.room_id,
            code: room.code,
            color: PlayerColor::Black,
            mode: room.mode,
        })
    }
}
