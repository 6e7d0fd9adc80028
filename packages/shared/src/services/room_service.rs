use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::models::identity::UserIdentity;
use crate::models::matchmaking::{MatchmakingOutcome, MatchmakingState};
use crate::models::membership::Membership;
use crate::models::room::{
    generate_room_code, is_valid_room_code, normalize_room_code, Player, PlayerColor, Room,
    RoomAssignment, RoomMode, RoomStatus, Winner,
};
use crate::models::room_update::RoomUpdate;
use crate::repositories::errors::room_repository_errors::RoomRepositoryError;
use crate::repositories::matchmaking_repository::MatchmakingRepository;
use crate::repositories::membership_repository::MembershipRepository;
use crate::repositories::room_repository::RoomRepository;
use crate::repositories::subscription::Subscription;
use crate::repositories::Repositories;
use crate::services::errors::room_service_errors::RoomServiceError;
use crate::services::identity_service::IdentityProvider;
use crate::services::matchmaking_service::MatchmakingService;

pub(crate) fn require_caller(
    identity: &dyn IdentityProvider,
) -> Result<UserIdentity, RoomServiceError> {
    identity
        .current_user()
        .ok_or(RoomServiceError::NotAuthenticated)
}

/// Preconditions for `uid` moving as `acting`, checked in reporting order.
fn check_move(room: &Room, uid: &str, acting: PlayerColor) -> Result<(), RoomServiceError> {
    if room.is_finished() {
        return Err(RoomServiceError::GameOver);
    }
    if room.seat_owner(acting) != Some(uid) {
        return Err(RoomServiceError::Unauthorized);
    }
    if room.current_turn != acting {
        return Err(RoomServiceError::TurnViolation);
    }
    Ok(())
}

/// Shared room record operations. Every mutation is a single guarded write;
/// when the guard fails the room is read again to report why.
#[derive(Clone)]
pub struct RoomService {
    rooms: Arc<dyn RoomRepository + Send + Sync>,
    queue: Arc<dyn MatchmakingRepository + Send + Sync>,
    memberships: Arc<dyn MembershipRepository + Send + Sync>,
    identity: Arc<dyn IdentityProvider>,
    matchmaking: MatchmakingService,
}

impl RoomService {
    pub fn new(repositories: Repositories, identity: Arc<dyn IdentityProvider>) -> Self {
        let matchmaking = MatchmakingService::new(&repositories, identity.clone());
        RoomService {
            rooms: repositories.rooms,
            queue: repositories.matchmaking,
            memberships: repositories.memberships,
            identity,
            matchmaking,
        }
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.identity.current_user()
    }

    fn caller(&self) -> Result<UserIdentity, RoomServiceError> {
        require_caller(self.identity.as_ref())
    }

    pub async fn create_room(&self, mode: RoomMode) -> Result<RoomAssignment, RoomServiceError> {
        let caller = self.caller()?;
        let now = Utc::now();
        let room = Room::new_waiting(
            generate_room_code(),
            mode,
            Player::from_identity(&caller, now),
            now,
        );

        self.rooms.create_room(&room).await?;
        self.memberships
            .add_membership(&Membership::new(&caller.uid, &room.room_id, now))
            .await?;
        info!("Created room {} with code {}", room.room_id, room.code);

        Ok(RoomAssignment {
            room_id: room.room_id,
            code: room.code,
            color: PlayerColor::White,
            mode,
        })
    }

    pub async fn join_room_by_code(&self, code: &str) -> Result<RoomAssignment, RoomServiceError> {
        let caller = self.caller()?;
        let code = normalize_room_code(code);
        if !is_valid_room_code(&code) {
            return Err(RoomServiceError::InvalidCode(code));
        }

        let rooms = self.rooms.find_rooms_by_code(&code).await?;
        let Some(room) = rooms.iter().find(|r| r.status == RoomStatus::Waiting) else {
            return if rooms.is_empty() {
                Err(RoomServiceError::NotFound(format!("room with code {}", code)))
            } else {
                Err(RoomServiceError::RoomFull)
            };
        };
        let color = room.players.open_seat().ok_or(RoomServiceError::RoomFull)?;

        let now = Utc::now();
        let update = RoomUpdate::TakeSeat {
            color,
            player: Player::from_identity(&caller, now),
        };
        match self.rooms.update_room(&room.room_id, &update).await {
            Ok(_) => {}
            Err(RoomRepositoryError::ConditionFailed) => {
                warn!("Room {} filled up before {} could join", room.room_id, caller.uid);
                return Err(RoomServiceError::RoomFull);
            }
            Err(e) => return Err(e.into()),
        }

        self.memberships
            .add_membership(&Membership::new(&caller.uid, &room.room_id, now))
            .await?;
        info!("{} joined room {} as {}", caller.uid, room.room_id, color);

        Ok(RoomAssignment {
            room_id: room.room_id.clone(),
            code,
            color,
            mode: RoomMode::Join,
        })
    }

    pub async fn join_matchmaking(&self) -> Result<MatchmakingOutcome, RoomServiceError> {
        self.matchmaking.join_matchmaking().await
    }

    pub async fn wait_for_match(&self) -> Result<RoomAssignment, RoomServiceError> {
        self.matchmaking.wait_for_match().await
    }

    pub async fn cancel_matchmaking(&self) -> Result<(), RoomServiceError> {
        self.matchmaking.cancel_matchmaking().await
    }

    pub async fn matchmaking_state(&self) -> MatchmakingState {
        self.matchmaking.state().await
    }

    pub async fn get_room(&self, room_id: &str) -> Result<Room, RoomServiceError> {
        self.rooms
            .get_room(room_id)
            .await?
            .ok_or_else(|| RoomServiceError::NotFound(format!("room {}", room_id)))
    }

    pub async fn watch_room(&self, room_id: &str) -> Result<Subscription<Room>, RoomServiceError> {
        Ok(self.rooms.watch_room(room_id).await?)
    }

    /// Appends `notation`, stores `board_state` and hands the turn over.
    /// Nothing is written when any precondition fails.
    pub async fn make_move(
        &self,
        room_id: &str,
        board_state: &str,
        notation: &str,
        acting: PlayerColor,
    ) -> Result<Room, RoomServiceError> {
        let caller = self.caller()?;
        let room = self.get_room(room_id).await?;
        check_move(&room, &caller.uid, acting)?;

        let update = RoomUpdate::AppendMove {
            acting,
            uid: caller.uid.clone(),
            board_state: board_state.to_string(),
            notation: notation.to_string(),
            at: Utc::now(),
        };
        match self.rooms.update_room(room_id, &update).await {
            Ok(room) => {
                info!(
                    "{} played {} in room {} (move {})",
                    acting,
                    notation,
                    room_id,
                    room.move_log.len()
                );
                Ok(room)
            }
            Err(RoomRepositoryError::ConditionFailed) => {
                let latest = self.get_room(room_id).await?;
                check_move(&latest, &caller.uid, acting)?;
                Err(RoomServiceError::SyncFailure(format!(
                    "room {} changed while submitting {}",
                    room_id, notation
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Marks a playing room finished. Once finished, the stored result is
    /// returned unchanged no matter what `winner` says; a room still waiting
    /// for its second player cannot be finished.
    pub async fn end_game(&self, room_id: &str, winner: Winner) -> Result<Room, RoomServiceError> {
        let caller = self.caller()?;
        let room = self.get_room(room_id).await?;
        if room.is_finished() {
            return Ok(room);
        }
        if room.players.color_of(&caller.uid).is_none() {
            return Err(RoomServiceError::Unauthorized);
        }
        if room.status != RoomStatus::Playing {
            return Err(RoomServiceError::NotStarted);
        }

        match self
            .rooms
            .update_room(room_id, &RoomUpdate::Finish { winner })
            .await
        {
            Ok(room) => {
                info!("Room {} finished, winner {}", room_id, winner.as_str());
                Ok(room)
            }
            Err(RoomRepositoryError::ConditionFailed) => {
                let current = self.get_room(room_id).await?;
                if current.is_finished() {
                    Ok(current)
                } else {
                    Err(RoomServiceError::NotStarted)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drops the room from the caller's index and any queue entry. Seats are
    /// left as they are.
    pub async fn leave_room(&self, room_id: &str) -> Result<(), RoomServiceError> {
        let caller = self.caller()?;
        self.memberships
            .remove_membership(&caller.uid, room_id)
            .await?;
        self.queue.remove_entry(&caller.uid).await?;
        self.matchmaking.reset().await;
        info!("{} left room {}", caller.uid, room_id);
        Ok(())
    }
}
