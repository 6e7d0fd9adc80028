use std::collections::HashSet;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::models::room::{PlayerColor, Room, RoomStatus, Winner};
use crate::models::session::{
    GameCommand, GameEvent, NotificationLevel, PlaySession, Signal, StatusLine,
};
use crate::repositories::subscription::Subscription;
use crate::services::chess_service::{ChessGame, RulesEngine};
use crate::services::errors::room_service_errors::RoomServiceError;
use crate::services::room_service::RoomService;
use crate::services::turn_authority::{audit, MoveDecision, SnapbackReason, TurnAuthority};

/// Remembers which rooms already ran their completion sequence.
#[derive(Debug, Default)]
pub struct CompletionLatch {
    completed: HashSet<String>,
}

impl CompletionLatch {
    /// `true` the first time it is called for `room_id`.
    pub fn fire(&mut self, room_id: &str) -> bool {
        self.completed.insert(room_id.to_string())
    }

    pub fn has_fired(&self, room_id: &str) -> bool {
        self.completed.contains(room_id)
    }
}

/// Name shown for the result: the winning seat's display name, or "Draw".
pub fn winner_name(room: &Room, winner: Winner) -> String {
    winner
        .color()
        .and_then(|color| room.players.get(color))
        .map(|player| player.display_name.clone())
        .unwrap_or_else(|| "Draw".to_string())
}

/// Drives one client through one room: applies pushed snapshots, gates and
/// submits local moves, and finishes the game exactly once.
pub struct GameLifecycleController<E: RulesEngine = ChessGame> {
    session: PlaySession,
    rooms: RoomService,
    authority: TurnAuthority<E>,
    room: Option<Room>,
    latch: CompletionLatch,
    events: mpsc::UnboundedSender<GameEvent>,
}

impl<E: RulesEngine> GameLifecycleController<E> {
    pub fn new(
        session: PlaySession,
        rooms: RoomService,
        engine: E,
        events: mpsc::UnboundedSender<GameEvent>,
    ) -> Self {
        let color = session.color();
        GameLifecycleController {
            session,
            rooms,
            authority: TurnAuthority::new(engine, Some(color)),
            room: None,
            latch: CompletionLatch::default(),
            events,
        }
    }

    pub fn session(&self) -> &PlaySession {
        &self.session
    }

    pub fn room(&self) -> Option<&Room> {
        self.room.as_ref()
    }

    pub fn authority(&self) -> &TurnAuthority<E> {
        &self.authority
    }

    fn emit(&self, event: GameEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver for room {} is gone", self.session.room_id());
        }
    }

    fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.emit(GameEvent::Notification {
            level,
            message: message.into(),
        });
    }

    fn my_color(&self) -> PlayerColor {
        self.authority.color().unwrap_or(self.session.color())
    }

    /// Loads the room, settles the local color from the seats and returns
    /// the subscription `run` consumes.
    pub async fn start(&mut self) -> Result<Subscription<Room>, RoomServiceError> {
        let room_id = self.session.room_id().to_string();
        let room = self.rooms.get_room(&room_id).await?;

        let color = match room.players.color_of(&self.session.identity.uid) {
            Some(color) => color,
            None => {
                warn!(
                    "{} has no seat in room {}, playing as {}",
                    self.session.identity.uid,
                    room_id,
                    self.session.color()
                );
                self.session.color()
            }
        };
        self.session.assignment.color = color;
        self.authority.set_color(Some(color));
        if let Err(e) = self.authority.sync(&room) {
            warn!("Room {} has an unreadable board: {}", room_id, e);
        }

        let subscription = self.rooms.watch_room(&room_id).await?;
        info!("Playing room {} as {}", room_id, color);
        self.handle_room_update(room);
        Ok(subscription)
    }

    /// Applies a full snapshot of the room. Snapshots replace the previous
    /// one wholesale; intermediate states may never be seen.
    pub fn handle_room_update(&mut self, room: Room) {
        let previous = self.room.replace(room.clone());

        if previous
            .as_ref()
            .is_some_and(|p| p.status == RoomStatus::Waiting)
            && room.status == RoomStatus::Playing
        {
            info!("Opponent joined room {}", room.room_id);
            self.emit(GameEvent::OpponentJoined);
            self.notify(NotificationLevel::Success, "Opponent joined!");
        }

        let board_changed = previous
            .as_ref()
            .map_or(true, |p| p.board_state != room.board_state);
        if board_changed {
            if room.board_state != self.authority.engine().fen() {
                if let Err(e) = self.authority.sync(&room) {
                    warn!("Room {} has an unreadable board: {}", room.room_id, e);
                }
            }
            audit(&room);
            self.emit(GameEvent::BoardChanged {
                fen: room.board_state.clone(),
            });
            if previous.is_some() && !room.is_finished() && room.current_turn == self.my_color()
            {
                self.emit(GameEvent::Signal(Signal::Move));
            }
        }

        if room.is_finished() {
            self.complete(&room);
        }
        self.emit(GameEvent::Status(self.status_line()));
    }

    fn complete(&mut self, room: &Room) {
        let Some(winner) = room.winner else {
            return;
        };
        if !self.latch.fire(&room.room_id) {
            return;
        }

        let did_i_win = winner.color() == Some(self.my_color());
        let name = winner_name(room, winner);
        info!("Room {} is over, winner {}", room.room_id, winner.as_str());

        self.emit(GameEvent::GameOver {
            winner,
            winner_name: name,
            did_i_win,
        });
        if did_i_win {
            self.emit(GameEvent::Signal(Signal::Win));
        }
    }

    pub fn status_line(&self) -> StatusLine {
        let Some(room) = &self.room else {
            return StatusLine::WaitingForRoom;
        };

        if room.is_finished() {
            return match room.winner {
                Some(Winner::Draw) | None => StatusLine::Draw,
                Some(winner) => StatusLine::Checkmate {
                    winner_name: winner_name(room, winner),
                    you_won: winner.color() == Some(self.my_color()),
                },
            };
        }

        let check = self.authority.engine().is_check();
        if room.current_turn == self.my_color() {
            StatusLine::YourTurn { check }
        } else {
            let name = room
                .players
                .get(room.current_turn)
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| "Opponent".to_string());
            StatusLine::OpponentTurn { name, check }
        }
    }

    fn snapback(&self, reason: SnapbackReason) {
        debug!("Snapback in room {}: {:?}", self.session.room_id(), reason);
        self.emit(GameEvent::Signal(Signal::Invalid));
        self.emit(GameEvent::BoardChanged {
            fen: self.authority.engine().fen(),
        });

        match reason {
            SnapbackReason::NotYourTurn => {
                let turn = self
                    .room
                    .as_ref()
                    .map(|room| room.current_turn)
                    .unwrap_or(self.my_color().opponent());
                self.notify(
                    NotificationLevel::Error,
                    format!("Not your turn! It is {}'s turn.", turn),
                );
            }
            SnapbackReason::GameOver => {
                self.notify(NotificationLevel::Info, "The game is over.");
            }
            SnapbackReason::Desynced => {
                self.notify(NotificationLevel::Error, "Board out of sync with the room.");
            }
            SnapbackReason::NotYourPiece | SnapbackReason::IllegalMove => {}
        }
    }

    /// One local move attempt, from the turn gate to the room write and,
    /// when the move ends the game, the final result.
    pub async fn play_move(&mut self, from: &str, to: &str) {
        let outcome = match self.authority.attempt(from, to, self.room.as_ref()) {
            MoveDecision::Snapback(reason) => {
                self.snapback(reason);
                return;
            }
            MoveDecision::Accepted(outcome) => outcome,
        };

        self.emit(GameEvent::Signal(if outcome.captured {
            Signal::Capture
        } else {
            Signal::Move
        }));
        self.emit(GameEvent::BoardChanged {
            fen: outcome.fen.clone(),
        });

        let room_id = self.session.room_id().to_string();
        let submitted = self
            .rooms
            .make_move(&room_id, &outcome.fen, &outcome.notation, self.my_color())
            .await;

        let room = match submitted {
            Ok(room) => room,
            Err(e) => {
                warn!("Move {} rejected by room {}: {}", outcome.notation, room_id, e);
                self.authority.rollback();
                self.emit(GameEvent::BoardChanged {
                    fen: self.authority.engine().fen(),
                });
                self.notify(NotificationLevel::Error, "Error syncing move");
                return;
            }
        };

        match self.authority.terminal_outcome() {
            None => self.handle_room_update(room),
            Some(winner) => match self.rooms.end_game(&room_id, winner).await {
                Ok(finished) => self.handle_room_update(finished),
                Err(e) => {
                    error!("Could not finish room {}: {}", room_id, e);
                    self.handle_room_update(room);
                    self.notify(NotificationLevel::Error, "Error ending game");
                }
            },
        }
    }

    /// Event loop for one room. Returns when the room subscription ends or
    /// the player leaves.
    pub async fn run(
        mut self,
        mut subscription: Subscription<Room>,
        mut commands: mpsc::UnboundedReceiver<GameCommand>,
    ) -> Result<(), RoomServiceError> {
        loop {
            tokio::select! {
                snapshot = subscription.next() => match snapshot {
                    Some(room) => self.handle_room_update(room),
                    None => {
                        debug!("Room {} subscription closed", self.session.room_id());
                        return Ok(());
                    }
                },
                command = commands.recv() => match command {
                    Some(GameCommand::Move { from, to }) => self.play_move(&from, &to).await,
                    Some(GameCommand::Leave) | None => {
                        subscription.unsubscribe();
                        return self.rooms.leave_room(self.session.room_id()).await;
                    }
                },
            }
        }
    }
}
