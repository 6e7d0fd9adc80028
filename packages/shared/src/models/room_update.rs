use chrono::{DateTime, Utc};

use crate::models::room::{Player, PlayerColor, Room, RoomStatus, Winner};

/// A single conditional mutation of a room. Every variant carries the
/// precondition it is guarded by; stores must check the guard and apply the
/// change as one atomic step.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomUpdate {
    /// Guard: room is waiting and `color` is empty.
    TakeSeat { color: PlayerColor, player: Player },
    /// Guard: room not finished, `current_turn == acting`, seat `acting` held by `uid`.
    AppendMove {
        acting: PlayerColor,
        uid: String,
        board_state: String,
        notation: String,
        at: DateTime<Utc>,
    },
    /// Guard: room is playing. A waiting room cannot be finished.
    Finish { winner: Winner },
}

impl RoomUpdate {
    pub fn guard_holds(&self, room: &Room) -> bool {
        match self {
            RoomUpdate::TakeSeat { color, .. } => {
                room.status == RoomStatus::Waiting && room.players.get(*color).is_none()
            }
            RoomUpdate::AppendMove { acting, uid, .. } => {
                !room.is_finished()
                    && room.current_turn == *acting
                    && room.seat_owner(*acting) == Some(uid.as_str())
            }
            RoomUpdate::Finish { .. } => room.status == RoomStatus::Playing,
        }
    }

    pub fn apply_to(&self, room: &mut Room) {
        match self {
            RoomUpdate::TakeSeat { color, player } => {
                room.players.set(*color, player.clone());
                room.status = RoomStatus::Playing;
            }
            RoomUpdate::AppendMove {
                acting,
                board_state,
                notation,
                at,
                ..
            } => {
                room.move_log.push(notation.clone());
                room.board_state = board_state.clone();
                room.current_turn = acting.opponent();
                room.last_move_at = *at;
            }
            RoomUpdate::Finish { winner } => {
                room.status = RoomStatus::Finished;
                room.winner = Some(*winner);
            }
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RoomUpdate::TakeSeat { .. } => "take seat",
            RoomUpdate::AppendMove { .. } => "append move",
            RoomUpdate::Finish { .. } => "finish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::UserIdentity;
    use crate::models::room::RoomMode;

    fn player(uid: &str) -> Player {
        Player::from_identity(
            &UserIdentity::new(uid, &format!("{}@example.com", uid)),
            Utc::now(),
        )
    }

    fn room() -> Room {
        Room::new_waiting("QWERTY".to_string(), RoomMode::Create, player("alice"), Utc::now())
    }

    #[test]
    fn test_take_seat_fills_black_and_starts_game() {
        let mut room = room();
        let update = RoomUpdate::TakeSeat {
            color: PlayerColor::Black,
            player: player("bob"),
        };

        assert!(update.guard_holds(&room));
        update.apply_to(&mut room);

        assert_eq!(room.status, RoomStatus::Playing);
        assert_eq!(room.seat_owner(PlayerColor::Black), Some("bob"));
        assert!(!update.guard_holds(&room));
    }

    #[test]
    fn test_take_seat_rejects_occupied_seat() {
        let room = room();
        let update = RoomUpdate::TakeSeat {
            color: PlayerColor::White,
            player: player("bob"),
        };

        assert!(!update.guard_holds(&room));
    }

    #[test]
    fn test_append_move_guard_checks_turn_and_owner() {
        let room = room();
        let at = Utc::now();
        let as_alice = RoomUpdate::AppendMove {
            acting: PlayerColor::White,
            uid: "alice".to_string(),
            board_state: "fen".to_string(),
            notation: "e2e4".to_string(),
            at,
        };
        let as_mallory = RoomUpdate::AppendMove {
            acting: PlayerColor::White,
            uid: "mallory".to_string(),
            board_state: "fen".to_string(),
            notation: "e2e4".to_string(),
            at,
        };
        let wrong_turn = RoomUpdate::AppendMove {
            acting: PlayerColor::Black,
            uid: "alice".to_string(),
            board_state: "fen".to_string(),
            notation: "e7e5".to_string(),
            at,
        };

        assert!(as_alice.guard_holds(&room));
        assert!(!as_mallory.guard_holds(&room));
        assert!(!wrong_turn.guard_holds(&room));
    }

    #[test]
    fn test_append_move_flips_turn_and_appends() {
        let mut room = room();
        let at = Utc::now();
        RoomUpdate::AppendMove {
            acting: PlayerColor::White,
            uid: "alice".to_string(),
            board_state: "after".to_string(),
            notation: "e2e4".to_string(),
            at,
        }
        .apply_to(&mut room);

        assert_eq!(room.current_turn, PlayerColor::Black);
        assert_eq!(room.move_log, vec!["e2e4".to_string()]);
        assert_eq!(room.board_state, "after");
        assert_eq!(room.last_move_at, at);
    }

    #[test]
    fn test_finish_only_once() {
        let mut room = room();
        room.status = RoomStatus::Playing;
        let first = RoomUpdate::Finish {
            winner: Winner::White,
        };
        first.apply_to(&mut room);

        let second = RoomUpdate::Finish {
            winner: Winner::Black,
        };
        assert!(!second.guard_holds(&room));
        assert_eq!(room.winner, Some(Winner::White));
    }

    #[test]
    fn test_finish_requires_started_game() {
        let mut room = room();
        let finish = RoomUpdate::Finish {
            winner: Winner::Draw,
        };
        assert!(!finish.guard_holds(&room));

        RoomUpdate::TakeSeat {
            color: PlayerColor::Black,
            player: player("bob"),
        }
        .apply_to(&mut room);
        assert!(finish.guard_holds(&room));
    }
}
