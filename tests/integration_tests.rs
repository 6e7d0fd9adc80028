//! Multiplayer flows across several signed-in clients sharing one store.
//!
//! These tests cover:
//! - Creating and joining rooms by code
//! - Random matchmaking
//! - Move submission rules and turn hand-over
//! - Finishing a game and concurrent writers

use room_sync_tests::common::*;
use rstest::rstest;
use shared::models::matchmaking::{MatchmakingOutcome, MatchmakingState};
use shared::models::room::{PlayerColor, RoomMode, RoomStatus, Winner, STARTING_FEN};
use shared::models::session::{GameCommand, GameEvent};
use shared::repositories::Repositories;
use shared::services::errors::room_service_errors::RoomServiceError;
use tokio::sync::mpsc;

const AFTER_E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2";

/// Test the private room flow: create, join by code, both seats filled
#[tokio::test]
async fn test_create_and_join_room_by_code() {
    init_tracing();
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));

    // 1) Alice creates a room and takes white
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    assert_eq!(created.color, PlayerColor::White);
    assert_eq!(created.mode, RoomMode::Create);

    let waiting = alice.rooms.get_room(&created.room_id).await.unwrap();
    assert_eq!(waiting.status, RoomStatus::Waiting);
    assert_eq!(waiting.board_state, STARTING_FEN);

    // 2) Bob joins with the code, typed in lower case
    let joined = bob
        .rooms
        .join_room_by_code(&created.code.to_lowercase())
        .await
        .unwrap();
    assert_eq!(joined.room_id, created.room_id);
    assert_eq!(joined.color, PlayerColor::Black);
    assert_eq!(joined.mode, RoomMode::Join);

    // 3) Both clients see the same playing room
    let room = bob.rooms.get_room(&created.room_id).await.unwrap();
    assert_eq!(room.status, RoomStatus::Playing);
    assert_eq!(room.seat_owner(PlayerColor::White), Some(alice.identity.uid.as_str()));
    assert_eq!(room.seat_owner(PlayerColor::Black), Some(bob.identity.uid.as_str()));
    assert_eq!(room.current_turn, PlayerColor::White);
    assert!(room.move_log.is_empty());
}

#[rstest]
#[case("ZZZ999", RoomServiceError::NotFound("room with code ZZZ999".to_string()))]
#[case("AB12", RoomServiceError::InvalidCode("AB12".to_string()))]
#[case("  ab-12c ", RoomServiceError::InvalidCode("AB-12C".to_string()))]
#[tokio::test]
async fn test_join_rejects_unknown_or_malformed_codes(
    #[case] code: &str,
    #[case] expected: RoomServiceError,
) {
    let repositories = Repositories::in_memory();
    let bob = client(&repositories, &random_uid("bob"));

    assert_eq!(bob.rooms.join_room_by_code(code).await.unwrap_err(), expected);
}

/// Test that a third player cannot take a seat in a full room
#[tokio::test]
async fn test_join_full_room_is_rejected() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));
    let carol = client(&repositories, &random_uid("carol"));

    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    bob.rooms.join_room_by_code(&created.code).await.unwrap();
    let before = alice.rooms.get_room(&created.room_id).await.unwrap();

    assert_eq!(
        carol.rooms.join_room_by_code(&created.code).await.unwrap_err(),
        RoomServiceError::RoomFull
    );
    assert_eq!(alice.rooms.get_room(&created.room_id).await.unwrap(), before);
}

/// Test that every room operation needs a signed-in caller
#[tokio::test]
async fn test_signed_out_caller_is_rejected() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    let anonymous = signed_out_client(&repositories);

    assert_eq!(
        anonymous.create_room(RoomMode::Create).await.unwrap_err(),
        RoomServiceError::NotAuthenticated
    );
    assert_eq!(
        anonymous.join_room_by_code(&created.code).await.unwrap_err(),
        RoomServiceError::NotAuthenticated
    );
    assert_eq!(
        anonymous.join_matchmaking().await.unwrap_err(),
        RoomServiceError::NotAuthenticated
    );

    // Signing out an existing client has the same effect
    alice.auth.sign_out();
    assert_eq!(
        alice
            .rooms
            .make_move(&created.room_id, STARTING_FEN, "e2e4", PlayerColor::White)
            .await
            .unwrap_err(),
        RoomServiceError::NotAuthenticated
    );
}

/// Test random matchmaking: first player waits, second is paired
#[tokio::test]
async fn test_matchmaking_pairs_waiting_player() {
    init_tracing();
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));

    // 1) Alice finds an empty queue and waits
    assert_eq!(
        alice.rooms.join_matchmaking().await.unwrap(),
        MatchmakingOutcome::Waiting
    );
    assert!(matches!(
        alice.rooms.matchmaking_state().await,
        MatchmakingState::Waiting { .. }
    ));

    // 2) Bob claims Alice and creates the room
    let bob_assignment = match bob.rooms.join_matchmaking().await.unwrap() {
        MatchmakingOutcome::Matched(assignment) => assignment,
        other => panic!("expected a match, got {:?}", other),
    };
    assert_eq!(bob_assignment.color, PlayerColor::Black);
    assert_eq!(bob_assignment.mode, RoomMode::Random);

    // 3) Alice learns about the room through her room index
    let alice_assignment = alice.rooms.wait_for_match().await.unwrap();
    assert_eq!(alice_assignment.room_id, bob_assignment.room_id);
    assert_eq!(alice_assignment.color, PlayerColor::White);
    assert_eq!(
        alice.rooms.matchmaking_state().await,
        MatchmakingState::Matched(alice_assignment.clone())
    );

    let room = alice.rooms.get_room(&alice_assignment.room_id).await.unwrap();
    assert_eq!(room.status, RoomStatus::Playing);
    assert_eq!(room.seat_owner(PlayerColor::White), Some(alice.identity.uid.as_str()));
    assert_eq!(room.seat_owner(PlayerColor::Black), Some(bob.identity.uid.as_str()));

    // 4) The queue is empty again, so a third player waits
    let carol = client(&repositories, &random_uid("carol"));
    assert_eq!(
        carol.rooms.join_matchmaking().await.unwrap(),
        MatchmakingOutcome::Waiting
    );
}

/// Test leaving the queue before anyone arrives
#[tokio::test]
async fn test_cancel_matchmaking() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));

    alice.rooms.join_matchmaking().await.unwrap();
    alice.rooms.cancel_matchmaking().await.unwrap();

    assert_eq!(alice.rooms.matchmaking_state().await, MatchmakingState::Idle);
    assert_eq!(
        alice.rooms.wait_for_match().await.unwrap_err(),
        RoomServiceError::NotQueued
    );
    assert_eq!(
        bob.rooms.join_matchmaking().await.unwrap(),
        MatchmakingOutcome::Waiting
    );
}

/// Test that out-of-turn and wrong-seat moves leave the room untouched
#[tokio::test]
async fn test_move_preconditions() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    bob.rooms.join_room_by_code(&created.code).await.unwrap();
    let before = alice.rooms.get_room(&created.room_id).await.unwrap();
    let moves = scripted_moves(&[("e2", "e4")]);
    let (_, notation, fen) = &moves[0];

    // Bob owns black and it is white's turn
    assert_eq!(
        bob.rooms
            .make_move(&created.room_id, fen, notation, PlayerColor::Black)
            .await
            .unwrap_err(),
        RoomServiceError::TurnViolation
    );
    // Bob cannot move for white either
    assert_eq!(
        bob.rooms
            .make_move(&created.room_id, fen, notation, PlayerColor::White)
            .await
            .unwrap_err(),
        RoomServiceError::Unauthorized
    );
    assert_eq!(
        alice
            .rooms
            .make_move("no-such-room", fen, notation, PlayerColor::White)
            .await
            .unwrap_err(),
        RoomServiceError::NotFound("room no-such-room".to_string())
    );

    assert_eq!(alice.rooms.get_room(&created.room_id).await.unwrap(), before);
}

/// Test two opening moves hand the turn back and forth
#[tokio::test]
async fn test_opening_moves_update_board_and_turn() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    bob.rooms.join_room_by_code(&created.code).await.unwrap();

    for (color, notation, fen) in scripted_moves(&[("e2", "e4"), ("e7", "e5")]) {
        let mover = if color == PlayerColor::White { &alice } else { &bob };
        let room = mover
            .rooms
            .make_move(&created.room_id, &fen, &notation, color)
            .await
            .unwrap();
        assert_eq!(room.current_turn, color.opponent());
        assert_eq!(room.board_state, fen);
    }

    let room = alice.rooms.get_room(&created.room_id).await.unwrap();
    assert_eq!(room.board_state, AFTER_E4_E5);
    assert_eq!(room.move_log, vec!["e2e4".to_string(), "e7e5".to_string()]);
    assert_eq!(room.current_turn, PlayerColor::White);
}

/// Test fool's mate ends the room once, with the first result kept
#[tokio::test]
async fn test_checkmate_finishes_room() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    bob.rooms.join_room_by_code(&created.code).await.unwrap();

    let moves = scripted_moves(&[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]);
    for (color, notation, fen) in &moves {
        let mover = if *color == PlayerColor::White { &alice } else { &bob };
        mover
            .rooms
            .make_move(&created.room_id, fen, notation, *color)
            .await
            .unwrap();
    }

    let finished = bob.rooms.end_game(&created.room_id, Winner::Black).await.unwrap();
    assert_eq!(finished.status, RoomStatus::Finished);
    assert_eq!(finished.winner, Some(Winner::Black));

    // A late, conflicting report does not change the result
    let again = alice.rooms.end_game(&created.room_id, Winner::White).await.unwrap();
    assert_eq!(again, finished);

    assert_eq!(
        alice
            .rooms
            .make_move(&created.room_id, STARTING_FEN, "a2a3", PlayerColor::White)
            .await
            .unwrap_err(),
        RoomServiceError::GameOver
    );
}

/// Test that a room still waiting for its opponent cannot be finished
#[tokio::test]
async fn test_end_game_before_opponent_joins() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    let before = alice.rooms.get_room(&created.room_id).await.unwrap();

    assert_eq!(
        alice
            .rooms
            .end_game(&created.room_id, Winner::White)
            .await
            .unwrap_err(),
        RoomServiceError::NotStarted
    );

    let after = alice.rooms.get_room(&created.room_id).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.status, RoomStatus::Waiting);
    assert!(after.winner.is_none());
}

/// Test that two players racing for the last seat cannot both get it
#[tokio::test]
async fn test_concurrent_joins_seat_one_player() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));
    let carol = client(&repositories, &random_uid("carol"));
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();

    let (bob_result, carol_result) = tokio::join!(
        bob.rooms.join_room_by_code(&created.code),
        carol.rooms.join_room_by_code(&created.code)
    );

    let results = [bob_result, carol_result];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| r.as_ref().err() == Some(&RoomServiceError::RoomFull)));

    let room = alice.rooms.get_room(&created.room_id).await.unwrap();
    assert_eq!(room.status, RoomStatus::Playing);
    let black = room.seat_owner(PlayerColor::Black).unwrap();
    assert!(black == bob.identity.uid || black == carol.identity.uid);
}

/// Test that two submissions for the same turn append exactly one move
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_moves_accept_one() {
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    bob.rooms.join_room_by_code(&created.code).await.unwrap();

    let e4 = scripted_moves(&[("e2", "e4")]).remove(0);
    let d4 = scripted_moves(&[("d2", "d4")]).remove(0);

    let first = {
        let rooms = alice.rooms.clone();
        let room_id = created.room_id.clone();
        tokio::spawn(async move { rooms.make_move(&room_id, &e4.2, &e4.1, e4.0).await })
    };
    let second = {
        let rooms = alice.rooms.clone();
        let room_id = created.room_id.clone();
        tokio::spawn(async move { rooms.make_move(&room_id, &d4.2, &d4.1, d4.0).await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| r.as_ref().err() == Some(&RoomServiceError::TurnViolation)));

    let room = alice.rooms.get_room(&created.room_id).await.unwrap();
    assert_eq!(room.move_log.len(), 1);
    assert_eq!(room.current_turn, PlayerColor::Black);
}

/// Test two running game loops staying in sync through room pushes
#[tokio::test]
async fn test_game_loops_follow_each_other() {
    init_tracing();
    let repositories = Repositories::in_memory();
    let alice = client(&repositories, &random_uid("alice"));
    let bob = client(&repositories, &random_uid("bob"));
    let created = alice.rooms.create_room(RoomMode::Create).await.unwrap();
    let joined = bob.rooms.join_room_by_code(&created.code).await.unwrap();
    let room_id = created.room_id.clone();

    let (mut white, mut white_events) = controller(&alice, created);
    let (mut black, mut black_events) = controller(&bob, joined);
    let white_subscription = white.start().await.unwrap();
    let black_subscription = black.start().await.unwrap();

    let (white_tx, white_rx) = mpsc::unbounded_channel();
    let (black_tx, black_rx) = mpsc::unbounded_channel();
    let white_loop = tokio::spawn(white.run(white_subscription, white_rx));
    let black_loop = tokio::spawn(black.run(black_subscription, black_rx));

    // 1) White moves, black sees it
    white_tx
        .send(GameCommand::Move {
            from: "e2".to_string(),
            to: "e4".to_string(),
        })
        .unwrap();
    let after_e4 = scripted_moves(&[("e2", "e4")]).remove(0).2;
    wait_for_event(&mut black_events, |e| {
        matches!(e, GameEvent::BoardChanged { fen } if *fen == after_e4)
    })
    .await;

    // 2) Black answers, white sees it
    black_tx
        .send(GameCommand::Move {
            from: "e7".to_string(),
            to: "e5".to_string(),
        })
        .unwrap();
    wait_for_event(&mut white_events, |e| {
        matches!(e, GameEvent::BoardChanged { fen } if fen == AFTER_E4_E5)
    })
    .await;

    // 3) Both leave
    white_tx.send(GameCommand::Leave).unwrap();
    black_tx.send(GameCommand::Leave).unwrap();
    white_loop.await.unwrap().unwrap();
    black_loop.await.unwrap().unwrap();

    let room = alice.rooms.get_room(&room_id).await.unwrap();
    assert_eq!(room.board_state, AFTER_E4_E5);
    assert_eq!(room.move_log, vec!["e2e4".to_string(), "e7e5".to_string()]);
}
