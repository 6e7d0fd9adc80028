use std::sync::{Arc, Once};
use std::time::Duration;

use shared::models::identity::UserIdentity;
use shared::models::room::{PlayerColor, RoomAssignment};
use shared::models::session::{GameEvent, PlaySession};
use shared::repositories::Repositories;
use shared::services::chess_service::{ChessGame, RulesEngine};
use shared::services::game_lifecycle::GameLifecycleController;
use shared::services::identity_service::IdentityService;
use shared::services::room_service::RoomService;
use tokio::sync::mpsc;
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "integration-test-secret";
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

pub fn random_uid(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

pub fn identity(uid: &str) -> UserIdentity {
    UserIdentity::new(uid, &format!("{}@example.com", uid))
}

/// A client signed in as `uid` on top of the shared repositories.
pub struct Client {
    pub identity: UserIdentity,
    pub auth: Arc<IdentityService>,
    pub rooms: RoomService,
}

pub fn client(repositories: &Repositories, uid: &str) -> Client {
    let identity = identity(uid);
    let auth = Arc::new(IdentityService::new(TEST_JWT_SECRET.to_string()));
    auth.sign_in(identity.clone());
    Client {
        rooms: RoomService::new(repositories.clone(), auth.clone()),
        identity,
        auth,
    }
}

pub fn signed_out_client(repositories: &Repositories) -> RoomService {
    RoomService::new(
        repositories.clone(),
        Arc::new(IdentityService::new(TEST_JWT_SECRET.to_string())),
    )
}

pub fn controller(
    client: &Client,
    assignment: RoomAssignment,
) -> (GameLifecycleController, mpsc::UnboundedReceiver<GameEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        GameLifecycleController::new(
            PlaySession::new(client.identity.clone(), assignment),
            client.rooms.clone(),
            ChessGame::new(),
            tx,
        ),
        rx,
    )
}

/// Waits for the first event matching `accept`, skipping everything else.
pub async fn wait_for_event<F>(events: &mut mpsc::UnboundedReceiver<GameEvent>, accept: F) -> GameEvent
where
    F: Fn(&GameEvent) -> bool,
{
    let wait = async {
        loop {
            match events.recv().await {
                Some(event) if accept(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(EVENT_TIMEOUT, wait)
        .await
        .expect("timed out waiting for game event")
}

/// Plays `moves` on a local engine and returns, for each one, the color that
/// moved, its notation and the resulting board.
pub fn scripted_moves(moves: &[(&str, &str)]) -> Vec<(PlayerColor, String, String)> {
    let mut game = ChessGame::new();
    moves
        .iter()
        .map(|(from, to)| {
            let color = game.turn();
            let outcome = game
                .attempt_move(from, to)
                .unwrap_or_else(|e| panic!("scripted move {}{} failed: {}", from, to, e));
            (color, outcome.notation, outcome.fen)
        })
        .collect()
}
