pub mod chess_service;
pub mod errors;
pub mod game_lifecycle;
pub mod identity_service;
pub mod matchmaking_service;
pub mod room_service;
pub mod turn_authority;
