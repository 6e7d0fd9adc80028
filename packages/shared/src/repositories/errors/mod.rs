pub mod matchmaking_repository_errors;
pub mod membership_repository_errors;
pub mod room_repository_errors;
