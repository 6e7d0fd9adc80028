pub mod identity;
pub mod matchmaking;
pub mod membership;
pub mod room;
pub mod room_update;
pub mod session;
