pub mod chess_service_errors;
pub mod identity_service_errors;
pub mod room_service_errors;
