pub mod board_service_errors;
pub mod functions_gateway_errors;
pub mod game_session_service_errors;
pub mod invitation_service_errors;
pub mod matchmaking_service_errors;
pub mod profile_service_errors;
