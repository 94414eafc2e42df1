pub mod board_service;
pub mod clock;
pub mod errors;
pub mod functions_gateway;
pub mod game_session_service;
pub mod invitation_service;
pub mod matchmaking_service;
pub mod profile_service;
