pub mod errors;
pub mod game_repository;
pub mod invitation_repository;
pub mod move_repository;
pub mod profile_repository;
