pub mod game_repository_errors;
pub mod invitation_repository_errors;
pub mod move_repository_errors;
pub mod profile_repository_errors;
