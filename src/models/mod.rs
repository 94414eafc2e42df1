pub mod game;
pub mod game_move;
pub mod invitation;
pub mod profile;
pub mod rating;
pub mod time_control;
