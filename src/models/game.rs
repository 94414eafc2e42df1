use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::time_control::TimeControl;

pub const STARTING_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    InProgress,
    Completed,
    Abandoned,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    Resignation,
    Timeout,
    Abandoned,
}

/// One game row in the remote store. A row with status `Waiting` and an empty
/// black slot doubles as a matchmaking queue entry; claiming that slot is what
/// "joining the queue" means.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub creator_id: String,
    pub white_player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_player_id: Option<String>,
    pub status: GameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    pub time_control: String,
    pub board_state: String,
    pub current_turn: Color,
    pub white_time_remaining: u64,
    pub black_time_remaining: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_offer_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Game {
    /// A fresh waiting row: the creator takes white, the black slot stays open
    /// until matchmaking claims it.
    pub fn new_waiting(creator_id: &str, time_control: &TimeControl) -> Self {
        let clock = time_control.initial_seconds();
        let now = Utc::now();
        Game {
            id: Uuid::new_v4().to_string(),
            creator_id: creator_id.to_string(),
            white_player_id: Some(creator_id.to_string()),
            black_player_id: None,
            status: GameStatus::Waiting,
            result: None,
            winner_id: None,
            time_control: time_control.to_string(),
            board_state: STARTING_POSITION.to_string(),
            current_turn: Color::White,
            white_time_remaining: clock,
            black_time_remaining: clock,
            draw_offer_by: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// A game that starts with both seats filled, e.g. from an accepted
    /// challenge. The challenger takes white.
    pub fn new_pair(white_id: &str, black_id: &str, time_control: &TimeControl) -> Self {
        let mut game = Game::new_waiting(white_id, time_control);
        game.black_player_id = Some(black_id.to_string());
        game.status = GameStatus::InProgress;
        game
    }

    pub fn color_of(&self, player_id: &str) -> Option<Color> {
        if self.white_player_id.as_deref() == Some(player_id) {
            Some(Color::White)
        } else if self.black_player_id.as_deref() == Some(player_id) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn player_id_for(&self, color: Color) -> Option<&str> {
        match color {
            Color::White => self.white_player_id.as_deref(),
            Color::Black => self.black_player_id.as_deref(),
        }
    }

    pub fn opponent_of(&self, player_id: &str) -> Option<&str> {
        let color = self.color_of(player_id)?;
        self.player_id_for(color.opposite())
    }

    pub fn time_remaining(&self, color: Color) -> u64 {
        match color {
            Color::White => self.white_time_remaining,
            Color::Black => self.black_time_remaining,
        }
    }
}

/// Compare-and-swap payload for one accepted move: the write is only applied
/// when the row still holds the expected position and turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub game_id: String,
    pub expected_position: String,
    pub expected_turn: Color,
    pub new_position: String,
    pub next_turn: Color,
    pub mover: Color,
    pub mover_time_remaining: u64,
    pub updated_at: DateTime<Utc>,
}
