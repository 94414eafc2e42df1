use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::game::Color;

/// One ply, appended after each accepted move write. Rows are never mutated or
/// deleted; `move_number` is 1-based and contiguous per game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    pub id: String,
    pub game_id: String,
    pub move_number: u32,
    pub side: Color,
    pub san: String,
    pub position_after: String,
    pub time_taken_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl MoveRecord {
    pub fn new(
        game_id: &str,
        move_number: u32,
        side: Color,
        san: String,
        position_after: String,
        time_taken_ms: u64,
    ) -> Self {
        MoveRecord {
            id: Uuid::new_v4().to_string(),
            game_id: game_id.to_string(),
            move_number,
            side,
            san,
            position_after,
            time_taken_ms,
            created_at: Utc::now(),
        }
    }
}
