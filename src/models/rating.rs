use serde::{Deserialize, Serialize};

use crate::models::game::GameResult;

/// K-factor applied by the hosted rating function.
pub const K_FACTOR: f64 = 32.0;

/// Payload for the hosted rating function, invoked once per completed game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingUpdateRequest {
    pub game_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<String>,
    pub result: GameResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingUpdateResponse {
    pub white_rating: i32,
    pub black_rating: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ChallengeReceived,
    ChallengeAccepted,
    ChallengeDeclined,
    GameCompleted,
}

/// Payload for the hosted notification dispatcher. Delivery is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub recipient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Expected score of a player rated `own` against one rated `opponent`.
pub fn expected_score(own: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent - own) / 400.0))
}

/// New rating after a game with actual score 1.0 (win), 0.5 (draw) or 0.0
/// (loss), rounded the way the hosted function rounds.
pub fn updated_rating(own: i32, opponent: i32, score: f64) -> i32 {
    (f64::from(own) + K_FACTOR * (score - expected_score(own, opponent))).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_split_expectation() {
        let e = expected_score(1200, 1200);
        assert!((e - 0.5).abs() < 1e-9);
    }

    #[test]
    fn win_between_equals_moves_sixteen_points() {
        assert_eq!(updated_rating(1200, 1200, 1.0), 1216);
        assert_eq!(updated_rating(1200, 1200, 0.0), 1184);
    }

    #[test]
    fn draw_between_equals_changes_nothing() {
        assert_eq!(updated_rating(1500, 1500, 0.5), 1500);
    }

    #[test]
    fn underdog_gains_more_from_an_upset() {
        let gain = updated_rating(1200, 1600, 1.0) - 1200;
        let favourite_gain = updated_rating(1600, 1200, 1.0) - 1600;
        assert!(gain > favourite_gain);
        assert_eq!(gain, 29);
        assert_eq!(favourite_gain, 3);
    }
}
