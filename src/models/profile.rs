use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RATING: i32 = 1200;

/// Public player profile. The id is shared with the hosted account identity.
/// Rating and the win/loss/draw counters are written by the hosted rating
/// function after game completion; the client only edits settings fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub rating: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub draws: u32,
    pub last_seen_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: &str, username: &str) -> Self {
        Profile {
            id: id.to_string(),
            username: username.to_string(),
            rating: DEFAULT_RATING,
            avatar_url: None,
            wins: 0,
            losses: 0,
            draws: 0,
            last_seen_at: Utc::now(),
        }
    }
}
