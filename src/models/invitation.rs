use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::time_control::TimeControl;

/// How long a challenge stays open before it can be marked expired.
pub const INVITATION_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

/// A direct challenge from one player to another. Acceptance creates a new
/// game; decline or expiry terminates the invitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInvitation {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub time_control: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl GameInvitation {
    pub fn new(
        from_user_id: &str,
        to_user_id: &str,
        time_control: &TimeControl,
        message: Option<String>,
    ) -> Self {
        let now = Utc::now();
        GameInvitation {
            id: Uuid::new_v4().to_string(),
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            time_control: time_control.to_string(),
            message,
            status: InvitationStatus::Pending,
            expires_at: now + Duration::minutes(INVITATION_TTL_MINUTES),
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn new_invitation_is_pending_with_future_expiry() {
        let tc = TimeControl::from_str("5+0").unwrap();
        let invitation = GameInvitation::new("alice", "bob", &tc, None);

        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert!(!invitation.is_expired(Utc::now()));
        assert!(invitation.is_expired(Utc::now() + Duration::minutes(INVITATION_TTL_MINUTES + 1)));
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&InvitationStatus::Declined).unwrap();
        assert_eq!(s, "\"declined\"");
    }
}
