use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::profile::Profile;
use crate::models::rating::expected_score;
use crate::repositories::profile_repository::ProfileRepository;
use crate::services::errors::profile_service_errors::ProfileServiceError;

pub struct ProfileService {
    profiles: Arc<dyn ProfileRepository + Send + Sync>,
}

impl ProfileService {
    pub fn new(profiles: Arc<dyn ProfileRepository + Send + Sync>) -> Self {
        ProfileService { profiles }
    }

    pub async fn profile(&self, user_id: &str) -> Result<Profile, ProfileServiceError> {
        Ok(self.profiles.get_profile(user_id).await?)
    }

    /// Stamp the player as online; called on login and on queue entry so
    /// opponents see fresh presence.
    pub async fn record_presence(
        &self,
        user_id: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), ProfileServiceError> {
        self.profiles.touch_last_seen(user_id, seen_at).await?;
        debug!("Presence recorded for {}", user_id);
        Ok(())
    }

    pub async fn set_avatar(
        &self,
        user_id: &str,
        avatar_url: Option<String>,
    ) -> Result<Profile, ProfileServiceError> {
        let mut profile = self.profiles.get_profile(user_id).await?;
        profile.avatar_url = avatar_url;
        self.profiles.update_profile(&profile).await?;
        Ok(profile)
    }

    /// Pre-game win expectation for the first player, from the current
    /// ratings. Purely informational; the actual adjustment happens in the
    /// rating function after the game.
    pub async fn win_expectation(
        &self,
        user_id: &str,
        opponent_id: &str,
    ) -> Result<f64, ProfileServiceError> {
        if user_id == opponent_id {
            return Err(ProfileServiceError::ValidationError(
                "Cannot compute an expectation against yourself".to_string(),
            ));
        }
        let player = self.profiles.get_profile(user_id).await?;
        let opponent = self.profiles.get_profile(opponent_id).await?;
        Ok(expected_score(player.rating, opponent.rating))
    }
}
