use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

use crate::models::game::Game;
use crate::models::time_control::TimeControl;
use crate::repositories::game_repository::GameRepository;
use crate::services::errors::matchmaking_service_errors::MatchmakingServiceError;

/// How many times a joiner retries after losing the claim race before it
/// falls back to posting its own waiting row.
const CLAIM_ATTEMPTS: usize = 4;

#[derive(Debug, Clone)]
pub enum QueueOutcome {
    /// Claimed an existing waiting row; the game is live.
    Matched(Game),
    /// No opponent available; a waiting row was created and the caller is in
    /// the queue until someone claims it.
    Waiting(Game),
}

/// The queue is implicit: a waiting Game row with an open black slot is the
/// queue entry, and claiming that slot is the match.
#[derive(Clone)]
pub struct MatchmakingService {
    games: Arc<dyn GameRepository + Send + Sync>,
}

impl MatchmakingService {
    pub fn new(games: Arc<dyn GameRepository + Send + Sync>) -> Self {
        MatchmakingService { games }
    }

    pub async fn join_queue(
        &self,
        player_id: &str,
        time_control: &TimeControl,
    ) -> Result<QueueOutcome, MatchmakingServiceError> {
        if player_id.is_empty() {
            return Err(MatchmakingServiceError::ValidationError(
                "Player id cannot be empty".to_string(),
            ));
        }
        let encoded = time_control.to_string();

        for attempt in 1..=CLAIM_ATTEMPTS {
            let candidate = match self.games.find_waiting_game(&encoded, player_id).await? {
                Some(game) => game,
                None => break,
            };

            if self
                .games
                .claim_waiting_game(&candidate.id, player_id, Utc::now())
                .await?
            {
                let game = self
                    .games
                    .get_game(&candidate.id)
                    .await?
                    .ok_or_else(|| MatchmakingServiceError::GameVanished(candidate.id.clone()))?;
                info!(
                    "Player {} matched into game {} ({})",
                    player_id, game.id, encoded
                );
                return Ok(QueueOutcome::Matched(game));
            }

            debug!(
                "Claim attempt {} on game {} lost the race, retrying",
                attempt, candidate.id
            );
            let jitter_ms = rand::thread_rng().gen_range(25..100);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
        }

        let game = Game::new_waiting(player_id, time_control);
        self.games.create_game(&game).await?;
        info!(
            "Player {} queued with a new waiting game {} ({})",
            player_id, game.id, encoded
        );
        Ok(QueueOutcome::Waiting(game))
    }

    /// Remove the caller's unclaimed waiting rows. Idempotent: succeeding when
    /// there is nothing to remove is the expected case after a match.
    pub async fn leave_queue(&self, player_id: &str) -> Result<(), MatchmakingServiceError> {
        self.games.delete_waiting_games(player_id).await?;
        debug!("Player {} left the queue", player_id);
        Ok(())
    }
}
