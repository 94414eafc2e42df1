use std::collections::HashMap;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use livechess::models::game::{Game, GameResult, GameStatus, PositionUpdate};
use livechess::models::game_move::MoveRecord;
use livechess::models::invitation::{GameInvitation, InvitationStatus};
use livechess::models::rating::{
    NotificationRequest, RatingUpdateRequest, RatingUpdateResponse,
};
use livechess::repositories::errors::game_repository_errors::GameRepositoryError;
use livechess::repositories::errors::invitation_repository_errors::InvitationRepositoryError;
use livechess::repositories::errors::move_repository_errors::MoveRepositoryError;
use livechess::repositories::game_repository::GameRepository;
use livechess::repositories::invitation_repository::InvitationRepository;
use livechess::repositories::move_repository::MoveRepository;
use livechess::services::errors::functions_gateway_errors::FunctionsError;
use livechess::services::functions_gateway::FunctionsGateway;

static TRACING: Once = Once::new();

/// Log output for failing tests; safe to call from every test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// In-memory stand-in for the games and moves tables with the same
/// conditional-write semantics as the real store: claims and terminal writes
/// report whether the condition held, and a stale move write conflicts
/// without recording its ply.
#[derive(Default)]
pub struct InMemoryStore {
    games: Mutex<HashMap<String, Game>>,
    moves: Mutex<Vec<MoveRecord>>,
}

impl InMemoryStore {
    pub fn snapshot(&self, game_id: &str) -> Option<Game> {
        self.games.lock().unwrap().get(game_id).cloned()
    }

    pub fn waiting_count(&self) -> usize {
        self.games
            .lock()
            .unwrap()
            .values()
            .filter(|g| g.status == GameStatus::Waiting)
            .count()
    }
}

#[async_trait]
impl GameRepository for InMemoryStore {
    async fn create_game(&self, game: &Game) -> Result<(), GameRepositoryError> {
        let mut games = self.games.lock().unwrap();
        if games.contains_key(&game.id) {
            return Err(GameRepositoryError::Conflict);
        }
        games.insert(game.id.clone(), game.clone());
        Ok(())
    }

    async fn get_game(&self, game_id: &str) -> Result<Option<Game>, GameRepositoryError> {
        Ok(self.games.lock().unwrap().get(game_id).cloned())
    }

    async fn find_waiting_game(
        &self,
        time_control: &str,
        excluded_creator_id: &str,
    ) -> Result<Option<Game>, GameRepositoryError> {
        let games = self.games.lock().unwrap();
        let oldest = games
            .values()
            .filter(|g| {
                g.status == GameStatus::Waiting
                    && g.black_player_id.is_none()
                    && g.time_control == time_control
                    && g.creator_id != excluded_creator_id
            })
            .min_by_key(|g| g.created_at)
            .cloned();
        Ok(oldest)
    }

    async fn claim_waiting_game(
        &self,
        game_id: &str,
        joiner_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, GameRepositoryError> {
        let mut games = self.games.lock().unwrap();
        match games.get_mut(game_id) {
            Some(game)
                if game.status == GameStatus::Waiting
                    && game.black_player_id.is_none()
                    && game.creator_id != joiner_id =>
            {
                game.black_player_id = Some(joiner_id.to_string());
                game.status = GameStatus::InProgress;
                game.updated_at = claimed_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_position_update(
        &self,
        update: &PositionUpdate,
        record: &MoveRecord,
    ) -> Result<(), GameRepositoryError> {
        let mut games = self.games.lock().unwrap();
        let mut moves = self.moves.lock().unwrap();
        let game = games
            .get_mut(&update.game_id)
            .ok_or(GameRepositoryError::Conflict)?;
        if game.status != GameStatus::InProgress
            || game.current_turn != update.expected_turn
            || game.board_state != update.expected_position
        {
            return Err(GameRepositoryError::Conflict);
        }
        if moves
            .iter()
            .any(|m| m.game_id == record.game_id && m.move_number == record.move_number)
        {
            return Err(GameRepositoryError::Conflict);
        }

        moves.push(record.clone());
        game.board_state = update.new_position.clone();
        game.current_turn = update.next_turn;
        match update.mover {
            livechess::models::game::Color::White => {
                game.white_time_remaining = update.mover_time_remaining
            }
            livechess::models::game::Color::Black => {
                game.black_time_remaining = update.mover_time_remaining
            }
        }
        game.draw_offer_by = None;
        game.updated_at = update.updated_at;
        Ok(())
    }

    async fn set_draw_offer(
        &self,
        game_id: &str,
        offered_by: Option<String>,
    ) -> Result<(), GameRepositoryError> {
        let mut games = self.games.lock().unwrap();
        let game = games.get_mut(game_id).ok_or(GameRepositoryError::Conflict)?;
        if game.status != GameStatus::InProgress {
            return Err(GameRepositoryError::Conflict);
        }
        game.draw_offer_by = offered_by;
        Ok(())
    }

    async fn finish_game(
        &self,
        game_id: &str,
        status: GameStatus,
        result: GameResult,
        winner_id: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<bool, GameRepositoryError> {
        let mut games = self.games.lock().unwrap();
        match games.get_mut(game_id) {
            Some(game) if game.status == GameStatus::InProgress => {
                game.status = status;
                game.result = Some(result);
                game.winner_id = winner_id;
                game.finished_at = Some(finished_at);
                game.updated_at = finished_at;
                game.draw_offer_by = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_waiting_games(&self, creator_id: &str) -> Result<(), GameRepositoryError> {
        let mut games = self.games.lock().unwrap();
        games.retain(|_, g| {
            !(g.status == GameStatus::Waiting
                && g.black_player_id.is_none()
                && g.creator_id == creator_id)
        });
        Ok(())
    }
}

#[async_trait]
impl MoveRepository for InMemoryStore {
    async fn list_moves(&self, game_id: &str) -> Result<Vec<MoveRecord>, MoveRepositoryError> {
        let mut moves: Vec<MoveRecord> = self
            .moves
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.game_id == game_id)
            .cloned()
            .collect();
        moves.sort_by_key(|m| m.move_number);
        Ok(moves)
    }
}

/// Invitations table with the conditional pending-to-resolved transition.
#[derive(Default)]
pub struct InMemoryInvitationRepository {
    invitations: Mutex<HashMap<String, GameInvitation>>,
}

#[async_trait]
impl InvitationRepository for InMemoryInvitationRepository {
    async fn create_invitation(
        &self,
        invitation: &GameInvitation,
    ) -> Result<(), InvitationRepositoryError> {
        self.invitations
            .lock()
            .unwrap()
            .insert(invitation.id.clone(), invitation.clone());
        Ok(())
    }

    async fn get_invitation(
        &self,
        invitation_id: &str,
    ) -> Result<Option<GameInvitation>, InvitationRepositoryError> {
        Ok(self.invitations.lock().unwrap().get(invitation_id).cloned())
    }

    async fn respond(
        &self,
        invitation_id: &str,
        new_status: InvitationStatus,
    ) -> Result<bool, InvitationRepositoryError> {
        let mut invitations = self.invitations.lock().unwrap();
        match invitations.get_mut(invitation_id) {
            Some(invitation) if invitation.status == InvitationStatus::Pending => {
                invitation.status = new_status;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(InvitationRepositoryError::NotFound),
        }
    }

    async fn list_pending_for(
        &self,
        to_user_id: &str,
    ) -> Result<Vec<GameInvitation>, InvitationRepositoryError> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.to_user_id == to_user_id && i.status == InvitationStatus::Pending)
            .cloned()
            .collect())
    }
}

/// Records rating invocations without leaving the process.
#[derive(Default)]
pub struct RecordingFunctionsGateway {
    pub rating_calls: Mutex<Vec<RatingUpdateRequest>>,
    pub notifications: Mutex<Vec<NotificationRequest>>,
}

#[async_trait]
impl FunctionsGateway for RecordingFunctionsGateway {
    async fn update_ratings(
        &self,
        request: &RatingUpdateRequest,
    ) -> Result<RatingUpdateResponse, FunctionsError> {
        self.rating_calls.lock().unwrap().push(request.clone());
        Ok(RatingUpdateResponse {
            white_rating: 1200,
            black_rating: 1200,
        })
    }

    async fn notify(&self, request: &NotificationRequest) -> Result<(), FunctionsError> {
        self.notifications.lock().unwrap().push(request.clone());
        Ok(())
    }
}
