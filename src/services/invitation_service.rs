use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::models::game::Game;
use crate::models::invitation::{GameInvitation, InvitationStatus};
use crate::models::rating::{NotificationKind, NotificationRequest};
use crate::models::time_control::TimeControl;
use crate::repositories::game_repository::GameRepository;
use crate::repositories::invitation_repository::InvitationRepository;
use crate::services::errors::invitation_service_errors::InvitationServiceError;
use crate::services::functions_gateway::FunctionsGateway;

pub struct InvitationService {
    invitations: Arc<dyn InvitationRepository + Send + Sync>,
    games: Arc<dyn GameRepository + Send + Sync>,
    functions: Arc<dyn FunctionsGateway + Send + Sync>,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationRepository + Send + Sync>,
        games: Arc<dyn GameRepository + Send + Sync>,
        functions: Arc<dyn FunctionsGateway + Send + Sync>,
    ) -> Self {
        InvitationService {
            invitations,
            games,
            functions,
        }
    }

    /// Send a direct challenge. The recipient learns about it through the
    /// notification function and their invitation subscription.
    pub async fn challenge(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        time_control: &str,
        message: Option<String>,
    ) -> Result<GameInvitation, InvitationServiceError> {
        if from_user_id == to_user_id {
            return Err(InvitationServiceError::ValidationError(
                "Cannot challenge yourself".to_string(),
            ));
        }
        let parsed = TimeControl::from_str(time_control)
            .map_err(|e| InvitationServiceError::ValidationError(e.to_string()))?;

        let invitation = GameInvitation::new(from_user_id, to_user_id, &parsed, message);
        self.invitations.create_invitation(&invitation).await?;
        info!(
            "Challenge {} from {} to {} at {}",
            invitation.id, from_user_id, to_user_id, parsed
        );

        self.notify(NotificationRequest {
            kind: NotificationKind::ChallengeReceived,
            recipient_id: to_user_id.to_string(),
            sender_id: Some(from_user_id.to_string()),
            game_id: None,
            message: Some(format!("Challenge: {}", parsed)),
        })
        .await;

        Ok(invitation)
    }

    /// Accept a pending challenge and create the game. The status flip is
    /// conditional on the invitation still being pending, so a challenge
    /// cancelled or expired mid-click cannot produce a game.
    pub async fn accept(
        &self,
        invitation_id: &str,
        user_id: &str,
    ) -> Result<Game, InvitationServiceError> {
        let invitation = self
            .invitations
            .get_invitation(invitation_id)
            .await?
            .ok_or(InvitationServiceError::NotFound)?;
        if invitation.to_user_id != user_id {
            return Err(InvitationServiceError::ValidationError(
                "Invitation is addressed to another player".to_string(),
            ));
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(InvitationServiceError::AlreadyResolved);
        }
        if invitation.is_expired(Utc::now()) {
            // Mark it so the sender's list stops showing it as live.
            let _ = self
                .invitations
                .respond(invitation_id, InvitationStatus::Expired)
                .await;
            return Err(InvitationServiceError::Expired);
        }

        let flipped = self
            .invitations
            .respond(invitation_id, InvitationStatus::Accepted)
            .await?;
        if !flipped {
            return Err(InvitationServiceError::AlreadyResolved);
        }

        let time_control = TimeControl::from_str(&invitation.time_control)
            .map_err(|e| InvitationServiceError::ValidationError(e.to_string()))?;
        let game = Game::new_pair(&invitation.from_user_id, user_id, &time_control);
        self.games.create_game(&game).await?;
        info!(
            "Invitation {} accepted, game {} created",
            invitation_id, game.id
        );

        self.notify(NotificationRequest {
            kind: NotificationKind::ChallengeAccepted,
            recipient_id: invitation.from_user_id.clone(),
            sender_id: Some(user_id.to_string()),
            game_id: Some(game.id.clone()),
            message: None,
        })
        .await;

        Ok(game)
    }

    pub async fn decline(
        &self,
        invitation_id: &str,
        user_id: &str,
    ) -> Result<(), InvitationServiceError> {
        let invitation = self
            .invitations
            .get_invitation(invitation_id)
            .await?
            .ok_or(InvitationServiceError::NotFound)?;
        if invitation.to_user_id != user_id {
            return Err(InvitationServiceError::ValidationError(
                "Invitation is addressed to another player".to_string(),
            ));
        }

        let flipped = self
            .invitations
            .respond(invitation_id, InvitationStatus::Declined)
            .await?;
        if !flipped {
            return Err(InvitationServiceError::AlreadyResolved);
        }

        self.notify(NotificationRequest {
            kind: NotificationKind::ChallengeDeclined,
            recipient_id: invitation.from_user_id.clone(),
            sender_id: Some(user_id.to_string()),
            game_id: None,
            message: None,
        })
        .await;

        Ok(())
    }

    pub async fn pending_for(
        &self,
        user_id: &str,
    ) -> Result<Vec<GameInvitation>, InvitationServiceError> {
        let now = Utc::now();
        let mut pending = self.invitations.list_pending_for(user_id).await?;
        pending.retain(|i| !i.is_expired(now));
        Ok(pending)
    }

    async fn notify(&self, request: NotificationRequest) {
        if let Err(e) = self.functions.notify(&request).await {
            warn!("Notification delivery failed: {}", e);
        }
    }
}
