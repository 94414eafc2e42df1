use crate::repositories::errors::game_repository_errors::GameRepositoryError;
use crate::repositories::errors::invitation_repository_errors::InvitationRepositoryError;

#[derive(Debug)]
pub enum InvitationServiceError {
    NotFound,
    Expired,
    /// The invitation was accepted, declined or expired by someone else first.
    AlreadyResolved,
    ValidationError(String),
    RepositoryError(InvitationRepositoryError),
    GameRepositoryError(GameRepositoryError),
}

impl std::fmt::Display for InvitationServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationServiceError::NotFound => write!(f, "Invitation not found"),
            InvitationServiceError::Expired => write!(f, "Invitation has expired"),
            InvitationServiceError::AlreadyResolved => {
                write!(f, "Invitation was already resolved")
            }
            InvitationServiceError::ValidationError(msg) => {
                write!(f, "Validation error: {}", msg)
            }
            InvitationServiceError::RepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
            InvitationServiceError::GameRepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
        }
    }
}

impl std::error::Error for InvitationServiceError {}

impl From<InvitationRepositoryError> for InvitationServiceError {
    fn from(err: InvitationRepositoryError) -> Self {
        InvitationServiceError::RepositoryError(err)
    }
}

impl From<GameRepositoryError> for InvitationServiceError {
    fn from(err: GameRepositoryError) -> Self {
        InvitationServiceError::GameRepositoryError(err)
    }
}
