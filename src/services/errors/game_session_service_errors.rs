use crate::repositories::errors::game_repository_errors::GameRepositoryError;
use crate::repositories::errors::move_repository_errors::MoveRepositoryError;
use crate::services::errors::board_service_errors::BoardServiceError;

#[derive(Debug)]
pub enum GameSessionError {
    GameNotFound,
    NotAParticipant,
    /// Rejected locally; no network call is made.
    NotYourTurn,
    GameOver,
    /// The mover's clock had already run out.
    ClockExpired,
    /// The conditional move write lost: the row no longer holds the expected
    /// position and turn.
    Conflict,
    ValidationError(String),
    Board(BoardServiceError),
    GameRepository(GameRepositoryError),
    MoveRepository(MoveRepositoryError),
}

impl std::fmt::Display for GameSessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameSessionError::GameNotFound => write!(f, "Game not found"),
            GameSessionError::NotAParticipant => write!(f, "Player is not part of this game"),
            GameSessionError::NotYourTurn => write!(f, "Not your turn"),
            GameSessionError::GameOver => write!(f, "Game is already over"),
            GameSessionError::ClockExpired => write!(f, "Clock has run out"),
            GameSessionError::Conflict => {
                write!(f, "Move rejected: game state changed underneath the write")
            }
            GameSessionError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            GameSessionError::Board(err) => write!(f, "Board error: {}", err),
            GameSessionError::GameRepository(err) => write!(f, "Repository error: {}", err),
            GameSessionError::MoveRepository(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for GameSessionError {}

impl From<BoardServiceError> for GameSessionError {
    fn from(err: BoardServiceError) -> Self {
        GameSessionError::Board(err)
    }
}

impl From<GameRepositoryError> for GameSessionError {
    fn from(err: GameRepositoryError) -> Self {
        match err {
            GameRepositoryError::Conflict => GameSessionError::Conflict,
            other => GameSessionError::GameRepository(other),
        }
    }
}

impl From<MoveRepositoryError> for GameSessionError {
    fn from(err: MoveRepositoryError) -> Self {
        GameSessionError::MoveRepository(err)
    }
}
