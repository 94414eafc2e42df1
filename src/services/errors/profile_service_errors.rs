use crate::repositories::errors::profile_repository_errors::ProfileRepositoryError;

#[derive(Debug)]
pub enum ProfileServiceError {
    NotFound,
    ValidationError(String),
    RepositoryError(ProfileRepositoryError),
}

impl std::fmt::Display for ProfileServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileServiceError::NotFound => write!(f, "Profile not found"),
            ProfileServiceError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ProfileServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for ProfileServiceError {}

impl From<ProfileRepositoryError> for ProfileServiceError {
    fn from(err: ProfileRepositoryError) -> Self {
        match err {
            ProfileRepositoryError::NotFound => ProfileServiceError::NotFound,
            other => ProfileServiceError::RepositoryError(other),
        }
    }
}
