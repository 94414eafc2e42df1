#[derive(Debug)]
pub enum BoardServiceError {
    InvalidPosition(String),
    InvalidSquare(String),
    InvalidPromotion(String),
    IllegalMove(String),
}

impl std::fmt::Display for BoardServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardServiceError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            BoardServiceError::InvalidSquare(msg) => write!(f, "Invalid square: {}", msg),
            BoardServiceError::InvalidPromotion(msg) => write!(f, "Invalid promotion: {}", msg),
            BoardServiceError::IllegalMove(msg) => write!(f, "Illegal move: {}", msg),
        }
    }
}

impl std::error::Error for BoardServiceError {}
