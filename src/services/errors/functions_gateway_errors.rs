#[derive(Debug)]
pub enum FunctionsError {
    Serialization(String),
    Invoke(String),
    /// The function ran but reported an execution error.
    FunctionFailed(String),
}

impl std::fmt::Display for FunctionsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionsError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            FunctionsError::Invoke(msg) => write!(f, "Invocation error: {}", msg),
            FunctionsError::FunctionFailed(msg) => write!(f, "Function error: {}", msg),
        }
    }
}

impl std::error::Error for FunctionsError {}
