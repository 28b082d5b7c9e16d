use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntelError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Pipeline input error: {0}")]
    PipelineInput(String),

    #[error("Analysis unit {id} has {active} active execution(s)")]
    ActiveExecutions { id: String, active: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid command line arguments: {0}")]
    InvalidArguments(String),

    #[error("Categorization error: {0}")]
    Categorization(String),

    #[error("Intelligence delivery failed: {0}")]
    Delivery(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IntelError>;

impl IntelError {
    /// Process exit code used by the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            IntelError::InvalidArguments(_) | IntelError::Config(_) => 2,
            IntelError::PipelineInput(_)
            | IntelError::IoError(_)
            | IntelError::SerializationError(_) => 4,
            _ => 1,
        }
    }
}
