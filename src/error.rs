use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisbursementError {
    #[error("Invalid year length {0}: must be 365 or 366")]
    InvalidYearLength(u32),

    #[error("Invalid join mode '{0}': must be 'left' or 'inner'")]
    InvalidJoinMode(String),

    #[error("Invalid disbursement reference column '{0}': must be 'NoOperacion' or 'IDOperacion'")]
    InvalidReferenceKey(String),

    #[error("Missing column '{column}' in {table} table")]
    MissingColumn { table: String, column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),
}

impl DisbursementError {
    /// Configuration errors are reported before any processing starts.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidYearLength(_) | Self::InvalidJoinMode(_) | Self::InvalidReferenceKey(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DisbursementError>;
