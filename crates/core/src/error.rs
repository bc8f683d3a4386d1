use apr_store::StoreError;
use apr_types::TextError;

/// Errors that can occur during core record operations.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] TextError),
    #[error("patient {0} was not found")]
    PatientNotFound(String),
    #[error("procedure {0} was not found")]
    ProcedureNotFound(String),
    #[error("failed to update {target}: {source}")]
    UpdateFailed {
        target: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;
