//! Error types for Deskflow

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ticket already assigned")]
    AlreadyAssigned,

    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence or connectivity failure; scheduled ticks log it and retry on the next tick
    #[error("Store error: {0}")]
    Store(String),
}

impl DeskError {
    /// Transient failures are worth another attempt; everything else is a rejected operation
    pub fn is_transient(&self) -> bool {
        matches!(self, DeskError::Store(_))
    }
}

impl From<sqlx::Error> for DeskError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DeskError::NotFound("row".to_string()),
            sqlx::Error::Database(db_err) => {
                // PostgreSQL unique violation
                if db_err.code().as_deref() == Some("23505") {
                    return DeskError::Validation("Resource already exists".to_string());
                }
                DeskError::Store(db_err.to_string())
            }
            _ => DeskError::Store(err.to_string()),
        }
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
