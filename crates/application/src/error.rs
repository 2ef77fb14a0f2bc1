use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::events::BroadcastError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
