use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by core operations. A rate-limit rejection is an
/// `Admission`, not an error.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A webhook referenced something it did not carry, e.g. a checkout
    /// without `custom_data.user_id`.
    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<crate::content::validate::ContentIdError> for CoreError {
    fn from(err: crate::content::validate::ContentIdError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

impl From<crate::content::model::UnknownContentType> for CoreError {
    fn from(err: crate::content::model::UnknownContentType) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}
