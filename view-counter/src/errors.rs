use crate::store::StoreError;
use hyper::StatusCode;
use thiserror::Error;

/// Errors that stop the service from running
#[derive(Error, Debug)]
pub enum ViewCounterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ValidationError),

    #[error("failed to set up the counter store: {0}")]
    Store(#[from] crate::store::admin_api::AdminApiStoreError),
}

/// Errors that terminate a single inbound request
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("request body could not be read: {0}")]
    UnreadableBody(String),

    #[error("request body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("action is missing")]
    MissingAction,

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("productGid is missing")]
    MissingProductGid,

    #[error("productGid is invalid: {0}")]
    InvalidProductGid(String),

    #[error("totalViews must be a non-negative integer")]
    InvalidTotalViews,

    #[error("signature header is missing")]
    MissingSignature,

    #[error("signature does not match")]
    InvalidSignature,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::UnreadableBody(_)
            | RequestError::InvalidBody(_)
            | RequestError::MissingAction
            | RequestError::UnknownAction(_)
            | RequestError::MissingProductGid
            | RequestError::InvalidProductGid(_)
            | RequestError::InvalidTotalViews => StatusCode::BAD_REQUEST,
            RequestError::MissingSignature | RequestError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            RequestError::Store(StoreError::ProductNotFound(_)) => StatusCode::NOT_FOUND,
            RequestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the caller. Upstream details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            RequestError::Store(StoreError::ProductNotFound(_)) => "product not found".into(),
            RequestError::Store(StoreError::WriteRejected(_)) => {
                "failed to update view count".into()
            }
            RequestError::Store(_) => "upstream request failed".into(),
            RequestError::MissingSignature | RequestError::InvalidSignature => {
                "unauthorized request".into()
            }
            other => other.to_string(),
        }
    }
}
