pub mod admin_api;
pub mod memory;

use crate::metafield::DecodeError;
use crate::request::ProductGid;
use async_trait::async_trait;
use hyper::StatusCode;

pub use admin_api::AdminApiStore;
pub use memory::InMemoryStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    UpstreamStatus(StatusCode),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("upstream GraphQL errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    /// Field-level validation errors returned by the mutation itself
    #[error("upstream rejected the write: {}", .0.join("; "))]
    WriteRejected(Vec<String>),

    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("stored value is not a view count: {0}")]
    InvalidValue(#[from] DecodeError),
}

/// Where view counts live.
#[async_trait]
pub trait CounterStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Current count for the product. A product without a stored count reads as zero.
    async fn get(&self, product: &ProductGid) -> Result<u64, StoreError>;

    /// Overwrites the count and returns the value now stored.
    async fn set(&self, product: &ProductGid, count: u64) -> Result<u64, StoreError>;
}
