use crate::errors::RequestError;
use crate::product_locks::ProductLocks;
use crate::request::{Action, ViewCountRequest};
use crate::store::CounterStore;
use std::sync::Arc;

/// Dispatches a validated request to the store.
///
/// - `GetCount` reads the stored count.
/// - `IncrementCount` with a supplied count writes that count.
/// - `IncrementCount` without one reads, adds one and writes back.
///
/// Writes for the same product are serialized so concurrent increments are not lost.
pub struct ViewCounter {
    store: Arc<dyn CounterStore>,
    locks: ProductLocks,
}

impl ViewCounter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            locks: ProductLocks::new(),
        }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub async fn execute(&self, request: &ViewCountRequest) -> Result<u64, RequestError> {
        let product = &request.product_gid;

        match request.action {
            Action::GetCount => Ok(self.store.get(product).await?),
            Action::IncrementCount => {
                let _guard = self.locks.lock(product).await;

                let target = match request.supplied_count {
                    Some(count) => count,
                    None => self.store.get(product).await?.saturating_add(1),
                };

                let written = self.store.set(product, target).await?;
                tracing::debug!(product = %product, total_views = written, "Updated view count");
                Ok(written)
            }
        }
    }
}
