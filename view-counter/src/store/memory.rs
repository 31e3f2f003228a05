use super::{CounterStore, StoreError};
use crate::request::ProductGid;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process-local counts. Nothing is persisted: every count is lost on restart
/// and each proxy instance sees its own numbers. Only for local development.
#[derive(Default)]
pub struct InMemoryStore {
    counts: Mutex<HashMap<ProductGid, u64>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, product: &ProductGid) -> Result<u64, StoreError> {
        Ok(self.counts.lock().get(product).copied().unwrap_or(0))
    }

    async fn set(&self, product: &ProductGid, count: u64) -> Result<u64, StoreError> {
        self.counts.lock().insert(product.clone(), count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_set() {
        let store = InMemoryStore::new();
        let product: ProductGid = "gid://shopify/Product/1".parse().unwrap();
        let other: ProductGid = "gid://shopify/Product/2".parse().unwrap();

        assert_eq!(store.get(&product).await.unwrap(), 0);
        assert_eq!(store.set(&product, 5).await.unwrap(), 5);
        assert_eq!(store.get(&product).await.unwrap(), 5);
        assert_eq!(store.get(&other).await.unwrap(), 0);
    }
}
