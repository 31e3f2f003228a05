use crate::request::ProductGid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per product, created on demand and dropped once nobody holds or waits for it.
///
/// Serializes read-modify-write cycles for the same product within this process.
/// Separate proxy instances are not coordinated.
#[derive(Default)]
pub struct ProductLocks {
    locks: Mutex<HashMap<ProductGid, Arc<AsyncMutex<()>>>>,
}

pub struct ProductGuard<'a> {
    locks: &'a ProductLocks,
    product: ProductGid,
    _guard: OwnedMutexGuard<()>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, product: &ProductGid) -> ProductGuard<'_> {
        let mutex = self.locks.lock().entry(product.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;

        ProductGuard {
            locks: self,
            product: product.clone(),
            _guard: guard,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

impl Drop for ProductGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock();
        // The map and this guard hold one reference each. More means someone is waiting.
        if locks
            .get(&self.product)
            .is_some_and(|mutex| Arc::strong_count(mutex) <= 2)
        {
            locks.remove(&self.product);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn product(id: u64) -> ProductGid {
        format!("gid://shopify/Product/{id}").parse().unwrap()
    }

    #[tokio::test]
    async fn test_entries_are_released() {
        let locks = ProductLocks::new();
        {
            let _a = locks.lock(&product(1)).await;
            let _b = locks.lock(&product(2)).await;
            assert_eq!(locks.len(), 2);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_same_product_is_exclusive() {
        let locks = Arc::new(ProductLocks::new());
        let guard = locks.lock(&product(1)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&product(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        // a different product is not blocked
        let _other = locks.lock(&product(2)).await;

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire the lock")
            .unwrap();
    }
}
