use crate::request::ProductGid;
use crate::store::{CounterStore, InMemoryStore, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory store that counts upstream calls and can be told to fail like a broken network.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Widens the window between read and write so unserialized increments would collide.
    pub read_delay: Option<Duration>,
}

impl RecordingStore {
    pub fn with_read_delay(delay: Duration) -> Self {
        RecordingStore {
            read_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

fn unavailable() -> StoreError {
    StoreError::MalformedResponse("simulated upstream failure".into())
}

#[async_trait]
impl CounterStore for RecordingStore {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn get(&self, product: &ProductGid) -> Result<u64, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let value = self.inner.get(product).await?;
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(value)
    }

    async fn set(&self, product: &ProductGid, count: u64) -> Result<u64, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.set(product, count).await
    }
}
