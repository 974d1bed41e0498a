use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per tour name. Conversion and ingestion of the same tour
/// share scene output directories, so they must not overlap.
#[derive(Debug, Default, Clone)]
pub struct TourLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl TourLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, tour_name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(tour_name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_tour_is_serialized() {
        let locks = TourLocks::new();
        let guard = locks.lock("demo").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.lock("demo").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_tours_do_not_block() {
        let locks = TourLocks::new();
        let _demo = locks.lock("demo").await;
        let other = tokio::time::timeout(Duration::from_millis(100), locks.lock("other")).await;
        assert!(other.is_ok());
    }
}
