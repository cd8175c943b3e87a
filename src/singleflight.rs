//! Single-flight coalescing (A4, §5, §9): concurrent requests sharing a
//! fingerprint collapse onto one in-flight pipeline execution.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type Cell<T> = Arc<OnceCell<T>>;

/// An in-process map from fingerprint to a shared, awaitable result cell.
/// Purely an optimization: if this were removed entirely the pipeline stays
/// correct, just with duplicate backend/classifier calls under concurrent
/// identical requests (§5). Generic over `T` so both successful responses
/// and fatal pipeline errors can be coalesced alike.
#[derive(Default)]
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    inflight: Mutex<HashMap<String, Cell<T>>>,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self { inflight: Mutex::new(HashMap::new()) }
    }

    /// Runs `produce` at most once per fingerprint among concurrent callers;
    /// everyone else awaits the same result. The entry is removed once the
    /// leader's future resolves, win or lose, so a later distinct request
    /// for the same fingerprint runs fresh rather than reusing a stale cell.
    pub async fn run<F, Fut>(&self, fingerprint: &str, produce: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(fingerprint.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let result = cell.get_or_init(produce).await.clone();

        let mut inflight = self.inflight.lock().await;
        inflight.remove(fingerprint);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_identical_fingerprints_share_one_execution() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run("fp", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        1u32
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_fingerprints_both_execute() {
        let flight = SingleFlight::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c1 = calls.clone();
        flight.run("a", || async move { c1.fetch_add(1, Ordering::SeqCst); 1u32 }).await;
        let c2 = calls.clone();
        flight.run("b", || async move { c2.fetch_add(1, Ordering::SeqCst); 1u32 }).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
