use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run `work` once per key, each on its own task with at most `limit` in
/// flight, and wait for every task to finish.
///
/// Every key is present in the returned map. A task that panicked or was
/// aborted leaves `None` for its key; results are never shared between tasks.
pub async fn fan_out<K, T, F, Fut>(
    keys: impl IntoIterator<Item = K>,
    limit: usize,
    work: F,
) -> BTreeMap<K, Option<T>>
where
    K: Ord + Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let permits = Arc::new(Semaphore::new(limit.max(1)));
    let mut results = BTreeMap::new();
    let mut tasks = JoinSet::new();

    for key in keys {
        results.insert(key.clone(), None);
        let permits = permits.clone();
        let unit = work(key.clone());
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            (key, unit.await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, value)) => {
                results.insert(key, Some(value));
            }
            Err(e) => tracing::warn!("Worker task failed: {}", e),
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_every_key_gets_a_result() {
        let results = fan_out(1..=5u32, 2, |n| async move { n * 10 }).await;
        assert_eq!(results.len(), 5);
        assert_eq!(results[&3], Some(30));
    }

    #[tokio::test]
    async fn test_limit_caps_in_flight_work() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let results = fan_out(0..12u32, 3, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_panicking_unit_is_contained() {
        let results = fan_out(["a", "b", "c"], 4, |k| async move {
            if k == "b" {
                panic!("unit b blew up");
            }
            k.len()
        })
        .await;

        assert_eq!(results["a"], Some(1));
        assert_eq!(results["b"], None);
        assert_eq!(results["c"], Some(1));
    }

    #[tokio::test]
    async fn test_zero_limit_still_makes_progress() {
        let results = fan_out(0..3u8, 0, |n| async move { n }).await;
        assert!(results.values().all(Option::is_some));
    }
}
