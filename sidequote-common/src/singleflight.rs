//! Per-key suppression of duplicate in-flight work.
//!
//! For any key, at most one computation runs at a time; callers that arrive
//! while it is running await its result instead of recomputing.

use std::{collections::hash_map::Entry, collections::HashMap, future::Future, hash::Hash, sync::Arc};

use tokio::sync::Mutex;

type Flight<V, E> = Arc<Mutex<Option<Result<V, E>>>>;

enum Role<V, E> {
    Leader(tokio::sync::OwnedMutexGuard<Option<Result<V, E>>>),
    Follower(Flight<V, E>),
}

/// Collapses concurrent computations for the same key into one execution.
///
/// The first caller for a key becomes the leader and runs its closure;
/// followers for the same key block until the leader finishes and then
/// share its result, success or failure. If a leader is cancelled before
/// producing a result, the next waiting caller takes over with its own
/// closure.
pub struct SingleFlight<K, V, E> {
    inflight: Mutex<HashMap<K, Flight<V, E>>>,
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self { inflight: Mutex::new(HashMap::new()) }
    }

    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // Consumed exactly once, on the leader path.
        let mut work = Some(work);
        loop {
            let role = {
                let mut inflight = self.inflight.lock().await;
                match inflight.entry(key.clone()) {
                    Entry::Occupied(occupied) => Role::Follower(occupied.get().clone()),
                    Entry::Vacant(vacant) => {
                        let flight: Flight<V, E> = Arc::new(Mutex::new(None));
                        // Take the slot lock before the flight becomes
                        // visible so followers cannot observe an empty slot
                        // while the leader is still alive. A fresh mutex is
                        // always free.
                        match flight.clone().try_lock_owned() {
                            Ok(guard) => {
                                vacant.insert(flight);
                                Role::Leader(guard)
                            }
                            Err(_) => continue,
                        }
                    }
                }
            };

            match role {
                Role::Leader(mut slot) => {
                    // Leading consumes the closure and returns, so a caller
                    // can reach this arm at most once.
                    let Some(work) = work.take() else {
                        unreachable!("single-flight caller led twice")
                    };
                    let result = work().await;
                    *slot = Some(result.clone());
                    drop(slot);
                    self.inflight.lock().await.remove(&key);
                    return result;
                }
                Role::Follower(flight) => {
                    let slot = flight.lock().await;
                    if let Some(result) = slot.clone() {
                        return result;
                    }
                    drop(slot);
                    // The leader was cancelled before storing a result.
                    // Drop the stale flight and retry, possibly as leader.
                    let mut inflight = self.inflight.lock().await;
                    if let Some(current) = inflight.get(&key) {
                        if Arc::ptr_eq(current, &flight) {
                            inflight.remove(&key);
                        }
                    }
                }
            }
        }
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn increment_counter(counter: Arc<Mutex<u32>>) -> Result<u32, String> {
        let mut guard = counter.lock().await;
        *guard += 1;
        // Hold the computation open long enough for followers to pile up.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(*guard)
    }

    #[test_log::test(tokio::test)]
    async fn sequential_calls_each_execute() {
        let counter = Arc::new(Mutex::new(0));
        let flight = SingleFlight::<&str, u32, String>::new();

        let first = flight
            .run("k0", || increment_counter(counter.clone()))
            .await
            .unwrap();
        let second = flight
            .run("k0", || increment_counter(counter.clone()))
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
    }

    #[test_log::test(tokio::test)]
    async fn parallel_calls_collapse_into_one_execution() {
        let counter = Arc::new(Mutex::new(0));
        let flight = Arc::new(SingleFlight::<&str, u32, String>::new());

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move { flight.run("k0", || increment_counter(counter)).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(1));
        }

        assert_eq!(*counter.lock().await, 1);
    }

    #[test_log::test(tokio::test)]
    async fn distinct_keys_do_not_block_each_other() {
        let counter = Arc::new(Mutex::new(0));
        let flight = Arc::new(SingleFlight::<u32, u32, String>::new());

        let tasks: Vec<_> = (0..4u32)
            .map(|key| {
                let flight = Arc::clone(&flight);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move { flight.run(key, || increment_counter(counter)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(*counter.lock().await, 4);
    }

    #[test_log::test(tokio::test)]
    async fn leader_errors_are_shared_with_followers() {
        let flight = Arc::new(SingleFlight::<&str, u32, String>::new());
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let flight = Arc::clone(&flight);
                tokio::spawn(async move {
                    flight
                        .run("k0", || async {
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                            Err::<u32, _>("boom".to_string())
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), Err("boom".to_string()));
        }
    }
}
