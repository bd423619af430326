use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded connection pool for a vector backend; acquire with a permit,
/// release on all exit paths. Shaped after a semaphore-gated round robin
/// over a fixed set of handles, generalised to any cheaply-cloneable
/// connection handle.
pub struct ConnectionPool<C> {
    connections: Vec<C>,
    semaphore: Arc<Semaphore>,
    next: AtomicUsize,
}

impl<C: Clone> ConnectionPool<C> {
    pub fn new(connections: Vec<C>) -> Self {
        let size = connections.len().max(1);
        Self {
            connections,
            semaphore: Arc::new(Semaphore::new(size)),
            next: AtomicUsize::new(0),
        }
    }

    /// Acquires a permit with a timeout, then leases a connection by
    /// round-robin. Returns `None` on timeout so the caller can fail fast
    /// rather than queue unboundedly.
    pub async fn acquire(&self, timeout: std::time::Duration) -> Option<ConnectionLease<C>> {
        let permit = tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned())
            .await
            .ok()?
            .ok()?;
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len().max(1);
        let connection = self.connections.get(idx)?.clone();
        Some(ConnectionLease {
            _permit: permit,
            connection,
        })
    }
}

/// Scoped acquisition: the permit (and therefore the slot) is released when
/// this value is dropped, on every exit path including panics and
/// cancellation.
pub struct ConnectionLease<C> {
    _permit: OwnedSemaphorePermit,
    connection: C,
}

impl<C> ConnectionLease<C> {
    pub fn connection(&self) -> &C {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_round_robins_and_releases_on_drop() {
        let pool = ConnectionPool::new(vec!["a", "b"]);
        let lease1 = pool.acquire(std::time::Duration::from_millis(100)).await.unwrap();
        assert_eq!(*lease1.connection(), "a");
        drop(lease1);
        let lease2 = pool.acquire(std::time::Duration::from_millis(100)).await.unwrap();
        assert_eq!(*lease2.connection(), "b");
    }

    #[tokio::test]
    async fn acquire_times_out_when_pool_exhausted() {
        let pool = ConnectionPool::new(vec![1]);
        let _held = pool.acquire(std::time::Duration::from_millis(50)).await.unwrap();
        let second = pool.acquire(std::time::Duration::from_millis(10)).await;
        assert!(second.is_none());
    }
}
