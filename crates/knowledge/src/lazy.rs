//! Resettable single-flight initialization.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::OnceCell;

/// A value computed at most once per generation, shared by all callers.
///
/// Concurrent first callers wait on the same initialization future.
/// [`LazySlot::reset`] starts a new generation; callers already waiting on
/// the previous one still receive its value. The lock only guards the cell
/// pointer and is never held across an `.await`.
pub struct LazySlot<T> {
    cell: RwLock<Arc<OnceCell<T>>>,
}

impl<T: Clone> LazySlot<T> {
    pub fn new() -> Self {
        Self {
            cell: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    fn current(&self) -> Arc<OnceCell<T>> {
        self.cell
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the value, running `init` if this generation has none yet.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = self.current();
        cell.get_or_init(init).await.clone()
    }

    /// The value, if this generation has finished initializing.
    pub fn get(&self) -> Option<T> {
        self.current().get().cloned()
    }

    /// Drop the current value; the next caller initializes again.
    pub fn reset(&self) {
        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
    }
}

impl<T: Clone> Default for LazySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_initialize_once() {
        let slot = Arc::new(LazySlot::<usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let slot = slot.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                slot.get_or_init(|| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    runs.fetch_add(1, Ordering::SeqCst) + 1
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_starts_a_new_generation() {
        let slot = LazySlot::new();
        assert_eq!(slot.get(), None);
        assert_eq!(slot.get_or_init(|| async { 1 }).await, 1);
        assert_eq!(slot.get_or_init(|| async { 2 }).await, 1);

        slot.reset();
        assert_eq!(slot.get(), None);
        assert_eq!(slot.get_or_init(|| async { 3 }).await, 3);
    }
}
