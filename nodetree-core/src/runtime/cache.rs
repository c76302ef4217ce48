//! Lazily Computed Cache
//!
//! `CacheMutex` holds a value that is recomputed on demand after it has been
//! tagged dirty.
//!
//! # How It Works
//!
//! 1. The dirty check is a single atomic load. Reading a valid cache then
//!    clones the `Arc` under an uncontended read lock.
//!
//! 2. When the cache is dirty, the computing thread takes the compute mutex
//!    and checks the flag again. Threads that lost the race find a valid
//!    cache after waiting and return the value computed by the winner.
//!
//! 3. The value is handed out as an `Arc`. Repeated reads without a tag in
//!    between return the same allocation, and a reader can keep using its
//!    copy while the owner keeps editing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// A value that is recomputed after being tagged dirty.
pub struct CacheMutex<T> {
    valid: AtomicBool,
    compute_lock: Mutex<()>,
    data: RwLock<Option<Arc<T>>>,
}

impl<T> CacheMutex<T> {
    /// Create a dirty, empty cache.
    pub fn new() -> Self {
        Self {
            valid: AtomicBool::new(false),
            compute_lock: Mutex::new(()),
            data: RwLock::new(None),
        }
    }

    /// Return the cached value, computing it first if the cache is dirty.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> T) -> Arc<T> {
        if let Some(data) = self.get_valid() {
            return data;
        }
        let _guard = self.compute_lock.lock();
        if let Some(data) = self.get_valid() {
            return data;
        }
        let data = Arc::new(compute());
        *self.data.write() = Some(Arc::clone(&data));
        self.valid.store(true, Ordering::Release);
        data
    }

    fn get_valid(&self) -> Option<Arc<T>> {
        if !self.valid.load(Ordering::Acquire) {
            return None;
        }
        self.data.read().clone()
    }

    /// Mark the value as outdated. The next read recomputes it.
    pub fn tag_dirty(&self) {
        self.valid.store(false, Ordering::Release);
    }

    /// Whether the next read recomputes the value.
    pub fn is_dirty(&self) -> bool {
        !self.valid.load(Ordering::Acquire)
    }

    /// The last computed value, even if it is outdated.
    pub fn get(&self) -> Option<Arc<T>> {
        self.data.read().clone()
    }
}

impl<T> Default for CacheMutex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CacheMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheMutex")
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn computes_once_while_valid() {
        let cache = CacheMutex::new();
        let runs = AtomicUsize::new(0);
        let compute = || {
            runs.fetch_add(1, Ordering::SeqCst);
            42
        };

        let first = cache.get_or_compute(compute);
        let second = cache.get_or_compute(compute);
        assert_eq!(*first, 42);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tag_dirty_forces_recompute() {
        let cache = CacheMutex::new();
        assert!(cache.is_dirty());
        assert!(cache.get().is_none());

        let first = cache.get_or_compute(|| 1);
        cache.tag_dirty();
        assert!(cache.is_dirty());
        // The outdated value is still readable.
        assert_eq!(cache.get().as_deref(), Some(&1));

        let second = cache.get_or_compute(|| 2);
        assert_eq!(*second, 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!cache.is_dirty());
    }

    #[test]
    fn concurrent_readers_share_one_computation() {
        let cache = Arc::new(CacheMutex::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let runs = Arc::clone(&runs);
                std::thread::spawn(move || {
                    *cache.get_or_compute(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        7
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 7);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
