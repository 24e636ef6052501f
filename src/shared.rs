// Shared - one lock per engine instance for multi-threaded hosts
//
// Every operation runs inside the same critical section, so no two calls on
// one ledger or auction ever interleave.

use std::sync::{Arc, Mutex, PoisonError, TryLockError};

/// Cloneable handle serializing access to a single engine
///
/// The lock is held while the engine runs its collaborator effects. A
/// collaborator that calls back into the same handle through `with` will
/// deadlock; re-entrant collaborators must use `try_with`, which refuses the
/// call instead of blocking.
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Run `f` with exclusive access. A poisoned lock is recovered.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Run `f` only if the lock is free right now
    ///
    /// Returns None while another call holds the engine, including a call
    /// further up the same thread's stack.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(f(&mut guard))
    }

    /// Take the engine back if this is the last handle
    pub fn try_unwrap(self) -> Result<T, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(Self { inner }),
        }
    }

    /// Number of live handles
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
