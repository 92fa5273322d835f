//! Mutable cells.
//!
//! - [`Reference`]: an exclusively owned box around a value
//! - [`Atomic`]: a shareable cell serializing every access through one lock

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An exclusively owned, mutable box around some value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reference<T> {
    /// The underlying value.
    pub value: T,
}

impl<T> Reference<T> {
    /// Box `value`.
    pub const fn new(value: T) -> Self {
        Self { value }
    }

    /// Swap in `value`, returning the previous one.
    pub fn replace(&mut self, value: T) -> T {
        std::mem::replace(&mut self.value, value)
    }

    /// Unwrap the underlying value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> From<T> for Reference<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> Deref for Reference<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Reference<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// A shareable cell whose reads and read-modify-writes are sequentially
/// consistent across every clone.
///
/// Clones share the same value. Each access holds the lock for the whole
/// closure, so a [`sync`](Atomic::sync) call is atomic with respect to
/// every other access.
///
/// # Example
///
/// ```
/// use composable_request_core::reference::Atomic;
///
/// let counter = Atomic::new(0);
/// let shared = counter.clone();
/// shared.mutate(|value| *value += 1);
/// assert_eq!(counter.value(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Atomic<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for Atomic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Atomic<T> {
    /// Create a new cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(value)),
        }
    }

    // A panic inside a closure cannot leave `T` half-written in a way the
    // cell could detect, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `transform` with exclusive access to the value.
    pub fn sync<R>(&self, transform: impl FnOnce(&mut T) -> R) -> R {
        transform(&mut self.lock())
    }

    /// Mutate the value in place.
    pub fn mutate(&self, transform: impl FnOnce(&mut T)) {
        self.sync(transform);
    }

    /// Replace the value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.sync(|current| std::mem::replace(current, value))
    }
}

impl<T: Clone> Atomic<T> {
    /// A snapshot of the current value.
    #[must_use]
    pub fn value(&self) -> T {
        self.lock().clone()
    }
}
