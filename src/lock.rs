//! Scoped reader/writer lock
//!
//! Thin wrapper over `parking_lot::RwLock` that hands out named scope
//! objects. Dropping a scope (or calling `release`) restores the lock.
//! Not re-entrant: acquiring a second scope on the same thread while
//! holding a write scope deadlocks.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::{Deref, DerefMut};

/// Reader/writer lock guarding a value of type `T`.
#[derive(Debug, Default)]
pub struct ScopedLock<T> {
    inner: RwLock<T>,
}

impl<T> ScopedLock<T> {
    pub fn new(value: T) -> Self {
        Self { inner: RwLock::new(value) }
    }

    /// Shared acquisition. Blocks while a writer holds the lock.
    pub fn read_acquire(&self) -> ReadScope<'_, T> {
        ReadScope { guard: self.inner.read() }
    }

    /// Exclusive acquisition. Blocks until every reader and writer is gone.
    pub fn write_acquire(&self) -> WriteScope<'_, T> {
        WriteScope { guard: self.inner.write() }
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Shared scope. Many may exist at once.
pub struct ReadScope<'a, T> {
    guard: RwLockReadGuard<'a, T>,
}

impl<T> ReadScope<'_, T> {
    /// End the scope early.
    pub fn release(self) {}
}

impl<T> Deref for ReadScope<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

/// Exclusive scope.
pub struct WriteScope<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> WriteScope<'_, T> {
    /// End the scope early.
    pub fn release(self) {}
}

impl<T> Deref for WriteScope<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for WriteScope<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
