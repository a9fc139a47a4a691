//! Reentrancy-checked cell for unsynchronized containers.
//!
//! Single-threaded structure to detect accidental reentrancy into a
//! container, e.g. a value destructor or a comparison callback that calls
//! back into the container while it is being mutated. Nested shared access
//! is allowed; any overlap with exclusive access panics.

use core::cell::{Ref, RefCell, RefMut};

/// Interior-mutable slot used by `Unsynced` containers. `!Sync`.
#[derive(Debug, Default)]
pub struct ReentrancyCell<T> {
    inner: RefCell<T>,
}

impl<T> ReentrancyCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// Enter a shared section. Panics if an exclusive section is active.
    #[inline]
    pub fn enter(&self) -> Ref<'_, T> {
        match self.inner.try_borrow() {
            Ok(r) => r,
            Err(_) => panic!("reentrancy detected: read during container mutation"),
        }
    }

    /// Enter an exclusive section. Panics if any other section is active.
    #[inline]
    pub fn enter_mut(&self) -> RefMut<'_, T> {
        match self.inner.try_borrow_mut() {
            Ok(r) => r,
            Err(_) => panic!("reentrancy detected: nested entry into container"),
        }
    }
}
