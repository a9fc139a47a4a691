//! Ownership primitive shared by every container.
//!
//! Values are stored as `Arc<T>` handles. A container holds exactly one
//! strong reference per live entry: taking a handle in is the "acquire",
//! dropping the stored handle is the "release". `Managed<T>` attaches a
//! destructor that runs exactly once, when the last reference goes away.

use core::fmt;
use core::ops::{Deref, DerefMut};
use std::sync::Arc;

type Destructor<T> = Box<dyn FnOnce(&mut T) + Send + Sync>;

/// A value with a destructor that runs when the last handle is released.
pub struct Managed<T> {
    value: T,
    destructor: Option<Destructor<T>>,
}

impl<T> Managed<T> {
    pub fn new<F>(value: T, destructor: F) -> Self
    where
        F: FnOnce(&mut T) + Send + Sync + 'static,
    {
        Self {
            value,
            destructor: Some(Box::new(destructor)),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }
}

impl<T> Deref for Managed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Managed<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Managed").field(&self.value).finish()
    }
}

impl<T> Drop for Managed<T> {
    fn drop(&mut self) {
        if let Some(destructor) = self.destructor.take() {
            destructor(&mut self.value);
        }
    }
}

/// Allocate a shared handle whose `destructor` runs once the count hits zero.
pub fn allocate<T, F>(value: T, destructor: F) -> Arc<Managed<T>>
where
    F: FnOnce(&mut T) + Send + Sync + 'static,
{
    Arc::new(Managed::new(value, destructor))
}

/// Take one more reference on `handle`.
#[inline]
pub fn acquire<T: ?Sized>(handle: &Arc<T>) -> Arc<T> {
    Arc::clone(handle)
}

/// Give back one reference. Returns true if it was the last one, in which
/// case the value has been dropped.
#[inline]
pub fn release<T>(handle: Arc<T>) -> bool {
    match Arc::into_inner(handle) {
        Some(value) => {
            drop(value);
            true
        }
        None => false,
    }
}

/// Number of live references on `handle`, including `handle` itself.
#[inline]
pub fn strong_count<T: ?Sized>(handle: &Arc<T>) -> usize {
    Arc::strong_count(handle)
}
