//! Synchronization policies for containers.
//!
//! Every container is generic over `L: Locking`. `Synced` guards state with
//! a `parking_lot::RwLock`: lookups share the lock, structural mutations
//! take it exclusively. `Unsynced` uses a reentrancy-checked cell and makes
//! the container `!Sync`, so it can only be shared within one thread.
//!
//! Access goes through closures so that a lock is never held past the end
//! of a single operation. Callers that release values must move them out of
//! the closure and drop them after the lock is released.

use crate::reentrancy::ReentrancyCell;
use parking_lot::RwLock;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Synced {}
    impl Sealed for super::Unsynced {}
}

pub trait Locking: sealed::Sealed + 'static {
    type Lock<T>;

    /// Whether concurrent access from several threads is supported.
    const SYNCED: bool;

    fn new<T>(value: T) -> Self::Lock<T>;

    fn read<T, R>(lock: &Self::Lock<T>, f: impl FnOnce(&T) -> R) -> R;

    fn write<T, R>(lock: &Self::Lock<T>, f: impl FnOnce(&mut T) -> R) -> R;
}

/// Reader/writer locked; containers are `Send + Sync` when their values are.
#[derive(Debug)]
pub enum Synced {}

/// No locking; containers are confined to one thread.
#[derive(Debug)]
pub enum Unsynced {}

impl Locking for Synced {
    type Lock<T> = RwLock<T>;

    const SYNCED: bool = true;

    #[inline]
    fn new<T>(value: T) -> RwLock<T> {
        RwLock::new(value)
    }

    #[inline]
    fn read<T, R>(lock: &RwLock<T>, f: impl FnOnce(&T) -> R) -> R {
        f(&lock.read())
    }

    #[inline]
    fn write<T, R>(lock: &RwLock<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut lock.write())
    }
}

impl Locking for Unsynced {
    type Lock<T> = ReentrancyCell<T>;

    const SYNCED: bool = false;

    #[inline]
    fn new<T>(value: T) -> ReentrancyCell<T> {
        ReentrancyCell::new(value)
    }

    #[inline]
    fn read<T, R>(lock: &ReentrancyCell<T>, f: impl FnOnce(&T) -> R) -> R {
        f(&lock.enter())
    }

    #[inline]
    fn write<T, R>(lock: &ReentrancyCell<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut lock.enter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump<L: Locking>() -> u32 {
        let lock = L::new(1u32);
        L::write(&lock, |v| *v += 1);
        L::read(&lock, |v| *v)
    }

    #[test]
    fn both_policies_read_back_writes() {
        assert_eq!(bump::<Synced>(), 2);
        assert_eq!(bump::<Unsynced>(), 2);
    }

    #[test]
    fn policy_flags() {
        assert!(Synced::SYNCED);
        assert!(!Unsynced::SYNCED);
    }
}
