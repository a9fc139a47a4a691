//! rc-containers: thread-safe containers of reference-counted values.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: shared building blocks for components that need concurrent
//!   collections of `Arc`-managed values, with iteration that stays
//!   well-defined while other threads mutate the container.
//! - Pieces:
//!   - `List<T, L>`: circular doubly-linked list with positional insert and
//!     remove, linear search, and a mutation-aware cursor.
//!   - `HashTable<K, V, L>`: chained hash table over byte-string keys whose
//!     entries are also threaded onto an insertion-order list.
//!   - `Bitset` and `IdAllocator`: fixed-size bit vector with word-at-a-time
//!     scans, and a cyclic allocator of small integer ids built on it.
//!
//! Ownership
//! - Values are `Arc<T>`. A container holds exactly one strong reference
//!   per live entry. Inserting moves the caller's handle in; `remove` moves
//!   the container's handle out; `get` and iteration clone an extra one.
//! - Replaced, cleared and iterator-removed values are moved out of the
//!   locked section and dropped after the lock is released, so destructors
//!   may call back into the container.
//! - `ownership::Managed<T>` attaches a run-once destructor to a value for
//!   callers that need a hook on the last release.
//!
//! Storage
//! - Entries live in a `SlotMap` arena and link to each other by
//!   generational key. There are no raw pointers; a removed entry's key
//!   never resolves again, even after its slot is reused.
//!
//! Concurrency
//! - Each container is generic over a `Locking` policy. `Synced` (default)
//!   uses a `parking_lot::RwLock`: lookups share it, mutations take it
//!   exclusively. `Unsynced` uses a reentrancy-checked cell and is `!Sync`.
//! - Locks are held for one operation only, never across iterator steps.
//!   Containers carry a modification counter; iterators snapshot it and
//!   every step fails with `Error::ConcurrentModification` if it moved.
//!   Removing through the iterator advances the snapshot.
//!
//! Notes and non-goals
//! - The hash table never rehashes; its bucket count is chosen once from
//!   the capacity hint.
//! - No lock-free algorithms; no persistence.

pub mod bitset;
pub mod error;
pub mod hash_table;
mod hash_table_proptest;
pub mod id_alloc;
pub mod list;
pub mod lock;
pub mod ownership;
mod reentrancy;

// Public surface
pub use bitset::Bitset;
pub use error::{Error, Result};
pub use hash_table::{HashTable, TableConfig, TableIter};
pub use id_alloc::IdAllocator;
pub use list::{EntryId, List, ListIter};
pub use lock::{Locking, Synced, Unsynced};
pub use ownership::Managed;
