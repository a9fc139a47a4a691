//! HashTable: chained hash table with an insertion-order overlay.
//!
//! Every entry is a single arena slot that sits on two structures at once:
//! the singly linked chain of its bucket and a doubly linked list in
//! insertion order. Lookups walk the bucket chain, iteration walks the order
//! list. Both sets of links are slot keys, never pointers.
//!
//! The bucket count is fixed at creation from a small table of prime-like
//! sizes; the table never rehashes.

use crate::error::{Error, Result};
use crate::lock::{Locking, Synced};
use core::cmp::Ordering;
use core::fmt;
use core::marker::PhantomData;
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;

new_key_type! {
    struct SlotKey;
}

/// Hash over key bytes.
pub type HashFn = fn(&[u8]) -> u32;

/// Total order over key bytes; `Equal` means same key.
pub type CompareFn = fn(&[u8], &[u8]) -> Ordering;

const BUCKET_SIZES: [usize; 16] = [
    7, 7, 7, 17, 31, 67, 127, 257, 509, 1021, 2053, 4093, 8191, 16381, 32771, 65521,
];

/// Capacity hint used when the caller passes 0.
pub const DEFAULT_CAPACITY: usize = 127;

/// Bucket count for a capacity hint, picked by the hint's highest set bit.
pub fn bucket_count(capacity: usize) -> usize {
    let capacity = if capacity == 0 {
        DEFAULT_CAPACITY
    } else {
        capacity
    };
    let msb = (usize::BITS - 1 - capacity.leading_zeros()) as usize;
    BUCKET_SIZES[msb.min(BUCKET_SIZES.len() - 1)]
}

/// 31-multiplier rolling hash. Bytes are sign-extended before mixing.
pub fn default_hash(key: &[u8]) -> u32 {
    key.iter()
        .fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(b as i8 as u32))
}

/// Shorter keys order first; equal lengths compare bytewise.
pub fn default_compare(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Construction parameters for a `HashTable`.
#[derive(Clone, Copy, Default)]
pub struct TableConfig {
    /// Capacity hint; 0 selects `DEFAULT_CAPACITY`.
    pub capacity: usize,
    pub hash: Option<HashFn>,
    pub compare: Option<CompareFn>,
}

impl fmt::Debug for TableConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableConfig")
            .field("capacity", &self.capacity)
            .field("custom_hash", &self.hash.is_some())
            .field("custom_compare", &self.compare.is_some())
            .finish()
    }
}

impl TableConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_hash(mut self, hash: HashFn) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn with_compare(mut self, compare: CompareFn) -> Self {
        self.compare = Some(compare);
        self
    }
}

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: Arc<V>,
    hash: u32,
    // next slot in the same bucket
    chain: Option<SlotKey>,
    prev: Option<SlotKey>,
    next: Option<SlotKey>,
}

struct Inner<K, V> {
    slots: SlotMap<SlotKey, Slot<K, V>>,
    buckets: Vec<Option<SlotKey>>,
    head: Option<SlotKey>,
    tail: Option<SlotKey>,
    mod_count: u64,
}

impl<K: AsRef<[u8]>, V> Inner<K, V> {
    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    fn find(&self, key: &[u8], hash: u32, compare: CompareFn) -> Option<SlotKey> {
        let mut cur = self.buckets[self.bucket_of(hash)];
        while let Some(k) = cur {
            let slot = &self.slots[k];
            if slot.hash == hash && compare(slot.key.as_ref(), key) == Ordering::Equal {
                return Some(k);
            }
            cur = slot.chain;
        }
        None
    }

    fn link(&mut self, key: K, value: Arc<V>, hash: u32) {
        let bucket = self.bucket_of(hash);
        let k = self.slots.insert(Slot {
            key,
            value,
            hash,
            chain: self.buckets[bucket],
            prev: self.tail,
            next: None,
        });
        self.buckets[bucket] = Some(k);
        match self.tail {
            Some(t) => self.slots[t].next = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);
    }

    /// Unlink a slot from its bucket chain and from the order list.
    fn unlink(&mut self, k: SlotKey) -> Option<Slot<K, V>> {
        let slot = self.slots.remove(k)?;

        let bucket = self.bucket_of(slot.hash);
        if self.buckets[bucket] == Some(k) {
            self.buckets[bucket] = slot.chain;
        } else {
            let mut cur = self.buckets[bucket];
            while let Some(c) = cur {
                let s = &mut self.slots[c];
                if s.chain == Some(k) {
                    s.chain = slot.chain;
                    break;
                }
                cur = s.chain;
            }
        }

        match slot.prev {
            Some(p) => self.slots[p].next = slot.next,
            None => self.head = slot.next,
        }
        match slot.next {
            Some(n) => self.slots[n].prev = slot.prev,
            None => self.tail = slot.prev,
        }
        Some(slot)
    }

    /// Unlink every slot, returning them in insertion order.
    fn drain(&mut self) -> Vec<Slot<K, V>> {
        let mut out = Vec::with_capacity(self.slots.len());
        let mut cur = self.head;
        while let Some(k) = cur {
            let Some(slot) = self.slots.remove(k) else {
                break;
            };
            cur = slot.next;
            out.push(slot);
        }
        debug_assert!(self.slots.is_empty(), "slot missing from order list");
        self.slots.clear();
        self.buckets.iter_mut().for_each(|b| *b = None);
        self.head = None;
        self.tail = None;
        out
    }
}

/// Map from byte-string keys to `Arc<V>` values, iterated in insertion order.
///
/// The table holds one strong reference per entry. `put` moves the caller's
/// handle in and releases the handle it replaces; `remove` hands the
/// table's handle back out; `get` and iteration return an extra reference.
pub struct HashTable<K, V, L: Locking = Synced> {
    inner: L::Lock<Inner<K, V>>,
    hash: HashFn,
    compare: CompareFn,
    buckets: usize,
    _policy: PhantomData<fn() -> L>,
}

impl<K: AsRef<[u8]>, V> HashTable<K, V> {
    /// Synchronized table with the default capacity and key functions.
    pub fn new() -> Self {
        let config = TableConfig::default();
        Self::build(config, vec![None; bucket_count(config.capacity)])
    }

    pub fn with_config(config: TableConfig) -> Result<Self> {
        Self::create(config)
    }
}

impl<K: AsRef<[u8]>, V> Default for HashTable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: AsRef<[u8]>, V, L: Locking> HashTable<K, V, L> {
    /// Create a table under sync policy `L`. Fails with `OutOfMemory` if the
    /// bucket array cannot be allocated.
    pub fn create(config: TableConfig) -> Result<Self> {
        let n = bucket_count(config.capacity);
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(n)?;
        buckets.resize(n, None);
        Ok(Self::build(config, buckets))
    }

    fn build(config: TableConfig, buckets: Vec<Option<SlotKey>>) -> Self {
        tracing::debug!(
            capacity = config.capacity,
            buckets = buckets.len(),
            synced = L::SYNCED,
            "hash table created"
        );
        Self {
            buckets: buckets.len(),
            inner: L::new(Inner {
                slots: SlotMap::with_key(),
                buckets,
                head: None,
                tail: None,
                mod_count: 0,
            }),
            hash: config.hash.unwrap_or(default_hash),
            compare: config.compare.unwrap_or(default_compare),
            _policy: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        L::read(&self.inner, |inner| inner.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of buckets, fixed at creation.
    pub fn bucket_len(&self) -> usize {
        self.buckets
    }

    /// Store `value` under `key`, returning the stored value with an extra
    /// reference for the caller.
    ///
    /// An existing entry with an equal key is replaced in place: it keeps its
    /// position in iteration order and its old value is released.
    pub fn put(&self, key: K, value: Arc<V>) -> Result<Arc<V>> {
        let bytes = key.as_ref();
        if bytes.is_empty() {
            return Err(Error::InvalidArgument("empty key"));
        }
        let hash = (self.hash)(bytes);
        let compare = self.compare;
        let stored = Arc::clone(&value);
        let replaced = L::write(&self.inner, |inner| {
            let old = match inner.find(key.as_ref(), hash, compare) {
                Some(k) => {
                    let slot = &mut inner.slots[k];
                    let old_key = core::mem::replace(&mut slot.key, key);
                    Some((old_key, core::mem::replace(&mut slot.value, value)))
                }
                None => {
                    inner.link(key, value, hash);
                    None
                }
            };
            inner.mod_count += 1;
            old
        });
        tracing::trace!(hash, replaced = replaced.is_some(), "hash table put");
        // Release the replaced key and value outside the lock.
        drop(replaced);
        Ok(stored)
    }

    /// Value stored under `key`, with an extra reference for the caller.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        let bytes = key.as_ref();
        if bytes.is_empty() {
            return None;
        }
        let hash = (self.hash)(bytes);
        L::read(&self.inner, |inner| {
            inner
                .find(bytes, hash, self.compare)
                .map(|k| Arc::clone(&inner.slots[k].value))
        })
    }

    pub fn exist<Q>(&self, key: &Q) -> bool
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        let bytes = key.as_ref();
        if bytes.is_empty() {
            return false;
        }
        let hash = (self.hash)(bytes);
        L::read(&self.inner, |inner| {
            inner.find(bytes, hash, self.compare).is_some()
        })
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.exist(key)
    }

    /// Unlink the entry for `key` and hand the table's reference to the caller.
    pub fn remove<Q>(&self, key: &Q) -> Result<Arc<V>>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        let bytes = key.as_ref();
        if bytes.is_empty() {
            return Err(Error::InvalidArgument("empty key"));
        }
        let hash = (self.hash)(bytes);
        let removed = L::write(&self.inner, |inner| {
            let k = inner.find(bytes, hash, self.compare)?;
            let slot = inner.unlink(k)?;
            inner.mod_count += 1;
            Some(slot)
        });
        tracing::trace!(hash, hit = removed.is_some(), "hash table remove");
        // The key is dropped here, after the lock is released.
        removed.map(|slot| slot.value).ok_or(Error::NotFound)
    }

    /// Remove every entry, releasing the table's reference on each value.
    pub fn clear(&self) {
        let slots = L::write(&self.inner, |inner| {
            if inner.slots.is_empty() {
                return Vec::new();
            }
            inner.mod_count += 1;
            inner.drain()
        });
        tracing::trace!(released = slots.len(), "hash table clear");
        drop(slots);
    }

    /// Start an iterator over entries in insertion order.
    pub fn iter(&self) -> TableIter<'_, K, V, L> {
        let (next, expected) = L::read(&self.inner, |inner| (inner.head, inner.mod_count));
        TableIter {
            table: self,
            current: None,
            next,
            expected,
            done: false,
        }
    }
}

impl<K, V, L> fmt::Debug for HashTable<K, V, L>
where
    K: AsRef<[u8]> + fmt::Debug,
    V: fmt::Debug,
    L: Locking,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        L::read(&self.inner, |inner| {
            let mut map = f.debug_map();
            let mut cur = inner.head;
            while let Some(k) = cur {
                let slot = &inner.slots[k];
                map.entry(&slot.key, &slot.value);
                cur = slot.next;
            }
            map.finish()
        })
    }
}

/// Cursor over a `HashTable` in insertion order.
///
/// Same contract as `ListIter`: no lock is held between steps and any
/// structural change not made through this iterator makes the next step
/// fail with `Error::ConcurrentModification`.
pub struct TableIter<'a, K, V, L: Locking = Synced> {
    table: &'a HashTable<K, V, L>,
    current: Option<SlotKey>,
    next: Option<SlotKey>,
    expected: u64,
    done: bool,
}

impl<'a, K, V, L> TableIter<'a, K, V, L>
where
    K: AsRef<[u8]> + Clone,
    L: Locking,
{
    /// Advance, returning the next key and value (with an extra reference),
    /// or `None` at the end.
    pub fn try_next(&mut self) -> Result<Option<(K, Arc<V>)>> {
        let table = self.table;
        let expected = self.expected;
        L::read(&table.inner, |inner| {
            if inner.mod_count != expected {
                tracing::debug!("stale hash table iterator");
                return Err(Error::ConcurrentModification);
            }
            let Some(k) = self.next else {
                return Ok(None);
            };
            let slot = &inner.slots[k];
            self.current = Some(k);
            self.next = slot.next;
            Ok(Some((slot.key.clone(), Arc::clone(&slot.value))))
        })
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Remove the entry last returned by `try_next`, releasing the table's
    /// reference. Iteration may continue afterwards.
    pub fn remove(&mut self) -> Result<()> {
        let table = self.table;
        let expected = self.expected;
        let current = self.current;
        let removed = L::write(&table.inner, |inner| {
            if inner.mod_count != expected {
                return Err(Error::ConcurrentModification);
            }
            let k = current.ok_or(Error::InvalidState("no current entry to remove"))?;
            let slot = inner
                .unlink(k)
                .ok_or(Error::InvalidState("current entry already removed"))?;
            inner.mod_count += 1;
            Ok(slot)
        })?;
        self.current = None;
        self.expected += 1;
        tracing::trace!(hash = removed.hash, "hash table iterator remove");
        drop(removed);
        Ok(())
    }
}

/// Yields `Err` once on concurrent modification, then ends.
impl<'a, K, V, L> Iterator for TableIter<'a, K, V, L>
where
    K: AsRef<[u8]> + Clone,
    L: Locking,
{
    type Item = Result<(K, Arc<V>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.try_next() {
            Ok(Some(kv)) => Some(Ok(kv)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
