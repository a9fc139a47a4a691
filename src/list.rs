//! List: circular doubly-linked list of shared values with positional access.
//!
//! Nodes live in a `SlotMap` arena and link to each other by key. A sentinel
//! node (holding no value) closes the ring, so the first entry is
//! `head.next` and the last is `head.prev`.
//!
//! Indices follow one convention everywhere: `0..len` counts from the head,
//! negative indices count from the tail (`-1` is the last entry). `insert`
//! additionally accepts `len` and `-(len + 1)`, i.e. the positions past
//! either end.

use crate::error::{Error, Result};
use crate::lock::{Locking, Synced};
use core::fmt;
use core::marker::PhantomData;
use slotmap::{new_key_type, SlotMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

new_key_type! {
    struct NodeKey;
}

/// Equality used by `find` in place of reference identity.
pub type CompareFn<T> = fn(&T, &T) -> bool;

static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a linked entry, as returned by `List::insert`.
///
/// Ids are generational: once the entry is removed the id never resolves
/// again, even if the arena slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryId {
    owner: u64,
    key: NodeKey,
}

#[derive(Debug)]
struct Node<T> {
    // None only for the sentinel
    value: Option<Arc<T>>,
    prev: NodeKey,
    next: NodeKey,
}

struct Inner<T> {
    nodes: SlotMap<NodeKey, Node<T>>,
    head: NodeKey,
    mod_count: u64,
}

impl<T> Inner<T> {
    fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let head = nodes.insert_with_key(|k| Node {
            value: None,
            prev: k,
            next: k,
        });
        Self {
            nodes,
            head,
            mod_count: 0,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    fn walk(&self, mut cur: NodeKey, steps: usize, forward: bool) -> NodeKey {
        for _ in 0..steps {
            let node = &self.nodes[cur];
            cur = if forward { node.next } else { node.prev };
        }
        cur
    }

    /// Node after which an entry inserted at `index` must be linked.
    fn insertion_point(&self, index: isize) -> Option<NodeKey> {
        let size = self.len() as isize;
        if index < -(size + 1) || index > size {
            return None;
        }
        let at = if index >= 0 {
            self.walk(self.head, index as usize, true)
        } else {
            self.walk(self.head, index.unsigned_abs(), false)
        };
        Some(at)
    }

    fn node_at(&self, index: isize) -> Option<NodeKey> {
        let size = self.len() as isize;
        if index < -size || index >= size {
            return None;
        }
        let at = if index >= 0 {
            self.walk(self.nodes[self.head].next, index as usize, true)
        } else {
            self.walk(self.head, index.unsigned_abs(), false)
        };
        Some(at)
    }

    fn link_after(&mut self, at: NodeKey, value: Arc<T>) -> NodeKey {
        let next = self.nodes[at].next;
        let key = self.nodes.insert(Node {
            value: Some(value),
            prev: at,
            next,
        });
        self.nodes[at].next = key;
        self.nodes[next].prev = key;
        self.mod_count += 1;
        key
    }

    fn unlink(&mut self, key: NodeKey) -> Option<Arc<T>> {
        if key == self.head {
            return None;
        }
        let node = self.nodes.remove(key)?;
        self.nodes[node.prev].next = node.next;
        self.nodes[node.next].prev = node.prev;
        self.mod_count += 1;
        debug_assert!(node.value.is_some(), "linked entry without a value");
        node.value
    }

    fn value(&self, key: NodeKey) -> Option<&Arc<T>> {
        self.nodes.get(key).and_then(|n| n.value.as_ref())
    }

    /// Unlink every entry, returning the values in list order.
    fn drain(&mut self) -> Vec<Arc<T>> {
        if self.len() == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(self.len());
        let head = self.head;
        let mut cur = self.nodes[head].next;
        while cur != head {
            let node = &mut self.nodes[cur];
            cur = node.next;
            out.extend(node.value.take());
        }
        self.nodes.retain(|k, _| k == head);
        let sentinel = &mut self.nodes[head];
        sentinel.prev = head;
        sentinel.next = head;
        self.mod_count += 1;
        out
    }
}

/// Ordered container of `Arc<T>` values.
///
/// The list holds one strong reference per linked entry. `insert` moves the
/// caller's handle in; `remove` hands it back out; `get` and iteration return
/// an extra reference.
pub struct List<T, L: Locking = Synced> {
    inner: L::Lock<Inner<T>>,
    compare: Option<CompareFn<T>>,
    id: u64,
    _policy: PhantomData<fn() -> L>,
}

impl<T> List<T> {
    pub fn new() -> Self {
        Self::create(None)
    }

    pub fn with_compare(compare: CompareFn<T>) -> Self {
        Self::create(Some(compare))
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, L: Locking> List<T, L> {
    /// Create a list under sync policy `L`. Without `compare`, `find` matches
    /// by reference identity.
    pub fn create(compare: Option<CompareFn<T>>) -> Self {
        let id = NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(list = id, synced = L::SYNCED, "list created");
        Self {
            inner: L::new(Inner::new()),
            compare,
            id,
            _policy: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        L::read(&self.inner, |inner| inner.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Link `value` at `index`; see the module docs for index rules.
    pub fn insert(&self, index: isize, value: Arc<T>) -> Result<EntryId> {
        let key = L::write(&self.inner, |inner| -> Result<NodeKey> {
            let at = inner
                .insertion_point(index)
                .ok_or(Error::InvalidArgument("list index out of range"))?;
            Ok(inner.link_after(at, value))
        })?;
        tracing::trace!(list = self.id, index, "list insert");
        Ok(EntryId { owner: self.id, key })
    }

    pub fn push_head(&self, value: Arc<T>) -> EntryId {
        self.link_end(value, false)
    }

    pub fn push_tail(&self, value: Arc<T>) -> EntryId {
        self.link_end(value, true)
    }

    /// Same as `push_tail`.
    pub fn add(&self, value: Arc<T>) -> EntryId {
        self.push_tail(value)
    }

    fn link_end(&self, value: Arc<T>, tail: bool) -> EntryId {
        let key = L::write(&self.inner, |inner| {
            let at = if tail {
                inner.nodes[inner.head].prev
            } else {
                inner.head
            };
            inner.link_after(at, value)
        });
        tracing::trace!(list = self.id, tail, "list push");
        EntryId { owner: self.id, key }
    }

    /// Unlink the entry at `index` and hand its reference to the caller.
    pub fn remove(&self, index: isize) -> Result<Arc<T>> {
        let value = L::write(&self.inner, |inner| {
            inner.node_at(index).and_then(|key| inner.unlink(key))
        });
        tracing::trace!(list = self.id, index, hit = value.is_some(), "list remove");
        value.ok_or(Error::InvalidArgument("list index out of range"))
    }

    /// Unlink the entry identified by `entry` and hand its reference to the
    /// caller. Fails if the entry is no longer linked in this list.
    pub fn remove_entry(&self, entry: EntryId) -> Result<Arc<T>> {
        if entry.owner != self.id {
            return Err(Error::InvalidArgument("entry belongs to another list"));
        }
        let value = L::write(&self.inner, |inner| inner.unlink(entry.key));
        tracing::trace!(list = self.id, hit = value.is_some(), "list remove entry");
        value.ok_or(Error::InvalidArgument("entry is not linked"))
    }

    pub fn pop_head(&self) -> Option<Arc<T>> {
        self.remove(0).ok()
    }

    pub fn pop_tail(&self) -> Option<Arc<T>> {
        self.remove(-1).ok()
    }

    /// Value at `index`, with an extra reference for the caller.
    pub fn get(&self, index: isize) -> Result<Arc<T>> {
        L::read(&self.inner, |inner| {
            inner
                .node_at(index)
                .and_then(|key| inner.value(key))
                .cloned()
                .ok_or(Error::InvalidArgument("list index out of range"))
        })
    }

    /// Value linked under `entry`, with an extra reference for the caller.
    pub fn get_entry(&self, entry: EntryId) -> Option<Arc<T>> {
        if entry.owner != self.id {
            return None;
        }
        L::read(&self.inner, |inner| inner.value(entry.key).cloned())
    }

    /// Position of the first entry matching `value`.
    pub fn find(&self, value: &Arc<T>) -> Option<usize> {
        L::read(&self.inner, |inner| {
            let mut cur = inner.nodes[inner.head].next;
            let mut index = 0;
            while cur != inner.head {
                let node = &inner.nodes[cur];
                if let Some(v) = node.value.as_ref() {
                    let hit = match self.compare {
                        Some(eq) => eq(v, value),
                        None => Arc::ptr_eq(v, value),
                    };
                    if hit {
                        return Some(index);
                    }
                }
                cur = node.next;
                index += 1;
            }
            None
        })
    }

    pub fn contains(&self, value: &Arc<T>) -> bool {
        self.find(value).is_some()
    }

    pub fn index_of(&self, value: &Arc<T>) -> Option<usize> {
        self.find(value)
    }

    /// Unlink every entry and release the list's reference on each value.
    pub fn clear(&self) {
        let values = L::write(&self.inner, |inner| inner.drain());
        tracing::trace!(list = self.id, released = values.len(), "list clear");
        // Destructors run outside the lock.
        drop(values);
    }

    /// Start an iterator positioned before the first entry.
    pub fn iter(&self) -> ListIter<'_, T, L> {
        let (next, expected) = L::read(&self.inner, |inner| {
            (inner.nodes[inner.head].next, inner.mod_count)
        });
        ListIter {
            list: self,
            current: None,
            next,
            expected,
            done: false,
        }
    }
}

impl<T: fmt::Debug, L: Locking> fmt::Debug for List<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        L::read(&self.inner, |inner| {
            let mut list = f.debug_list();
            let mut cur = inner.nodes[inner.head].next;
            while cur != inner.head {
                let node = &inner.nodes[cur];
                if let Some(v) = node.value.as_ref() {
                    list.entry(v);
                }
                cur = node.next;
            }
            list.finish()
        })
    }
}

/// Cursor over a `List` that detects concurrent modification.
///
/// The iterator holds no lock between steps. Each step compares the list's
/// modification counter with the snapshot taken at creation (or at the last
/// `remove` through this iterator) and fails with
/// `Error::ConcurrentModification` on mismatch.
pub struct ListIter<'a, T, L: Locking = Synced> {
    list: &'a List<T, L>,
    current: Option<NodeKey>,
    next: NodeKey,
    expected: u64,
    done: bool,
}

impl<'a, T, L: Locking> ListIter<'a, T, L> {
    /// Advance, returning the next value with an extra reference, or `None`
    /// at the end.
    pub fn try_next(&mut self) -> Result<Option<Arc<T>>> {
        let list = self.list;
        let expected = self.expected;
        L::read(&list.inner, |inner| {
            if inner.mod_count != expected {
                tracing::debug!(list = list.id, "stale list iterator");
                return Err(Error::ConcurrentModification);
            }
            if self.next == inner.head {
                return Ok(None);
            }
            let node = &inner.nodes[self.next];
            self.current = Some(self.next);
            self.next = node.next;
            Ok(node.value.clone())
        })
    }

    pub fn has_next(&self) -> bool {
        let next = self.next;
        L::read(&self.list.inner, |inner| next != inner.head)
    }

    /// Unlink the entry last returned by `try_next`, releasing the list's
    /// reference. Iteration may continue afterwards.
    pub fn remove(&mut self) -> Result<()> {
        let list = self.list;
        let expected = self.expected;
        let current = self.current;
        let value = L::write(&list.inner, |inner| {
            if inner.mod_count != expected {
                return Err(Error::ConcurrentModification);
            }
            let key = current.ok_or(Error::InvalidState("no current entry to remove"))?;
            inner
                .unlink(key)
                .ok_or(Error::InvalidState("current entry already unlinked"))
        })?;
        self.current = None;
        self.expected += 1;
        tracing::trace!(list = list.id, "list iterator remove");
        drop(value);
        Ok(())
    }
}

/// Yields `Err` once on concurrent modification, then ends.
impl<'a, T, L: Locking> Iterator for ListIter<'a, T, L> {
    type Item = Result<Arc<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.try_next() {
            Ok(Some(v)) => Some(Ok(v)),
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
