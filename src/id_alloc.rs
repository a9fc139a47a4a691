//! Cyclic allocator for small dense integer ids (slot or channel numbers).

use crate::bitset::Bitset;
use crate::error::{Error, Result};
use parking_lot::Mutex;

#[derive(Debug)]
struct State {
    ids: Bitset,
    // Last id handed out; the next search starts just after it.
    latest: Option<usize>,
}

/// Hands out ids in `0..capacity`. A bit is set iff its id is allocated.
#[derive(Debug)]
pub struct IdAllocator {
    state: Mutex<State>,
    capacity: usize,
}

impl IdAllocator {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            state: Mutex::new(State {
                ids: Bitset::new(capacity)?,
                latest: None,
            }),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of ids currently allocated.
    pub fn allocated(&self) -> usize {
        self.state.lock().ids.count_ones()
    }

    pub fn is_allocated(&self, id: usize) -> bool {
        self.state.lock().ids.is_set(id).unwrap_or(false)
    }

    /// Allocate the first free id after the cursor, wrapping to the start.
    pub fn alloc(&self) -> Result<usize> {
        let mut state = self.state.lock();
        let start = match state.latest {
            Some(latest) if latest + 1 < self.capacity => latest + 1,
            _ => 0,
        };
        let id = state
            .ids
            .next_clear_bit(start)
            .or_else(|| state.ids.next_clear_bit(0));
        let Some(id) = id else {
            tracing::warn!(capacity = self.capacity, "id allocator exhausted");
            return Err(Error::CapacityExhausted);
        };
        state.ids.set(id)?;
        state.latest = Some(id);
        tracing::trace!(id, "id allocated");
        Ok(id)
    }

    /// Return `id` to the pool. Fails if it is not currently allocated.
    pub fn free(&self, id: usize) -> Result<()> {
        let mut state = self.state.lock();
        match state.ids.is_set(id) {
            Ok(true) => {}
            Ok(false) | Err(_) => return Err(Error::NotAllocated(id)),
        }
        state.ids.clear(id)?;
        tracing::trace!(id, "id freed");
        Ok(())
    }
}
