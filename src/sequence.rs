//! Ordered sequence of owned strings with stable handles.
//!
//! Elements live in a slot arena linked both ways, so appending at the tail
//! and removing any element whose [`Handle`] is known are both O(1), and
//! removing one element never invalidates the handle of another.
//!
//! The free list always has room for every slot (`free.capacity() >=
//! slots.len()`), which makes [`Sequence::remove`] and [`Sequence::clear`]
//! allocation-free. Only growth can fail, and it fails before anything is
//! touched.

use std::collections::TryReserveError;
use std::fmt;

const NIL: u32 = u32::MAX;

/// Stable reference to one element of a [`Sequence`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle(u32);

#[derive(Clone)]
struct Slot {
    /// `None` is the placeholder used by query results for "no match".
    value: Option<String>,
    prev: u32,
    next: u32,
    live: bool,
}

impl Slot {
    const VACANT: Slot = Slot {
        value: None,
        prev: NIL,
        next: NIL,
        live: false,
    };
}

pub struct Sequence {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: u32,
    tail: u32,
    len: usize,
    /// True while slot order equals list order (no removal since the last clear).
    ordered: bool,
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
            ordered: true,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Makes the next `additional` appends allocation-free.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let grow = additional.saturating_sub(self.free.len());
        if grow == 0 {
            return Ok(());
        }
        debug_assert!(self.slots.len() + grow < NIL as usize);
        self.slots.try_reserve(grow)?;
        self.free
            .try_reserve(self.slots.len() + grow - self.free.len())?;
        Ok(())
    }

    /// Appends `value` at the tail.
    ///
    /// On allocation failure the sequence is left exactly as it was.
    pub fn append(&mut self, value: Option<String>) -> Result<Handle, TryReserveError> {
        self.try_reserve(1)?;
        Ok(self.append_reserved(value))
    }

    /// Appends into capacity secured earlier by [`Sequence::try_reserve`].
    pub(crate) fn append_reserved(&mut self, value: Option<String>) -> Handle {
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                debug_assert!(self.slots.len() < self.slots.capacity(), "append without reserve");
                debug_assert!(self.free.capacity() > self.slots.len());
                self.slots.push(Slot::VACANT);
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[idx as usize];
        slot.value = value;
        slot.prev = self.tail;
        slot.next = NIL;
        slot.live = true;

        if self.tail == NIL {
            self.head = idx;
        } else {
            self.slots[self.tail as usize].next = idx;
        }
        self.tail = idx;
        self.len += 1;
        Handle(idx)
    }

    /// Detaches and drops the element at `handle`.
    ///
    /// Returns false if `handle` does not refer to a live element.
    pub fn remove(&mut self, handle: Handle) -> bool {
        let idx = handle.0;
        let Some(slot) = self.slots.get_mut(idx as usize) else {
            return false;
        };
        if !slot.live {
            return false;
        }
        let (prev, next) = (slot.prev, slot.next);
        *slot = Slot::VACANT;

        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev as usize].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next as usize].prev = prev;
        }

        debug_assert!(self.free.len() < self.free.capacity());
        self.free.push(idx);
        self.len -= 1;
        self.ordered = false;
        true
    }

    /// Removes every element, keeping the allocated slots for reuse.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
        self.ordered = true;
    }

    #[inline]
    pub fn first(&self) -> Option<Handle> {
        (self.head != NIL).then_some(Handle(self.head))
    }

    /// The string at `handle`; `None` for a dead handle or the placeholder.
    pub fn get(&self, handle: Handle) -> Option<&str> {
        self.slots
            .get(handle.0 as usize)
            .filter(|slot| slot.live)
            .and_then(|slot| slot.value.as_deref())
    }

    /// The string at position `idx`; `None` when out of bounds or the
    /// placeholder.
    pub fn nth(&self, idx: usize) -> Option<&str> {
        if idx >= self.len {
            return None;
        }
        if self.ordered {
            return self.slots[idx].value.as_deref();
        }
        self.iter().nth(idx).flatten()
    }

    /// Elements in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            seq: self,
            cur: self.head,
            remaining: self.len,
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Slot>()
            + self.free.capacity() * std::mem::size_of::<u32>()
            + self
                .slots
                .iter()
                .filter_map(|s| s.value.as_ref())
                .map(String::capacity)
                .sum::<usize>()
    }

    pub fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
        // The free list must keep room for every slot.
        self.free.shrink_to(self.slots.len());
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Sequence {
    fn clone(&self) -> Self {
        let mut free = Vec::with_capacity(self.slots.len());
        free.extend_from_slice(&self.free);
        Self {
            slots: self.slots.clone(),
            free,
            head: self.head,
            tail: self.tail,
            len: self.len,
            ordered: self.ordered,
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

pub struct Iter<'a> {
    seq: &'a Sequence,
    cur: u32,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Option<&'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == NIL {
            return None;
        }
        let slot = &self.seq.slots[self.cur as usize];
        self.cur = slot.next;
        self.remaining -= 1;
        Some(slot.value.as_deref())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}
