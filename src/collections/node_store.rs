//! Arena-backed doubly linked node store.
//!
//! Nodes live in a contiguous bank of slots and link to each other by slot
//! index, so a [`NodeHandle`] stays valid across growth. Vacant slots are kept
//! on a free list and reused before the bank grows. When no slot is free the
//! bank doubles, which keeps reservation amortized O(1).
//!
//! Every node also carries a sequence id: its position in list order. Ids are
//! kept lazily: appends keep them exact, other mutations mark the store
//! unsynced and [`NodeStore::resync`] renumbers the chain. Lookups by
//! position ([`NodeStore::by_id`]) walk the chain and never depend on the
//! stored ids.

use super::StoreError;
use std::ops::ControlFlow;

/// Capacity used when a store is created with zero preallocated slots.
pub const MIN_CAPACITY: usize = 2;

/// Stable handle to an occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

impl NodeHandle {
    /// Slot index inside the store's bank.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Node<T> {
    data: Option<T>,
    seq: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<T> Node<T> {
    fn vacant() -> Self {
        Self {
            data: None,
            seq: 0,
            prev: None,
            next: None,
        }
    }

    fn is_occupied(&self) -> bool {
        self.data.is_some()
    }

    fn clean(&mut self) -> Option<T> {
        self.prev = None;
        self.next = None;
        self.seq = 0;
        self.data.take()
    }
}

#[derive(Debug)]
pub struct NodeStore<T> {
    bank: Vec<Node<T>>,
    // vacant slot indices, lowest index on top after a fresh allocation
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    synced: bool,
}

impl<T> NodeStore<T> {
    /// Create a store with `preallocate` slots, or [`MIN_CAPACITY`] when zero.
    pub fn with_capacity(preallocate: usize) -> Self {
        let capacity = if preallocate == 0 {
            MIN_CAPACITY
        } else {
            preallocate
        };

        let mut store = Self {
            bank: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            synced: true,
        };
        store.rebuild(capacity);
        store
    }

    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.bank.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether stored sequence ids currently match list positions.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Store `data` in a free slot and link it at the tail.
    ///
    /// Doubles the bank when every slot is occupied. Existing handles and the
    /// relative order of occupied nodes are preserved across growth.
    pub fn reserve(&mut self, data: T) -> NodeHandle {
        let idx = self.take_slot(data);
        self.link_back(idx);
        NodeHandle(idx)
    }

    /// Store `data` in a free slot and link it at the head.
    pub fn reserve_front(&mut self, data: T) -> NodeHandle {
        let idx = self.take_slot(data);
        self.link_front(idx);
        NodeHandle(idx)
    }

    /// Unlink the node and hand its data back. The slot becomes reusable.
    ///
    /// Returns `None` for a vacant slot or an out of range handle.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<T> {
        let idx = handle.0;
        let (prev, next) = match self.bank.get(idx) {
            Some(node) if node.is_occupied() => (node.prev, node.next),
            _ => return None,
        };

        match prev {
            Some(p) => self.bank[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.bank[n].prev = prev,
            None => self.tail = prev,
        }

        // the successor of a removed head takes over id 0
        if prev.is_none() {
            if let Some(n) = next {
                self.bank[n].seq = 0;
            }
        }

        // dropping the tail leaves the remaining ids contiguous
        self.synced = self.synced && next.is_none();

        let data = self.bank[idx].clean();
        self.free.push(idx);
        self.len -= 1;
        if self.len == 0 {
            self.synced = true;
        }
        data
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.remove(NodeHandle(head))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(NodeHandle(tail))
    }

    /// Node at list position `id`.
    pub fn by_id(&self, id: usize) -> Option<NodeHandle> {
        self.handles().nth(id)
    }

    /// Occupied node stored in bank slot `index`.
    pub fn by_index(&self, index: usize) -> Option<NodeHandle> {
        self.bank
            .get(index)
            .filter(|node| node.is_occupied())
            .map(|_| NodeHandle(index))
    }

    pub fn head(&self) -> Option<NodeHandle> {
        self.head.map(NodeHandle)
    }

    pub fn last(&self) -> Option<NodeHandle> {
        self.tail.map(NodeHandle)
    }

    pub fn next(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.occupied(handle)?.next.map(NodeHandle)
    }

    pub fn prev(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.occupied(handle)?.prev.map(NodeHandle)
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&T> {
        self.occupied(handle)?.data.as_ref()
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut T> {
        self.bank
            .get_mut(handle.0)
            .and_then(|node| node.data.as_mut())
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.occupied(handle).is_some()
    }

    /// Stored sequence id of an occupied node. Matches the node's list
    /// position whenever [`is_synced`](Self::is_synced) holds.
    pub fn sequence_id(&self, handle: NodeHandle) -> Option<usize> {
        self.occupied(handle).map(|node| node.seq)
    }

    /// Renumber every occupied node `0..len` in list order.
    pub fn resync(&mut self) {
        let mut cursor = self.head;
        let mut seq = 0;
        while let Some(idx) = cursor {
            let node = &mut self.bank[idx];
            node.seq = seq;
            seq += 1;
            cursor = node.next;
        }
        debug_assert_eq!(seq, self.len);
        self.synced = true;
    }

    /// Visit every slot in bank order, occupied or vacant.
    ///
    /// Stops at the first `ControlFlow::Break` and returns its value.
    pub fn foreach<B, F>(&self, mut f: F) -> Option<B>
    where
        F: FnMut(NodeHandle, Option<&T>) -> ControlFlow<B>,
    {
        for (idx, node) in self.bank.iter().enumerate() {
            if let ControlFlow::Break(b) = f(NodeHandle(idx), node.data.as_ref()) {
                return Some(b);
            }
        }
        None
    }

    /// Change the number of slots.
    ///
    /// Growing keeps every handle valid. Shrinking compacts the occupied
    /// nodes into the lowest slots in list order, which invalidates
    /// outstanding handles.
    pub fn resize(&mut self, capacity: usize) -> Result<(), StoreError> {
        if capacity < self.len {
            return Err(StoreError::CapacityBelowLength {
                requested: capacity,
                len: self.len,
            });
        }

        if capacity >= self.bank.len() {
            self.grow_to(capacity);
            return Ok(());
        }

        let items: Vec<T> = self.drain().collect();
        self.rebuild(capacity);
        for item in items {
            self.reserve(item);
        }
        Ok(())
    }

    /// Drop every stored item and free all slots. Capacity is kept.
    pub fn clear(&mut self) {
        let capacity = self.bank.len();
        self.rebuild(capacity);
    }

    /// Remove items from the head until the store is empty.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.pop_front())
    }

    /// Items in list order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            store: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Handles in list order.
    pub fn handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let idx = cursor?;
            cursor = self.bank[idx].next;
            Some(NodeHandle(idx))
        })
    }

    fn occupied(&self, handle: NodeHandle) -> Option<&Node<T>> {
        self.bank.get(handle.0).filter(|node| node.is_occupied())
    }

    fn take_slot(&mut self, data: T) -> usize {
        match self.free.pop() {
            Some(idx) => {
                debug_assert!(!self.bank[idx].is_occupied());
                self.bank[idx].data = Some(data);
                idx
            }
            None => {
                self.grow();
                self.take_slot(data)
            }
        }
    }

    fn link_back(&mut self, idx: usize) {
        let tail = self.tail;
        let seq = tail.map_or(0, |t| self.bank[t].seq + 1);

        let node = &mut self.bank[idx];
        node.prev = tail;
        node.next = None;
        node.seq = seq;

        match tail {
            Some(t) => self.bank[t].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
    }

    fn link_front(&mut self, idx: usize) {
        let head = self.head;

        let node = &mut self.bank[idx];
        node.prev = None;
        node.next = head;
        node.seq = 0;

        match head {
            Some(h) => {
                self.bank[h].prev = Some(idx);
                self.synced = false;
            }
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
    }

    fn grow(&mut self) {
        let new_capacity = (self.bank.len() * 2).max(MIN_CAPACITY);
        log::debug!(
            "node store full ({} slots), growing to {}",
            self.bank.len(),
            new_capacity
        );
        self.grow_to(new_capacity);
    }

    fn grow_to(&mut self, capacity: usize) {
        let old = self.bank.len();
        if capacity <= old {
            return;
        }
        self.bank.resize_with(capacity, Node::vacant);
        // keep low indices on top of the stack so they are handed out first
        let mut fresh: Vec<usize> = (old..capacity).rev().collect();
        fresh.append(&mut self.free);
        self.free = fresh;
    }

    fn rebuild(&mut self, capacity: usize) {
        self.bank.clear();
        self.bank.resize_with(capacity, Node::vacant);
        self.free = (0..capacity).rev().collect();
        self.head = None;
        self.tail = None;
        self.len = 0;
        self.synced = true;
    }
}

impl<T> Default for NodeStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a store's items in list order.
#[derive(Debug)]
pub struct Iter<'a, T> {
    store: &'a NodeStore<T>,
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let idx = self.cursor?;
        let node = &self.store.bank[idx];
        self.cursor = node.next;
        self.remaining -= 1;
        node.data.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}

impl<'a, T> IntoIterator for &'a NodeStore<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
