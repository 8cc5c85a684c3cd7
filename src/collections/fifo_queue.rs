//! FIFO queue on top of [`NodeStore`].
//!
//! [`FifoQueue`] is the single-owner form. Calling [`FifoQueue::into_sync`]
//! installs a lock and yields a [`SyncFifoQueue`], which can be shared between
//! threads. The upgrade is one way: a synchronized queue cannot drop its lock.

use super::node_store::{NodeHandle, NodeStore};
use super::StoreError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

type DequeueHook<T> = Box<dyn FnMut(&T) + Send>;
type DestroyHook<T> = Box<dyn FnMut(T) + Send>;

pub struct FifoQueue<T> {
    store: NodeStore<T>,
    head: Option<NodeHandle>,
    tail: Option<NodeHandle>,
    on_dequeue: Option<DequeueHook<T>>,
    on_destroy: Option<DestroyHook<T>>,
}

impl<T> FifoQueue<T> {
    pub fn with_capacity(preallocate: usize) -> Self {
        let mut queue = Self {
            store: NodeStore::with_capacity(preallocate),
            head: None,
            tail: None,
            on_dequeue: None,
            on_destroy: None,
        };
        queue.sync_cache();
        queue
    }

    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Called with every item handed out by `dequeue` or `dequeue_inverse`.
    pub fn set_dequeue_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.on_dequeue = Some(Box::new(hook));
    }

    /// Called with every item still queued when the queue is dropped.
    pub fn set_destroy_hook<F>(&mut self, hook: F)
    where
        F: FnMut(T) + Send + 'static,
    {
        self.on_destroy = Some(Box::new(hook));
    }

    /// Push at the tail.
    pub fn enqueue(&mut self, data: T) {
        self.store.reserve(data);
        self.sync_cache();
    }

    /// Push at the head, so the item is the next one dequeued.
    pub fn enqueue_inverse(&mut self, data: T) {
        self.store.reserve_front(data);
        self.sync_cache();
    }

    /// Pop from the head. Never blocks.
    pub fn dequeue(&mut self) -> Option<T> {
        let head = self.head?;
        let data = self.store.remove(head);
        self.sync_cache();
        self.notify_dequeue(data)
    }

    /// Pop from the tail. Never blocks.
    pub fn dequeue_inverse(&mut self) -> Option<T> {
        let tail = self.tail?;
        let data = self.store.remove(tail);
        self.sync_cache();
        self.notify_dequeue(data)
    }

    pub fn peek_front(&self) -> Option<&T> {
        self.store.get(self.head?)
    }

    pub fn peek_back(&self) -> Option<&T> {
        self.store.get(self.tail?)
    }

    pub fn resize(&mut self, capacity: usize) -> Result<(), StoreError> {
        self.store.resize(capacity)?;
        self.sync_cache();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Take every queued item in FIFO order, bypassing the dequeue hook.
    pub fn drain(&mut self) -> Vec<T> {
        let items = self.store.drain().collect();
        self.sync_cache();
        items
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.store.iter()
    }

    /// Install a lock and make the queue shareable.
    pub fn into_sync(self) -> SyncFifoQueue<T> {
        let len = AtomicUsize::new(self.len());
        let capacity = AtomicUsize::new(self.capacity());
        SyncFifoQueue {
            inner: Mutex::new(self),
            len,
            capacity,
        }
    }

    fn sync_cache(&mut self) {
        self.head = self.store.head();
        self.tail = self.store.last();
    }

    fn notify_dequeue(&mut self, data: Option<T>) -> Option<T> {
        if let (Some(hook), Some(item)) = (self.on_dequeue.as_mut(), data.as_ref()) {
            hook(item);
        }
        data
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for FifoQueue<T> {
    fn drop(&mut self) {
        if let Some(mut hook) = self.on_destroy.take() {
            for item in self.store.drain() {
                hook(item);
            }
        }
    }
}

impl<T> fmt::Debug for FifoQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

/// Lock-protected FIFO queue.
///
/// Every mutation holds the lock for the whole critical section, including
/// the refresh of the cached counters. `len`, `capacity`, `is_empty` and
/// `is_full` read those counters without locking and may be momentarily
/// stale.
pub struct SyncFifoQueue<T> {
    inner: Mutex<FifoQueue<T>>,
    len: AtomicUsize,
    capacity: AtomicUsize,
}

impl<T> SyncFifoQueue<T> {
    pub fn with_capacity(preallocate: usize) -> Self {
        FifoQueue::with_capacity(preallocate).into_sync()
    }

    pub fn enqueue(&self, data: T) {
        let mut queue = self.inner.lock();
        queue.enqueue(data);
        self.refresh(&queue);
    }

    pub fn enqueue_inverse(&self, data: T) {
        let mut queue = self.inner.lock();
        queue.enqueue_inverse(data);
        self.refresh(&queue);
    }

    pub fn dequeue(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let mut queue = self.inner.lock();
        let data = queue.dequeue();
        self.refresh(&queue);
        data
    }

    pub fn dequeue_inverse(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let mut queue = self.inner.lock();
        let data = queue.dequeue_inverse();
        self.refresh(&queue);
        data
    }

    pub fn resize(&self, capacity: usize) -> Result<(), StoreError> {
        let mut queue = self.inner.lock();
        let result = queue.resize(capacity);
        self.refresh(&queue);
        result
    }

    pub fn drain(&self) -> Vec<T> {
        let mut queue = self.inner.lock();
        let items = queue.drain();
        self.refresh(&queue);
        items
    }

    pub fn set_dequeue_hook<F>(&self, hook: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.inner.lock().set_dequeue_hook(hook);
    }

    pub fn set_destroy_hook<F>(&self, hook: F)
    where
        F: FnMut(T) + Send + 'static,
    {
        self.inner.lock().set_destroy_hook(hook);
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    fn refresh(&self, queue: &FifoQueue<T>) {
        self.len.store(queue.len(), Ordering::Release);
        self.capacity.store(queue.capacity(), Ordering::Release);
    }
}

impl<T> fmt::Debug for SyncFifoQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFifoQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_enqueue_then_dequeue() {
        let mut queue = FifoQueue::new();
        queue.enqueue(42);
        assert_eq!(queue.dequeue(), Some(42));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_enqueue_inverse_jumps_the_line() {
        let mut queue = FifoQueue::new();
        queue.enqueue("back");
        queue.enqueue_inverse("front");
        assert_eq!(queue.dequeue(), Some("front"));
        assert_eq!(queue.dequeue(), Some("back"));
    }

    #[test]
    fn test_dequeue_inverse_takes_the_tail() {
        let mut queue = FifoQueue::new();
        for i in 1..=3 {
            queue.enqueue(i);
        }
        assert_eq!(queue.peek_front(), Some(&1));
        assert_eq!(queue.peek_back(), Some(&3));
        assert_eq!(queue.dequeue_inverse(), Some(3));
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_counters_follow_mutations() {
        let mut queue = FifoQueue::with_capacity(2);
        assert!(queue.is_empty());
        assert!(!queue.is_full());

        queue.enqueue(1);
        queue.enqueue(2);
        assert!(queue.is_full());

        queue.enqueue(3);
        assert_eq!(queue.capacity(), 4);
        assert!(!queue.is_full());

        assert!(queue.resize(2).is_err());
        queue.dequeue();
        queue.resize(2).unwrap();
        assert_eq!(queue.capacity(), 2);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), [2, 3]);
    }

    #[test]
    fn test_hooks_see_dequeued_and_abandoned_items() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let dropped = Arc::new(parking_lot::Mutex::new(Vec::new()));

        {
            let mut queue = FifoQueue::new();
            let seen_hook = seen.clone();
            queue.set_dequeue_hook(move |item: &i32| seen_hook.lock().push(*item));
            let dropped_hook = dropped.clone();
            queue.set_destroy_hook(move |item| dropped_hook.lock().push(item));

            for i in 0..4 {
                queue.enqueue(i);
            }
            queue.dequeue();
            queue.dequeue_inverse();
        }

        assert_eq!(*seen.lock(), [0, 3]);
        assert_eq!(*dropped.lock(), [1, 2]);
    }

    #[test]
    fn test_sync_queue_counters() {
        let queue = SyncFifoQueue::with_capacity(1);
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.dequeue(), None::<u8>);

        queue.enqueue(1);
        assert!(queue.is_full());
        queue.enqueue_inverse(0);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.capacity(), 2);

        assert_eq!(queue.dequeue(), Some(0));
        assert_eq!(queue.dequeue_inverse(), Some(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_sync_queue_concurrent_producers() {
        let queue = Arc::new(SyncFifoQueue::with_capacity(4));
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        queue.enqueue(p * 1000 + i);
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(queue.len(), 1000);
        let items = queue.drain();
        assert_eq!(items.len(), 1000);
        assert!(queue.is_empty());

        // per-producer order is preserved
        for p in 0..4 {
            let mine: Vec<_> = items.iter().filter(|&&v| v / 1000 == p).collect();
            assert!(mine.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
