//! Storage underneath the task queue.
//!
//! [`NodeStore`] is an arena of slots linked into one doubly linked list.
//! [`FifoQueue`] and [`SyncFifoQueue`] put queue semantics on top of it.

pub mod fifo_queue;
pub mod node_store;

pub use fifo_queue::{FifoQueue, SyncFifoQueue};
pub use node_store::{NodeHandle, NodeStore, MIN_CAPACITY};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("cannot resize to {requested} slots while {len} nodes are occupied")]
    CapacityBelowLength { requested: usize, len: usize },
}
