//! In-memory outbound message queue.
//!
//! Holds items awaiting delivery in FIFO order. Producers add from any
//! thread or task while the background worker peeks, updates and removes.
//! All synchronization is internal; callers never lock anything.

mod item;

pub use item::{ItemHeader, QueueItem, QueueItemState};

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

/// Thread-safe FIFO of queue items.
///
/// # Design
///
/// - A single `Mutex<VecDeque<T>>`, never held across an `.await`
/// - Peeks return cloned snapshots so concurrent adds cannot disturb them
/// - Identity (`Uuid`) is the only lookup key, ids are unique while resident
///
/// # Example
///
/// ```rust,ignore
/// let queue = MessageQueue::new();
/// queue.add(message);
///
/// for item in queue.peek(0) {
///     // attempt delivery, then
///     queue.remove(item.id());
/// }
/// ```
pub struct MessageQueue<T: QueueItem> {
    items: Mutex<VecDeque<T>>,
}

impl<T: QueueItem> MessageQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue an item with fresh bookkeeping.
    ///
    /// Timestamp, state and retry count are always overwritten. Returns
    /// `false` without enqueuing when an item with the same id is resident.
    pub fn add(&self, mut item: T) -> bool {
        item.header_mut().reset();
        self.push_unique(item)
    }

    /// Re-enqueue an item rehydrated from storage.
    ///
    /// Only the timestamp is refreshed; state and retry count survive so a
    /// restart can never widen the retry bound.
    pub fn restore(&self, mut item: T) -> bool {
        item.header_mut().queued_at = Utc::now();
        self.push_unique(item)
    }

    fn push_unique(&self, item: T) -> bool {
        let mut items = self.lock();
        let id = item.id();

        if items.iter().any(|existing| existing.id() == id) {
            tracing::warn!(message_id = %id, "Item already queued, ignoring duplicate");
            return false;
        }

        items.push_back(item);
        tracing::debug!(message_id = %id, queue_size = items.len(), "Item enqueued");
        true
    }

    /// Snapshot of items eligible for delivery (not `Complete`/`Failed`).
    ///
    /// `count > 0` limits the result to that many items; `0` returns all.
    pub fn peek(&self, count: usize) -> Vec<T> {
        let items = self.lock();
        let eligible = items.iter().filter(|item| !item.state().is_terminal());

        if count > 0 {
            eligible.take(count).cloned().collect()
        } else {
            eligible.cloned().collect()
        }
    }

    /// Remove the entry with the given id. Absent ids are a no-op.
    pub fn remove(&self, id: Uuid) -> Option<T> {
        let mut items = self.lock();
        let position = items.iter().position(|item| item.id() == id)?;
        items.remove(position)
    }

    /// Copy the bookkeeping of a snapshot back onto the resident entry.
    ///
    /// Returns `false` if the item is no longer queued.
    pub fn update(&self, item: &T) -> bool {
        let mut items = self.lock();
        match items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(existing) => {
                let header = existing.header_mut();
                header.state = item.state();
                header.retry_count = item.retry_count();
                true
            }
            None => false,
        }
    }

    /// Set the state of a resident item, returning the previous state.
    pub fn set_state(&self, id: Uuid, state: QueueItemState) -> Option<QueueItemState> {
        let mut items = self.lock();
        let existing = items.iter_mut().find(|item| item.id() == id)?;
        let previous = existing.state();
        existing.header_mut().state = state;
        Some(previous)
    }

    /// Look up a resident item by id.
    pub fn get(&self, id: Uuid) -> Option<T> {
        self.lock().iter().find(|item| item.id() == id).cloned()
    }

    /// Snapshot of every resident item, terminal ones included.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }

    /// Snapshot of terminal items (the dead-letter view).
    pub fn terminal(&self) -> Vec<T> {
        self.lock()
            .iter()
            .filter(|item| item.state().is_terminal())
            .cloned()
            .collect()
    }

    /// Remove and return every terminal item.
    pub fn take_terminal(&self) -> Vec<T> {
        let mut items = self.lock();
        let (terminal, live): (VecDeque<T>, VecDeque<T>) = items
            .drain(..)
            .partition(|item| item.state().is_terminal());
        *items = live;
        terminal.into_iter().collect()
    }

    /// Discard all items.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T: QueueItem> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
