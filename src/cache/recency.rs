//! Recency List Module
//!
//! Bounded "most recently touched" tracker that stores keys but no values.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

// == Recency List ==
/// Tracks the order in which items were last touched.
///
/// Items are stored in a VecDeque where:
/// - Front = Most recently touched
/// - Back = Least recently touched
///
/// A membership set mirrors the deque exactly, so `has` is O(1).
#[derive(Debug, Clone)]
pub struct RecencyList<T> {
    /// Order of items by touch time
    order: VecDeque<T>,
    /// Membership index, always equal to the set of items in `order`
    members: HashSet<T>,
    /// Maximum number of items retained
    capacity: usize,
}

impl<T: Eq + Hash + Clone> RecencyList<T> {
    // == Constructor ==
    /// Creates an empty list holding at most `capacity` items.
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    // == Add ==
    /// Adds an item, moving it to the front if it is already tracked.
    pub fn add(&mut self, item: T) {
        self.touch(item);
    }

    // == Touch ==
    /// Marks an item as most recently used.
    ///
    /// If the list grows past its capacity, exactly one item is dropped from
    /// the back and returned.
    pub fn touch(&mut self, item: T) -> Option<T> {
        if self.members.contains(&item) {
            self.unlink(&item);
        } else {
            self.members.insert(item.clone());
        }
        self.order.push_front(item);

        if self.order.len() > self.capacity {
            let dropped = self.order.pop_back()?;
            self.members.remove(&dropped);
            return Some(dropped);
        }
        None
    }

    // == Remove ==
    /// Removes an item. Returns true if it was tracked.
    pub fn remove(&mut self, item: &T) -> bool {
        if !self.members.remove(item) {
            return false;
        }
        self.unlink(item);
        true
    }

    // == Has ==
    /// Checks if an item is tracked.
    pub fn has(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    // == Get All ==
    /// Returns all items, most recent first.
    pub fn get_all(&self) -> Vec<T> {
        self.order.iter().cloned().collect()
    }

    // == Get LRU ==
    /// Returns the least recently touched item without removing it.
    pub fn get_lru(&self) -> Option<&T> {
        self.order.back()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn unlink(&mut self, item: &T) {
        if let Some(index) = self.order.iter().position(|existing| existing == item) {
            self.order.remove(index);
        }
    }
}
