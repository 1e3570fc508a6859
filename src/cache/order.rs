//! Access Order Module
//!
//! O(1) recency tracking for the eviction cache: an index arena holding a
//! doubly-linked list of keys, plus a map from key to arena slot.

use std::collections::HashMap;
use std::hash::Hash;

/// Sentinel for "no link".
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K> {
    key: Option<K>,
    prev: usize,
    next: usize,
}

// == Access Order ==
/// Keys ordered from most recently used (head) to least recently used (tail).
///
/// Freed slots are recycled through a free list threaded over `next`.
#[derive(Debug)]
pub struct AccessOrder<K> {
    index: HashMap<K, usize>,
    nodes: Vec<Node<K>>,
    head: usize,
    tail: usize,
    free: usize,
}

impl<K> Default for AccessOrder<K> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            nodes: Vec::new(),
            head: NIL,
            tail: NIL,
            free: NIL,
        }
    }
}

impl<K: Eq + Hash + Clone> AccessOrder<K> {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks `key` as most recently used, inserting it if untracked.
    pub fn touch(&mut self, key: &K) {
        match self.index.get(key) {
            Some(&slot) => {
                if self.head != slot {
                    self.unlink(slot);
                    self.push_head(slot);
                }
            }
            None => {
                let slot = self.alloc(key.clone());
                self.push_head(slot);
                self.index.insert(key.clone(), slot);
            }
        }
    }

    // == Remove ==
    /// Stops tracking `key`. Returns true if it was tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(slot) => {
                self.unlink(slot);
                self.release(slot);
                true
            }
            None => false,
        }
    }

    // == Pop Oldest ==
    /// Removes and returns the least recently used key.
    pub fn pop_oldest(&mut self) -> Option<K> {
        if self.tail == NIL {
            return None;
        }
        let slot = self.tail;
        self.unlink(slot);
        let key = self.release(slot)?;
        self.index.remove(&key);
        Some(key)
    }

    // == Peek Oldest ==
    #[cfg(test)]
    pub fn peek_oldest(&self) -> Option<&K> {
        if self.tail == NIL {
            return None;
        }
        self.nodes[self.tail].key.as_ref()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.head = NIL;
        self.tail = NIL;
        self.free = NIL;
    }

    /// Iterates keys from most recently used to least recently used.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    // == Linked List Internals ==
    fn alloc(&mut self, key: K) -> usize {
        let node = Node {
            key: Some(key),
            prev: NIL,
            next: NIL,
        };
        if self.free != NIL {
            let slot = self.free;
            self.free = self.nodes[slot].next;
            self.nodes[slot] = node;
            slot
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, slot: usize) -> Option<K> {
        let key = self.nodes[slot].key.take();
        self.nodes[slot].next = self.free;
        self.free = slot;
        key
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);

        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }

        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = NIL;
    }

    fn push_head(&mut self, slot: usize) {
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = self.head;

        if self.head != NIL {
            self.nodes[self.head].prev = slot;
        }
        self.head = slot;

        if self.tail == NIL {
            self.tail = slot;
        }
    }
}

// == Iterator ==
pub struct Iter<'a, K> {
    nodes: &'a [Node<K>],
    cursor: usize,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.nodes[self.cursor];
        self.cursor = node.next;
        node.key.as_ref()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn keys(order: &AccessOrder<&'static str>) -> Vec<&'static str> {
        order.iter().copied().collect()
    }

    #[test]
    fn test_touch_new_keys() {
        let mut order = AccessOrder::new();

        order.touch(&"a");
        order.touch(&"b");
        order.touch(&"c");

        assert_eq!(order.len(), 3);
        assert_eq!(keys(&order), vec!["c", "b", "a"]);
        assert_eq!(order.peek_oldest(), Some(&"a"));
    }

    #[test]
    fn test_touch_existing_moves_to_head() {
        let mut order = AccessOrder::new();

        order.touch(&"a");
        order.touch(&"b");
        order.touch(&"c");
        order.touch(&"a");

        assert_eq!(keys(&order), vec!["a", "c", "b"]);
        assert_eq!(order.peek_oldest(), Some(&"b"));
    }

    #[test]
    fn test_pop_oldest_in_order() {
        let mut order = AccessOrder::new();

        order.touch(&"a");
        order.touch(&"b");
        order.touch(&"c");
        order.touch(&"a");
        order.touch(&"c");
        order.touch(&"b");

        assert_eq!(order.pop_oldest(), Some("a"));
        assert_eq!(order.pop_oldest(), Some("c"));
        assert_eq!(order.pop_oldest(), Some("b"));
        assert_eq!(order.pop_oldest(), None);
        assert!(order.is_empty());
    }

    #[test]
    fn test_remove_middle_head_and_tail() {
        let mut order = AccessOrder::new();
        for key in ["a", "b", "c", "d"] {
            order.touch(&key);
        }

        assert!(order.remove(&"c"));
        assert_eq!(keys(&order), vec!["d", "b", "a"]);

        assert!(order.remove(&"d"));
        assert!(order.remove(&"a"));
        assert_eq!(keys(&order), vec!["b"]);
        assert_eq!(order.peek_oldest(), Some(&"b"));

        assert!(!order.remove(&"missing"));
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut order = AccessOrder::new();
        order.touch(&"a");
        order.touch(&"b");
        order.remove(&"a");
        order.touch(&"c");

        assert_eq!(order.nodes.len(), 2);
        assert_eq!(keys(&order), vec!["c", "b"]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut order = AccessOrder::new();
        order.touch(&"a");
        order.touch(&"b");

        order.clear();

        assert!(order.is_empty());
        assert_eq!(order.peek_oldest(), None);
        order.touch(&"z");
        assert_eq!(keys(&order), vec!["z"]);
    }
}
