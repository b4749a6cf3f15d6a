// Priority Heap - ordered container keyed by (priority desc, creation time asc)
//
// Arena layout: items live in a growable Vec, and an auxiliary key -> slot
// map tracks each key's current position so arbitrary removal stays
// O(log n). The map is updated on every swap and never exposed to callers.

use std::collections::HashMap;

use crate::domain::{Item, ItemKey, Priority};

/// Binary max-heap over [`Item`]s with O(1) lookup by key.
///
/// `peek()`/`pop()` always return the item with the highest priority,
/// ties broken by earliest creation time. Operating on an absent key
/// returns `None`; an index/key mismatch discovered during a mutation
/// panics, since it means the heap is corrupt.
#[derive(Debug, Default)]
pub struct PriorityHeap {
    items: Vec<Item>,
    slots: HashMap<ItemKey, usize>,
}

impl PriorityHeap {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Rebuild a heap from a flat item list (snapshot import).
    pub fn from_items(items: Vec<Item>) -> Self {
        let mut heap = Self::new();
        for item in items {
            heap.add(item);
        }
        heap
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Highest-ranked item without removing it.
    pub fn peek(&self) -> Option<&Item> {
        self.items.first()
    }

    /// O(1) lookup by key.
    pub fn get(&self, key: &str) -> Option<&Item> {
        let slot = *self.slots.get(key)?;
        Some(&self.items[slot])
    }

    /// Insert a new item, or update the priority of an existing key and
    /// re-establish heap order.
    pub fn add(&mut self, item: Item) {
        if let Some(&slot) = self.slots.get(&item.key) {
            self.items[slot].priority = item.priority;
            self.fix(slot);
            return;
        }
        let slot = self.items.len();
        self.slots.insert(item.key.clone(), slot);
        self.items.push(item);
        self.sift_up(slot);
    }

    /// Update the priority of an existing key; no-op if absent.
    pub fn update_priority(&mut self, key: &str, priority: Priority) -> Option<&Item> {
        let slot = *self.slots.get(key)?;
        self.items[slot].priority = priority;
        let slot = self.fix(slot);
        Some(&self.items[slot])
    }

    /// Remove and return the highest-ranked item.
    pub fn pop(&mut self) -> Option<Item> {
        if self.items.is_empty() {
            return None;
        }
        let key = self.items[0].key.clone();
        self.remove(&key)
    }

    /// Remove an arbitrary key in O(log n).
    pub fn remove(&mut self, key: &str) -> Option<Item> {
        let slot = self.slots.remove(key)?;
        let last = self.items.len() - 1;
        if self.items[slot].key != key {
            // Slot map and arena disagree: the heap is corrupt.
            panic!(
                "priority heap corrupted: slot {} holds {:?}, expected {:?}",
                slot, self.items[slot].key, key
            );
        }
        self.items.swap(slot, last);
        let removed = self.items.pop().expect("non-empty heap");
        if slot < self.items.len() {
            self.slots.insert(self.items[slot].key.clone(), slot);
            self.fix(slot);
        }
        Some(removed)
    }

    /// Copy of all items, unordered (snapshot export).
    pub fn items(&self) -> Vec<Item> {
        self.items.clone()
    }

    /// Copy of all items in dequeue order. O(n log n); used by the
    /// reconciliation loop to walk candidates without mutating the heap.
    pub fn sorted_items(&self) -> Vec<Item> {
        let mut sorted = self.items.clone();
        sorted.sort_by(|a, b| {
            if a.ranks_before(b) {
                std::cmp::Ordering::Less
            } else if b.ranks_before(a) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        sorted
    }

    /// Re-establish heap order for the item at `slot` after a priority
    /// change; returns its final slot.
    fn fix(&mut self, slot: usize) -> usize {
        let up = self.sift_up(slot);
        if up != slot {
            return up;
        }
        self.sift_down(slot)
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.items[slot].ranks_before(&self.items[parent]) {
                break;
            }
            self.swap_slots(slot, parent);
            slot = parent;
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) -> usize {
        let len = self.items.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut best = slot;
            if left < len && self.items[left].ranks_before(&self.items[best]) {
                best = left;
            }
            if right < len && self.items[right].ranks_before(&self.items[best]) {
                best = right;
            }
            if best == slot {
                break;
            }
            self.swap_slots(slot, best);
            slot = best;
        }
        slot
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.items.swap(a, b);
        self.slots.insert(self.items[a].key.clone(), a);
        self.slots.insert(self.items[b].key.clone(), b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(mut heap: PriorityHeap) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(item) = heap.pop() {
            out.push(item.key);
        }
        out
    }

    #[test]
    fn test_pop_order_priority_desc_then_creation_asc() {
        let mut heap = PriorityHeap::new();
        heap.add(Item::new("k1", 10, 1000));
        heap.add(Item::new("k2", 20, 1000));
        heap.add(Item::new("k3", 10, 0)); // 1s earlier than k1
        assert_eq!(keys(heap), vec!["k2", "k3", "k1"]);
    }

    #[test]
    fn test_pop_is_non_increasing_priority() {
        let mut heap = PriorityHeap::new();
        for (i, prio) in [3, 7, 1, 9, 9, 2, 5, 0, 8].iter().enumerate() {
            heap.add(Item::new(format!("k{}", i), *prio, i as i64));
        }
        let mut last = i64::MAX;
        while let Some(item) = heap.pop() {
            assert!(item.priority <= last);
            last = item.priority;
        }
    }

    #[test]
    fn test_add_existing_key_updates_priority() {
        let mut heap = PriorityHeap::new();
        heap.add(Item::new("a", 1, 0));
        heap.add(Item::new("b", 2, 0));
        assert_eq!(heap.peek().unwrap().key, "b");

        heap.add(Item::new("a", 3, 999)); // creation time is immutable, only priority moves
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.peek().unwrap().key, "a");
        assert_eq!(heap.get("a").unwrap().creation_time_ms, 0);
    }

    #[test]
    fn test_update_priority_reheapifies_downward() {
        let mut heap = PriorityHeap::new();
        heap.add(Item::new("a", 10, 0));
        heap.add(Item::new("b", 5, 0));
        heap.add(Item::new("c", 3, 0));
        heap.update_priority("a", 1);
        assert_eq!(heap.peek().unwrap().key, "b");
    }

    #[test]
    fn test_remove_arbitrary_key() {
        let mut heap = PriorityHeap::new();
        heap.add(Item::new("a", 1, 0));
        heap.add(Item::new("b", 2, 0));
        heap.add(Item::new("c", 3, 0));

        let removed = heap.remove("b").unwrap();
        assert_eq!(removed.key, "b");
        assert_eq!(heap.len(), 2);
        assert!(!heap.contains("b"));
        assert_eq!(keys(heap), vec!["c", "a"]);
    }

    #[test]
    fn test_remove_absent_key_is_none() {
        let mut heap = PriorityHeap::new();
        heap.add(Item::new("a", 1, 0));
        assert!(heap.remove("missing").is_none());
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_get_absent_key_is_none() {
        let heap = PriorityHeap::new();
        assert!(heap.get("nope").is_none());
        assert!(heap.peek().is_none());
    }

    #[test]
    fn test_sorted_items_does_not_mutate() {
        let mut heap = PriorityHeap::new();
        heap.add(Item::new("a", 1, 0));
        heap.add(Item::new("b", 2, 0));

        let sorted = heap.sorted_items();
        assert_eq!(sorted[0].key, "b");
        assert_eq!(sorted[1].key, "a");
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.peek().unwrap().key, "b");
    }

    #[test]
    fn test_from_items_round_trip() {
        let mut heap = PriorityHeap::new();
        heap.add(Item::new("a", 1, 5));
        heap.add(Item::new("b", 9, 5));
        heap.add(Item::new("c", 4, 5));

        let rebuilt = PriorityHeap::from_items(heap.items());
        assert_eq!(rebuilt.len(), 3);
        assert_eq!(rebuilt.peek().unwrap().key, "b");
    }

    #[test]
    fn test_remove_last_slot() {
        let mut heap = PriorityHeap::new();
        heap.add(Item::new("a", 2, 0));
        heap.add(Item::new("b", 1, 0));
        assert_eq!(heap.remove("b").unwrap().key, "b");
        assert_eq!(heap.pop().unwrap().key, "a");
        assert!(heap.is_empty());
    }
}
