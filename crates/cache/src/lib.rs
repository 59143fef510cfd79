// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the fixed-capacity frame cache that absorbs repeated
//! accesses to hot (cartridge, frame) slots.
//!
//! Priority `1` means most recently touched; priority `N` (the cache's
//! capacity) means next victim. Every successful [`Cache::put`] or
//! hitting [`Cache::get`] refreshes the touched entry to priority `1`
//! and shifts every entry that was strictly more recent than it down by
//! one, so occupied entries always hold a permutation of
//! `{1, ..., occupied_count}`. The re-ranking sweeps every occupied
//! entry on each touch; this is O(N) in the cache's capacity, which the
//! design keeps deliberately small, rather than O(log N) with a heap or
//! intrusive list — see the virtio block driver's request-header
//! allocator for the same small-N-favors-simplicity trade-off.

#![forbid(unsafe_code)]

use bus::{Slot, FRAME_SIZE};

struct Entry {
    slot: Slot,
    payload: [u8; FRAME_SIZE],
    priority: usize,
    occupied: bool,
}

impl Entry {
    fn empty() -> Self {
        Entry {
            slot: Slot::new(0, 0),
            payload: [0; FRAME_SIZE],
            priority: 0,
            occupied: false,
        }
    }
}

/// A fixed-capacity cache of frame payloads, keyed by [`Slot`].
///
/// Capacity is fixed at construction; [`Cache`] cannot grow afterwards.
///
pub struct Cache {
    entries: Vec<Entry>,
    occupied_count: usize,
}

impl Cache {
    /// Creates a cache with room for `capacity` frames. `capacity` must
    /// be greater than zero.
    ///
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, Entry::empty);
        Cache {
            entries,
            occupied_count: 0,
        }
    }

    /// Returns the cache's fixed capacity.
    ///
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the cache holds no entries yet. Callers that
    /// want to change capacity after construction can do so safely
    /// while this holds, since there is nothing to carry over.
    ///
    pub fn is_empty(&self) -> bool {
        self.occupied_count == 0
    }

    fn index_of(&self, slot: Slot) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.occupied && e.slot == slot)
    }

    fn victim_index(&self) -> usize {
        self.entries
            .iter()
            .position(|e| e.occupied && e.priority == self.occupied_count)
            .expect("occupied entries always hold a permutation of 1..=occupied_count")
    }

    /// Promotes the entry at `index` to priority `1`, shifting every
    /// entry that was strictly more recent down by one. Preserves the
    /// invariant that occupied priorities form `{1, ..., occupied_count}`.
    ///
    fn promote(&mut self, index: usize) {
        let old_priority = self.entries[index].priority;
        for entry in self.entries.iter_mut() {
            if entry.occupied && entry.priority < old_priority {
                entry.priority += 1;
            }
        }
        self.entries[index].priority = 1;
    }

    /// Inserts or refreshes the payload for `slot`. Never fails on a
    /// well-formed call.
    ///
    pub fn put(&mut self, slot: Slot, payload: &[u8; FRAME_SIZE]) {
        if let Some(index) = self.index_of(slot) {
            self.entries[index].payload = *payload;
            self.promote(index);
            return;
        }

        if self.occupied_count < self.entries.len() {
            // A fresh entry into a previously-unoccupied slot starts as
            // the next victim rather than MRU; it has not been touched
            // since insertion, so it skips promote().
            let index = self
                .entries
                .iter()
                .position(|e| !e.occupied)
                .expect("occupied_count under capacity implies a free entry");
            self.occupied_count += 1;
            self.entries[index].occupied = true;
            self.entries[index].priority = self.occupied_count;
            self.entries[index].slot = slot;
            self.entries[index].payload = *payload;
            return;
        }

        log::debug!("cache: evicting slot to make room for {:?}", slot);
        let index = self.victim_index();
        self.entries[index].slot = slot;
        self.entries[index].payload = *payload;
        self.promote(index);
    }

    /// Returns a copy of the cached payload for `slot`, refreshing its
    /// priority to `1` on a hit. Returns `None` on a miss, leaving the
    /// cache unchanged.
    ///
    pub fn get(&mut self, slot: Slot) -> Option<[u8; FRAME_SIZE]> {
        let index = self.index_of(slot)?;
        let payload = self.entries[index].payload;
        self.promote(index);
        Some(payload)
    }

    /// Removes `slot` from the cache if present, returning its payload.
    /// Not used by the filesystem layer; provided as a complete
    /// counterpart to `put`/`get` for callers that need explicit
    /// invalidation.
    ///
    pub fn delete(&mut self, slot: Slot) -> Option<[u8; FRAME_SIZE]> {
        let index = self.index_of(slot)?;
        let payload = self.entries[index].payload;
        let vacated_priority = self.entries[index].priority;
        self.entries[index] = Entry::empty();
        for entry in self.entries.iter_mut() {
            if entry.occupied && entry.priority > vacated_priority {
                entry.priority -= 1;
            }
        }
        self.occupied_count -= 1;
        Some(payload)
    }

    /// Returns whether every occupied entry's priority is unique and
    /// the occupied set forms `{1, ..., occupied_count}`. Exposed for
    /// tests that want to assert the invariant after arbitrary
    /// sequences of operations.
    ///
    pub fn check_priority_invariant(&self) -> bool {
        let mut priorities: Vec<usize> = self
            .entries
            .iter()
            .filter(|e| e.occupied)
            .map(|e| e.priority)
            .collect();
        priorities.sort_unstable();
        priorities.iter().copied().eq(1..=self.occupied_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(byte: u8) -> [u8; FRAME_SIZE] {
        [byte; FRAME_SIZE]
    }

    #[test]
    fn put_then_get_round_trips() {
        let mut cache = Cache::new(4);
        let slot = Slot::new(0, 1);
        cache.put(slot, &payload(7));
        assert_eq!(cache.get(slot), Some(payload(7)));
    }

    #[test]
    fn miss_returns_none_and_leaves_cache_unchanged() {
        let mut cache = Cache::new(2);
        cache.put(Slot::new(0, 0), &payload(1));
        assert_eq!(cache.get(Slot::new(9, 9)), None);
        assert!(cache.check_priority_invariant());
    }

    #[test]
    fn touching_an_entry_saves_it_from_the_next_eviction() {
        let mut cache = Cache::new(3);
        let a = Slot::new(0, 0);
        let b = Slot::new(0, 1);
        let c = Slot::new(0, 2);
        cache.put(a, &payload(1));
        cache.put(b, &payload(2));
        cache.put(c, &payload(3));
        // c is freshest and so is the current victim. Touch it and it
        // becomes MRU, leaving b (untouched) as the next victim instead.
        assert_eq!(cache.get(c), Some(payload(3)));
        assert!(cache.check_priority_invariant());

        let d = Slot::new(0, 3);
        cache.put(d, &payload(4));
        assert_eq!(cache.get(b), None);
        assert_eq!(cache.get(a), Some(payload(1)));
        assert_eq!(cache.get(c), Some(payload(3)));
        assert_eq!(cache.get(d), Some(payload(4)));
    }

    #[test]
    fn freshly_inserted_entries_are_evicted_before_touched_ones() {
        let mut cache = Cache::new(2);
        let a = Slot::new(0, 0);
        let b = Slot::new(0, 1);
        let c = Slot::new(0, 2);
        cache.put(a, &payload(1));
        cache.put(b, &payload(2));
        // Neither a nor b has been touched since insertion, so b (the
        // more recently inserted, and so the current next-victim) is
        // evicted, not a.
        cache.put(c, &payload(3));
        assert_eq!(cache.get(b), None);
        assert_eq!(cache.get(a), Some(payload(1)));
        assert_eq!(cache.get(c), Some(payload(3)));
    }

    #[test]
    fn priority_invariant_holds_after_arbitrary_operations() {
        let mut cache = Cache::new(3);
        let slots: Vec<Slot> = (0..6).map(|f| Slot::new(0, f)).collect();
        for (i, slot) in slots.iter().enumerate() {
            cache.put(*slot, &payload(i as u8));
            assert!(cache.check_priority_invariant());
            cache.get(*slot);
            assert!(cache.check_priority_invariant());
        }
        cache.get(slots[0]);
        assert!(cache.check_priority_invariant());
    }

    #[test]
    fn overwrite_of_existing_slot_does_not_consume_a_new_entry() {
        let mut cache = Cache::new(2);
        let a = Slot::new(0, 0);
        cache.put(a, &payload(1));
        cache.put(a, &payload(2));
        assert_eq!(cache.get(a), Some(payload(2)));
        assert!(cache.check_priority_invariant());
    }

    #[test]
    fn delete_removes_the_entry_and_shifts_priorities_down() {
        let mut cache = Cache::new(3);
        let a = Slot::new(0, 0);
        let b = Slot::new(0, 1);
        let c = Slot::new(0, 2);
        cache.put(a, &payload(1));
        cache.put(b, &payload(2));
        cache.put(c, &payload(3));

        // b sits in the middle of the priority order; removing it must
        // close the gap rather than leaving a hole.
        assert_eq!(cache.delete(b), Some(payload(2)));
        assert!(cache.check_priority_invariant());
        assert_eq!(cache.get(b), None);
        assert_eq!(cache.get(a), Some(payload(1)));
        assert_eq!(cache.get(c), Some(payload(3)));

        // A slot that was never inserted deletes to nothing and leaves
        // the invariant untouched.
        assert_eq!(cache.delete(Slot::new(9, 9)), None);
        assert!(cache.check_priority_invariant());
    }

    #[test]
    fn is_empty_reflects_occupancy() {
        let mut cache = Cache::new(2);
        assert!(cache.is_empty());
        cache.put(Slot::new(0, 0), &payload(1));
        assert!(!cache.is_empty());
        cache.delete(Slot::new(0, 0));
        assert!(cache.is_empty());
    }
}
