use std::sync::Arc;

use crate::candidate::{Index, IndexId};

#[derive(Debug, Clone)]
struct HotSlot {
    index: Arc<Index>,
    // Round in which a query or vote last referred to the index
    last_relevant: u64,
}

// Fixed number of slots. Slot k is bit k of a work function state.
#[derive(Debug, Clone)]
pub struct HotSet {
    slots: Vec<Option<HotSlot>>,
}

impl HotSet {
    pub fn new(capacity: usize) -> HotSet {
        HotSet { slots: vec![None; capacity] }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slot_of(&self, id: IndexId) -> Option<usize> {
        self.slots.iter().position(|s| matches!(s, Some(slot) if slot.index.id == id))
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    // Least recently relevant member outside of the protected slots, the lower id wins ties
    pub fn eviction_candidate(&self, protected: u32) -> Option<usize> {
        self.slots.iter().enumerate()
            .filter(|(k, _)| protected & (1 << k) == 0)
            .filter_map(|(k, s)| s.as_ref().map(|slot| (k, slot.last_relevant, slot.index.id)))
            .min_by_key(|&(_, last_relevant, id)| (last_relevant, id))
            .map(|(k, _, _)| k)
    }

    pub fn index(&self, slot: usize) -> Option<&Arc<Index>> {
        self.slots.get(slot).and_then(|s| s.as_ref()).map(|s| &s.index)
    }

    pub fn insert(&mut self, slot: usize, index: Arc<Index>, round: u64) {
        self.slots[slot] = Some(HotSlot { index, last_relevant: round });
    }

    pub fn remove(&mut self, slot: usize) -> Option<Arc<Index>> {
        self.slots[slot].take().map(|s| s.index)
    }

    pub fn touch(&mut self, slot: usize, round: u64) {
        if let Some(s) = self.slots[slot].as_mut() {
            s.last_relevant = s.last_relevant.max(round);
        }
    }

    // Bitmask of all occupied slots
    pub fn occupied_mask(&self) -> u32 {
        self.slots.iter().enumerate()
            .filter(|(_, s)| s.is_some())
            .fold(0, |mask, (k, _)| mask | (1 << k))
    }

    pub fn creation_cost(&self, slot: usize) -> f64 {
        self.index(slot).map(|i| i.creation_cost()).unwrap_or(0.0)
    }

    // Members of the state, ordered by id
    pub fn indexes_of(&self, state: u32) -> Vec<Arc<Index>> {
        let mut indexes = (0..self.slots.len())
            .filter(|k| state & (1 << k) != 0)
            .filter_map(|k| self.index(k).cloned())
            .collect::<Vec<_>>();
        indexes.sort_by_key(|i| i.id);
        indexes
    }

    pub fn ids_of(&self, state: u32) -> Vec<IndexId> {
        self.indexes_of(state).iter().map(|i| i.id).collect()
    }

    // None if one of the ids isn't hot
    pub fn state_of(&self, ids: &[IndexId]) -> Option<u32> {
        ids.iter().try_fold(0u32, |mask, &id| self.slot_of(id).map(|k| mask | (1 << k)))
    }
}
