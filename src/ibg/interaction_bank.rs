use std::{collections::BTreeMap, time::{Duration, Instant}};

use ahash::AHashMap;

use crate::candidate::IndexId;

// When an interaction was learned: time since the profiling round started, what-if calls spent
// and pairs examined until then
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionStamp {
    pub elapsed: Duration,
    pub what_if_calls: usize,
    pub pairs_examined: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionEntry {
    pub value: f64,
    pub previous: Option<f64>,
    pub stamp: InteractionStamp,
}

/*
    Strongest interaction degree seen so far for each unordered pair of indexes. Values only ever
    get replaced by ones with a strictly larger magnitude, so the bank holds an upper envelope over
    everything the analysis has observed. Pairs are keyed (min, max) which makes lookups symmetric.

    The bank also keeps the best benefit an index was seen to have, which the work function uses to
    decide what gets into the hot set.
 */
#[derive(Debug, Clone, Default)]
pub struct InteractionBank {
    interactions: BTreeMap<(IndexId, IndexId), InteractionEntry>,
    best_benefits: AHashMap<IndexId, f64>,
}

fn pair_key(a: IndexId, b: IndexId) -> (IndexId, IndexId) {
    if a < b { (a, b) } else { (b, a) }
}

impl InteractionBank {
    pub fn new() -> InteractionBank {
        InteractionBank::default()
    }

    // Returns whether the stored value changed
    pub fn assign_interaction(&mut self, a: IndexId, b: IndexId, value: f64, stamp: InteractionStamp) -> bool {
        if a == b || !value.is_finite() {
            return false;
        }
        let key = pair_key(a, b);
        match self.interactions.get_mut(&key) {
            Some(entry) => {
                if value.abs() > entry.value.abs() {
                    entry.previous = Some(entry.value);
                    entry.value = value;
                    entry.stamp = stamp;
                    true
                } else {
                    false
                }
            }
            None => {
                self.interactions.insert(key, InteractionEntry { value, previous: None, stamp });
                true
            }
        }
    }

    // 0 for pairs never seen
    pub fn interaction(&self, a: IndexId, b: IndexId) -> f64 {
        self.entry(a, b).map(|e| e.value).unwrap_or(0.0)
    }

    pub fn entry(&self, a: IndexId, b: IndexId) -> Option<&InteractionEntry> {
        self.interactions.get(&pair_key(a, b))
    }

    pub fn assign_benefit(&mut self, index: IndexId, benefit: f64) -> bool {
        if !benefit.is_finite() {
            return false;
        }
        match self.best_benefits.get_mut(&index) {
            Some(best) if benefit > *best => {
                *best = benefit;
                true
            }
            Some(_) => false,
            None => {
                self.best_benefits.insert(index, benefit);
                true
            }
        }
    }

    pub fn best_benefit(&self, index: IndexId) -> f64 {
        self.best_benefits.get(&index).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    // Pairs in ascending (min, max) order
    pub fn iter(&self) -> impl Iterator<Item = ((IndexId, IndexId), &InteractionEntry)> {
        self.interactions.iter().map(|(key, entry)| (*key, entry))
    }
}

// Started when a profiling round begins, so stamps include the time spent building the IBG
pub struct InteractionLogger {
    started: Instant,
    what_if_calls: usize,
    pairs_examined: usize,
}

impl InteractionLogger {
    pub fn start() -> InteractionLogger {
        InteractionLogger { started: Instant::now(), what_if_calls: 0, pairs_examined: 0 }
    }

    pub fn record_what_if_calls(&mut self, calls: usize) {
        self.what_if_calls += calls;
    }

    pub fn record_pair(&mut self) {
        self.pairs_examined += 1;
    }

    pub fn stamp(&self) -> InteractionStamp {
        InteractionStamp {
            elapsed: self.started.elapsed(),
            what_if_calls: self.what_if_calls,
            pairs_examined: self.pairs_examined,
        }
    }
}
