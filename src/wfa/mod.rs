/*
    Work function algorithm (WFA)

    Online index selection as a metrical task system. The states are the subsets of the hot set,
    a state is a bitmask over the hot set's slots. For every state s the work function w(s) is
    the cheapest way to have processed all statements so far and end up in s: each statement is
    paid for in whatever state we were in at that time, and moving from t to s costs the creation
    cost of every index in s \ t. Dropping an index is free.

    After each statement
        w'(s) = min_t ( w(t) + cost(t) + delta(t, s) )
    which is computed one slot at a time in O(H * 2^H) instead of O(4^H). The recommendation is
    the state minimizing w(s) + delta(current, s) among the states where w'(s) was attained by
    staying in s, which is what keeps the algorithm from chasing every single statement.

    Only the hot set is modelled. Slots that hold no index make every state containing them
    unreachable (infinite work).
 */
mod hot_set;

use std::{cmp::Ordering, sync::Arc};

use ahash::AHashMap;
use log::{debug, info};

use crate::{candidate::{Configuration, Index, IndexId}, config::AdvisorConfig, error::{AdvisorError, AdvisorResult}, profiler::ProfiledQuery};

pub use self::hot_set::HotSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WfaState {
    Idle,
    TaskSubmitted,
    RecommendationReady,
}

#[derive(Debug, Clone, Copy)]
struct VoteRecord {
    positive: bool,
    round: u64,
    // None when the vote didn't touch the work function
    slot: Option<usize>,
    penalty: f64,
}

#[derive(Debug, Clone)]
pub struct WorkFunctionAlgorithm {
    hot_set: HotSet,
    work: Vec<f64>,
    // States in which the last statement's work was attained without moving
    stays: Vec<bool>,
    recommendation: u32,
    round: u64,
    vote_weight: f64,
    votes: AHashMap<IndexId, VoteRecord>,
    state: WfaState,
}

impl WorkFunctionAlgorithm {
    pub fn new(config: &AdvisorConfig) -> AdvisorResult<WorkFunctionAlgorithm> {
        config.validate()?;
        let states = 1usize << config.hot_set_size;
        let mut work = vec![f64::INFINITY; states];
        work[0] = 0.0;
        Ok(WorkFunctionAlgorithm {
            hot_set: HotSet::new(config.hot_set_size),
            work,
            stays: vec![true; states],
            recommendation: 0,
            round: 0,
            vote_weight: config.vote_weight,
            votes: AHashMap::new(),
            state: WfaState::Idle,
        })
    }

    pub fn state(&self) -> WfaState {
        self.state
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn hot_set(&self) -> Vec<Arc<Index>> {
        self.hot_set.indexes_of(self.hot_set.occupied_mask())
    }

    // Work of the state holding exactly these indexes, None if one of them isn't hot
    pub fn work_value(&self, ids: &[IndexId]) -> Option<f64> {
        self.hot_set.state_of(ids).map(|state| self.work[state as usize])
    }

    fn creation_delta(&self, from: u32, to: u32) -> f64 {
        let added = to & !from;
        (0..self.hot_set.capacity())
            .filter(|k| added & (1 << k) != 0)
            .map(|k| self.hot_set.creation_cost(k))
            .sum()
    }

    fn evict(&mut self, slot: usize) {
        let bit = 1u32 << slot;
        for s in 0..self.work.len() as u32 {
            if s & bit == 0 {
                let (with, without) = ((s | bit) as usize, s as usize);
                if self.work[with] < self.work[without] {
                    self.work[without] = self.work[with];
                }
                self.stays[without] = self.stays[without] || self.stays[with];
                self.work[with] = f64::INFINITY;
                self.stays[with] = true;
            }
        }
        self.recommendation &= !bit;
        if let Some(index) = self.hot_set.remove(slot) {
            self.votes.remove(&index.id);
            debug!("Evicted {} from the hot set", index);
        }
    }

    // Makes the index hot (if it isn't already) and returns its slot. Members of the protected
    // slots are never evicted for it, None if that leaves no room.
    fn admit(&mut self, index: &Arc<Index>, round: u64, protected: u32) -> Option<usize> {
        if let Some(slot) = self.hot_set.slot_of(index.id) {
            self.hot_set.touch(slot, round);
            return Some(slot);
        }
        let slot = match self.hot_set.free_slot() {
            Some(slot) => slot,
            None => {
                let victim = self.hot_set.eviction_candidate(protected)?;
                self.evict(victim);
                victim
            }
        };
        let bit = 1u32 << slot;
        let creation_cost = index.creation_cost();
        for s in 0..self.work.len() as u32 {
            if s & bit == 0 {
                self.work[(s | bit) as usize] = self.work[s as usize] + creation_cost;
                self.stays[(s | bit) as usize] = self.stays[s as usize];
            }
        }
        self.hot_set.insert(slot, index.clone(), round);
        debug!("Admitted {} into hot set slot {}", index, slot);
        Some(slot)
    }

    pub fn new_task(&mut self, query: &ProfiledQuery) -> AdvisorResult<()> {
        // Work on a copy so a failing task leaves everything as it was
        let mut next = self.clone();
        next.state = WfaState::TaskSubmitted;
        next.apply_task(query)?;
        next.recommendation = next.best_state();
        next.state = WfaState::RecommendationReady;
        *self = next;
        info!("Round {}: recommending {:?}", self.round, self.hot_set.ids_of(self.recommendation));
        Ok(())
    }

    fn apply_task(&mut self, query: &ProfiledQuery) -> AdvisorResult<()> {
        self.round += 1;
        let round = self.round;

        let mut referenced = query.ibg.used_index_union().iter()
            .map(|id| query.snapshot.get(id).cloned().ok_or(AdvisorError::UnknownIndex(id)))
            .collect::<AdvisorResult<Vec<_>>>()?;
        if referenced.len() > self.hot_set.capacity() {
            let bank = &query.interaction_bank;
            referenced.sort_by(|a, b| bank.best_benefit(b.id).partial_cmp(&bank.best_benefit(a.id))
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id)));
            referenced.truncate(self.hot_set.capacity());
        }
        // Refresh members first so admitting the others can't evict them
        for index in &referenced {
            if let Some(slot) = self.hot_set.slot_of(index.id) {
                self.hot_set.touch(slot, round);
            }
        }
        for index in &referenced {
            self.admit(index, round, 0);
        }

        let occupied = self.hot_set.occupied_mask();
        let capacity = query.snapshot.capacity();
        let mut next = vec![f64::INFINITY; self.work.len()];
        for s in 0..self.work.len() as u32 {
            if s & !occupied != 0 || self.work[s as usize].is_infinite() {
                continue;
            }
            let config = Configuration::from_ids(capacity,
                self.hot_set.ids_of(s).into_iter().filter(|&id| id < capacity));
            next[s as usize] = self.work[s as usize] + query.total_cost(&config);
        }
        let stay = next.clone();

        for k in 0..self.hot_set.capacity() {
            let bit = 1u32 << k;
            if occupied & bit == 0 {
                continue;
            }
            let creation_cost = self.hot_set.creation_cost(k);
            for s in 0..next.len() as u32 {
                if s & bit != 0 {
                    let candidate = next[(s & !bit) as usize] + creation_cost;
                    if candidate < next[s as usize] {
                        next[s as usize] = candidate;
                    }
                }
            }
            for s in 0..next.len() as u32 {
                if s & bit == 0 && next[(s | bit) as usize] < next[s as usize] {
                    next[s as usize] = next[(s | bit) as usize];
                }
            }
        }

        let min = next.iter().copied().fold(f64::INFINITY, f64::min);
        for s in 0..next.len() {
            self.stays[s] = next[s].is_finite() && next[s] == stay[s];
            if min.is_finite() {
                next[s] -= min;
            }
        }
        self.work = next;
        debug!("Round {}: {} hot indexes, work function normalized by {:.2}", round, self.hot_set.len(), min);
        Ok(())
    }

    fn best_state(&self) -> u32 {
        let occupied = self.hot_set.occupied_mask();
        let current = self.recommendation;
        let any_stay = (0..self.work.len()).any(|s| self.stays[s] && self.work[s].is_finite());
        let mut best: Option<(f64, u32, u32)> = None;
        for s in 0..self.work.len() as u32 {
            if s & !occupied != 0 || !self.work[s as usize].is_finite() || (any_stay && !self.stays[s as usize]) {
                continue;
            }
            let score = self.work[s as usize] + self.creation_delta(current, s);
            let distance = (s ^ current).count_ones();
            let better = match best {
                None => true,
                Some((best_score, best_distance, best_state)) => {
                    score < best_score
                        || (score == best_score && (distance, s) < (best_distance, best_state))
                }
            };
            if better {
                best = Some((score, distance, s));
            }
        }
        best.map(|(_, _, s)| s).unwrap_or(current & occupied)
    }

    // The recommendation only moves with statements, reading it changes nothing but the state
    pub fn get_recommendation(&mut self) -> Vec<Arc<Index>> {
        self.state = WfaState::Idle;
        self.hot_set.indexes_of(self.recommendation)
    }

    /*
        Administrator feedback. A positive vote makes every state without the index more expensive,
        a negative one every state with it, so that future statements have to pay this off before
        the recommendation moves against the vote. Within one round a vote only counts once and
        changing one's mind replaces the earlier vote.

        A vote never changes the current recommendation. A negative vote for an index that isn't
        hot agrees with every modelled state already, and a positive one may only take the slot
        of a member outside of the recommendation.
     */
    pub fn vote(&mut self, index: &Arc<Index>, positive: bool) -> AdvisorResult<()> {
        let round = self.round;
        let previous = self.votes.get(&index.id).copied().filter(|v| v.round == round);
        if previous.map(|v| v.positive) == Some(positive) {
            return Ok(());
        }
        let mut next = self.clone();
        if let Some(VoteRecord { positive: was_positive, slot: Some(slot), penalty, .. }) = previous {
            next.penalize(slot, was_positive, -penalty);
        }
        let slot = if positive {
            next.admit(index, round, next.recommendation)
        } else {
            next.hot_set.slot_of(index.id)
        };
        let penalty = match slot {
            Some(slot) => {
                let penalty = next.vote_weight * index.creation_cost().max(1.0);
                next.hot_set.touch(slot, round);
                next.penalize(slot, positive, penalty);
                penalty
            }
            None => {
                debug!("{} has no hot set slot, the vote leaves the work function alone", index);
                0.0
            }
        };
        next.votes.insert(index.id, VoteRecord { positive, round, slot, penalty });
        *self = next;
        info!("{} vote for {} in round {}", if positive { "Positive" } else { "Negative" }, index, round);
        Ok(())
    }

    // Adds the amount to every reachable state disagreeing with the vote
    fn penalize(&mut self, slot: usize, positive: bool, amount: f64) {
        let bit = 1u32 << slot;
        for s in 0..self.work.len() as u32 {
            let has_index = s & bit != 0;
            if has_index != positive && self.work[s as usize].is_finite() {
                self.work[s as usize] += amount;
            }
        }
    }
}
