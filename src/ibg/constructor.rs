use std::collections::VecDeque;

use log::{debug, trace};

use crate::{candidate::{Configuration, Snapshot}, error::{AdvisorError, AdvisorResult}, optimizer::{WhatIfOracle, WhatIfResult}};

use super::{IndexBenefitGraph, NodeId};

// Builds the IBG breadth first. The pending queue is explicit so that construction can be driven
// one expansion at a time (expand_next) instead of only as a whole (run).
pub struct IbgConstructor {
    graph: IndexBenefitGraph,
    oracle: Box<dyn WhatIfOracle + Send>,
    pending: VecDeque<NodeId>,
    empty: Option<WhatIfResult>,
    // Set once the oracle failed, such a graph is never handed out
    failed: bool,
}

impl IbgConstructor {
    pub fn new(snapshot: Snapshot, oracle: Box<dyn WhatIfOracle + Send>) -> IbgConstructor {
        let graph = IndexBenefitGraph::new(snapshot);
        let mut pending = VecDeque::new();
        pending.push_back(graph.root());
        IbgConstructor {
            graph,
            oracle,
            pending,
            empty: None,
            failed: false,
        }
    }

    fn evaluate(&mut self, config: &Configuration) -> AdvisorResult<WhatIfResult> {
        self.graph.what_if_calls += 1;
        let result = self.oracle.evaluate(config)?;
        if result.used_indexes.capacity() != config.capacity() || !result.used_indexes.is_subset_of(config) {
            return Err(AdvisorError::InconsistentGraph(format!(
                "optimizer reported used indexes {:?} for configuration {:?}", result.used_indexes, config)));
        }
        if !result.cost.is_finite() || result.cost < 0.0 {
            return Err(AdvisorError::InconsistentGraph(format!("optimizer reported cost {} for {}", result.cost, config)));
        }
        Ok(result)
    }

    // The cost without any index is an upper bound for everything else, it's always asked first.
    fn ensure_empty_cost(&mut self) -> AdvisorResult<()> {
        if self.empty.is_none() {
            let empty_config = Configuration::empty(self.graph.snapshot.capacity());
            let result = self.evaluate(&empty_config).map_err(|e| { self.failed = true; e })?;
            self.graph.empty_cost = Some(result.cost);
            self.empty = Some(result);
        }
        Ok(())
    }

    // Expands the next pending node. Returns false once nothing is left to expand.
    pub fn expand_next(&mut self) -> AdvisorResult<bool> {
        self.ensure_empty_cost()?;
        let node = match self.pending.pop_front() {
            Some(node) => node,
            None => return Ok(false),
        };
        if self.graph.node(node).is_expanded() {
            return Ok(!self.pending.is_empty());
        }
        let config = self.graph.node(node).config.clone();
        let cached = if config.is_empty() { self.empty.clone() } else { None };
        let result = match cached {
            Some(result) => result,
            None => match self.evaluate(&config) {
                Ok(result) => result,
                Err(e) => {
                    // The node stays pending, the graph is unusable from here on
                    self.pending.push_front(node);
                    self.failed = true;
                    return Err(e);
                }
            },
        };
        trace!("expanded {} (node {}): cost {:.2}, used {}", config, node.index(), result.cost, result.used_indexes);
        let used = result.used_indexes.clone();
        self.graph.set_expansion(node, result.cost, result.used_indexes);
        for removed in used.iter() {
            let (child, created) = self.graph.node_for(config.without(removed));
            self.graph.add_child(node, child, removed);
            if created {
                self.pending.push_back(child);
            }
        }
        Ok(!self.pending.is_empty())
    }

    pub fn run(&mut self) -> AdvisorResult<()> {
        while self.expand_next()? {}
        debug!("IBG over {} candidates complete: {} nodes, {} what-if calls",
            self.graph.snapshot.len(), self.graph.node_count(), self.graph.what_if_calls);
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        !self.failed && self.empty.is_some() && self.pending.is_empty()
    }

    pub fn what_if_calls(&self) -> usize {
        self.graph.what_if_calls
    }

    // Read access to the graph built so far
    pub fn graph(&self) -> &IndexBenefitGraph {
        &self.graph
    }

    pub fn finish(self) -> AdvisorResult<IndexBenefitGraph> {
        if !self.is_finished() {
            return Err(AdvisorError::InconsistentGraph(format!(
                "construction handed out with {} nodes still pending", self.pending.len())));
        }
        if !self.graph.is_complete() {
            return Err(AdvisorError::InconsistentGraph("construction handed out with unexpanded nodes".to_string()));
        }
        Ok(self.graph)
    }

    // Whatever has been built so far, for exercising the analyzer on partial graphs
    #[cfg(test)]
    pub(crate) fn finish_partial(self) -> IndexBenefitGraph {
        self.graph
    }
}
