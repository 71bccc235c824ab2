use std::sync::Arc;

use ahash::AHashMap;
use itertools::Itertools;
use log::{debug, warn};

use crate::{candidate::{Configuration, IndexId}, error::{AdvisorError, AdvisorResult}};

use super::{CoveringNodeFinder, IndexBenefitGraph, InteractionBank, InteractionLogger};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBound {
    pub low: f64,
    pub high: f64,
}

impl CostBound {
    fn exact(cost: f64) -> CostBound {
        CostBound { low: cost, high: cost }
    }

    pub fn is_exact(&self) -> bool {
        self.low == self.high
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub pairs_examined: usize,
    pub interactions_updated: usize,
    pub benefits_updated: usize,
}

pub struct IbgAnalyzer {
    graph: Arc<IndexBenefitGraph>,
}

impl IbgAnalyzer {
    pub fn new(graph: Arc<IndexBenefitGraph>) -> IbgAnalyzer {
        IbgAnalyzer { graph }
    }

    pub fn graph(&self) -> &Arc<IndexBenefitGraph> {
        &self.graph
    }

    // Indexes outside the snapshot don't exist for this statement, so they are simply dropped.
    fn normalize(&self, target: &Configuration) -> Configuration {
        let root_config = &self.graph.node(self.graph.root()).config;
        target.restrict_to_capacity(root_config.capacity()).intersection(root_config)
    }

    pub fn exact_cost(&self, target: &Configuration) -> Option<f64> {
        let target = self.normalize(target);
        CoveringNodeFinder::new(&self.graph).find(&target)
            .and_then(|node| self.graph.node(node).cost())
    }

    /*
        Without a covering node we still know that the cost is monotone: every expanded superset
        is at most as expensive and every expanded subset at least as expensive as the target.
        The empty configuration is a subset of everything.
     */
    pub fn cost_bounds(&self, target: &Configuration) -> CostBound {
        let target = self.normalize(target);
        if let Some(cost) = self.exact_cost(&target) {
            return CostBound::exact(cost);
        }
        let mut low = 0.0f64;
        let mut high = self.graph.empty_cost().unwrap_or(f64::INFINITY);
        for (_, node) in self.graph.expanded_nodes() {
            let cost = match node.cost() {
                Some(cost) => cost,
                None => continue,
            };
            if node.config.is_superset_of(&target) {
                low = low.max(cost);
            }
            if node.config.is_subset_of(&target) {
                high = high.min(cost);
            }
        }
        CostBound { low, high }
    }

    pub fn benefit(&self, index: IndexId, at: &Configuration) -> Option<f64> {
        let at = self.normalize(at);
        let with = self.exact_cost(&at)?;
        let without = self.exact_cost(&at.without(index))?;
        Some(without - with)
    }

    pub fn interaction(&self, a: IndexId, b: IndexId, at: &Configuration) -> Option<f64> {
        let at = self.normalize(at);
        let both = self.exact_cost(&at)?;
        let without_a = self.exact_cost(&at.without(a))?;
        let without_b = self.exact_cost(&at.without(b))?;
        let without_ab = self.exact_cost(&at.without(a).without(b))?;
        // Grouped so that swapping a and b gives the same bits
        Some((without_ab + both) - (without_a + without_b))
    }

    pub fn validate(&self) -> AdvisorResult<()> {
        if self.graph.empty_cost().is_none() {
            return Err(AdvisorError::InconsistentGraph("cost of the empty configuration is unknown".to_string()));
        }
        for (id, node) in self.graph.expanded_nodes() {
            let (cost, used) = match (node.cost(), node.used_indexes()) {
                (Some(cost), Some(used)) => (cost, used),
                _ => continue,
            };
            if !used.is_subset_of(&node.config) {
                return Err(AdvisorError::InconsistentGraph(format!(
                    "node {} uses {} outside of its configuration {}", id.index(), used, node.config)));
            }
            if !cost.is_finite() {
                return Err(AdvisorError::InconsistentGraph(format!("node {} has cost {}", id.index(), cost)));
            }
            let mut children = 0;
            for (removed, child) in self.graph.children(id) {
                children += 1;
                if !used.contains(removed) || self.graph.node(child).config != node.config.without(removed) {
                    return Err(AdvisorError::InconsistentGraph(format!(
                        "edge -{} from node {} to node {} doesn't remove a used index", removed, id.index(), child.index())));
                }
            }
            if children != used.len() {
                return Err(AdvisorError::InconsistentGraph(format!(
                    "node {} has {} children for {} used indexes", id.index(), children, used.len())));
            }
        }
        Ok(())
    }

    /*
        Interaction mining. For every expanded node C and every pair {i, j} in C, at least one of
        which C's plan uses (otherwise removing both doesn't change anything and the degree is 0),
        compute the degree of interaction at C and offer it to the bank. The four costs needed per
        pair overlap heavily between pairs, so they are memoized per configuration and resolved
        through one find_many walk per node before falling back to single searches.
     */
    pub fn analyze(&self, bank: &mut InteractionBank, logger: &mut InteractionLogger) -> AdvisorResult<AnalysisStats> {
        self.validate()?;
        let finder = CoveringNodeFinder::new(&self.graph);
        let mut memo: AHashMap<Configuration, Option<f64>> = AHashMap::new();
        let mut stats = AnalysisStats::default();

        for (_, node) in self.graph.expanded_nodes() {
            let (cost, used) = match (node.cost(), node.used_indexes()) {
                (Some(cost), Some(used)) => (cost, used),
                _ => continue,
            };
            memo.insert(node.config.clone(), Some(cost));
            let members = node.config.iter().collect::<Vec<_>>();
            let pairs = members.iter().copied()
                .tuple_combinations::<(IndexId, IndexId)>()
                .filter(|&(a, b)| used.contains(a) || used.contains(b))
                .collect::<Vec<_>>();

            let mut targets = Vec::new();
            for &i in &members {
                targets.push(node.config.without(i));
            }
            for &(a, b) in &pairs {
                targets.push(node.config.without(a).without(b));
            }
            targets.retain(|t| !memo.contains_key(t));
            targets.sort_by_key(|t| t.iter().collect::<Vec<_>>());
            targets.dedup();
            let found = finder.find_many(&targets);
            for (target, hit) in targets.into_iter().zip(found) {
                let cost = match hit {
                    Some(hit) => self.graph.node(hit).cost(),
                    None => finder.find(&target).and_then(|hit| self.graph.node(hit).cost()),
                };
                memo.insert(target, cost);
            }
            let lookup = |config: &Configuration| memo.get(config).copied().flatten();

            for i in used.iter() {
                if let Some(without) = lookup(&node.config.without(i)) {
                    if bank.assign_benefit(i, without - cost) {
                        stats.benefits_updated += 1;
                    }
                }
            }
            for (a, b) in pairs {
                stats.pairs_examined += 1;
                logger.record_pair();
                let without_a = lookup(&node.config.without(a));
                let without_b = lookup(&node.config.without(b));
                let without_ab = lookup(&node.config.without(a).without(b));
                match (without_a, without_b, without_ab) {
                    (Some(without_a), Some(without_b), Some(without_ab)) => {
                        let degree = (without_ab + cost) - (without_a + without_b);
                        if bank.assign_interaction(a, b, degree, logger.stamp()) {
                            stats.interactions_updated += 1;
                        }
                    }
                    _ => warn!("no exact cost around {} for pair ({}, {}), skipping", node.config, a, b),
                }
            }
        }
        debug!("analysis of {} nodes: {} pairs, {} interactions and {} benefits updated",
            self.graph.node_count(), stats.pairs_examined, stats.interactions_updated, stats.benefits_updated);
        Ok(stats)
    }
}
