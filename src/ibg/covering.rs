use petgraph::visit::VisitMap;

use crate::candidate::Configuration;

use super::{IndexBenefitGraph, NodeId};

/*
    A node covers a target configuration if its configuration is a superset of the target and its
    used indexes are a subset of it. The optimizer would pick the same plan for the target, so
    the node's cost is the target's exact cost.

    Starting at the root (a superset of everything), we only ever walk edges that remove an index
    outside of the target, so every node we reach is still a superset. As long as a node is not
    covering, at least one of its used indexes lies outside the target and there is an edge
    for it. On a complete graph the search therefore always succeeds.
 */
pub struct CoveringNodeFinder<'a> {
    graph: &'a IndexBenefitGraph,
}

impl<'a> CoveringNodeFinder<'a> {
    pub fn new(graph: &'a IndexBenefitGraph) -> CoveringNodeFinder<'a> {
        CoveringNodeFinder { graph }
    }

    fn covers(&self, node: NodeId, target: &Configuration) -> bool {
        let node = self.graph.node(node);
        match node.used_indexes() {
            Some(used) => node.config.is_superset_of(target) && used.is_subset_of(target),
            None => false,
        }
    }

    // Targets built against another snapshot generation can't be answered by this graph
    fn answerable(&self, target: &Configuration) -> bool {
        let root_config = &self.graph.node(self.graph.root()).config;
        target.capacity() == root_config.capacity() && root_config.is_superset_of(target)
    }

    pub fn find(&self, target: &Configuration) -> Option<NodeId> {
        if !self.answerable(target) {
            return None;
        }
        let mut visited = self.graph.visit_map();
        let mut stack = vec![self.graph.root()];
        while let Some(node) = stack.pop() {
            if !visited.visit(node) {
                continue;
            }
            // Unexpanded nodes don't know their plan yet
            if !self.graph.node(node).is_expanded() {
                continue;
            }
            if self.covers(node, target) {
                return Some(node);
            }
            for (removed, child) in self.graph.children(node) {
                if !target.contains(removed) {
                    stack.push(child);
                }
            }
        }
        None
    }

    /*
        Resolves several targets in one walk. Instead of following the edges each target would
        allow, we only follow edges that remove an index none of the still missing targets
        contains ("superset of missing"). That keeps it to a single traversal but a target can be
        missed if its covering node is only reachable through an edge another target blocks.
        Anything returned is a real covering node, a None means "not found this way" and callers
        fall back to find().
     */
    pub fn find_many(&self, targets: &[Configuration]) -> Vec<Option<NodeId>> {
        let mut found = vec![None; targets.len()];
        let root = self.graph.root();
        let root_config = &self.graph.node(root).config;
        let mut missing = (0..targets.len())
            .filter(|&t| self.answerable(&targets[t]))
            .collect::<Vec<_>>();
        let mut visited = self.graph.visit_map();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if missing.is_empty() {
                break;
            }
            if !visited.visit(node) || !self.graph.node(node).is_expanded() {
                continue;
            }
            missing.retain(|&t| {
                if self.covers(node, &targets[t]) {
                    found[t] = Some(node);
                    false
                } else {
                    true
                }
            });
            let blocked = missing.iter()
                .fold(Configuration::empty(root_config.capacity()), |acc, &t| acc.union(&targets[t]));
            for (removed, child) in self.graph.children(node) {
                if !blocked.contains(removed) {
                    stack.push(child);
                }
            }
        }
        found
    }
}
