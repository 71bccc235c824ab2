/*
    Index benefit graph (IBG)

    The IBG memoizes what-if answers of one statement for subsets of a snapshot's candidates.
    The root is the full snapshot configuration. A node that has been expanded knows its cost and
    the indexes the optimizer's plan used for it, and has one child per *used* index, with that
    index removed. Unused indexes never get an edge: removing an index the plan doesn't touch
    cannot change the plan. This keeps the graph far smaller than the 2^n subsets in practice
    and still lets us find the exact cost of any subset (see covering.rs).

    Nodes live in a petgraph arena, so the node id is just the arena index and grows
    monotonically. Every configuration has at most one node, which is enforced through the
    configuration -> node map.
 */
mod analyzer;
mod constructor;
mod covering;
mod interaction_bank;

use std::fmt::Display;

use ahash::AHashMap;
use petgraph::{graph::{DiGraph, NodeIndex}, visit::{EdgeRef, VisitMap, Visitable}, Direction};

use crate::candidate::{Configuration, IndexId, Snapshot};

pub use self::analyzer::{AnalysisStats, CostBound, IbgAnalyzer};
pub use self::constructor::IbgConstructor;
pub use self::covering::CoveringNodeFinder;
pub use self::interaction_bank::{InteractionBank, InteractionEntry, InteractionLogger, InteractionStamp};

pub type NodeId = NodeIndex;

#[derive(Debug, Clone)]
pub struct IbgNode {
    pub config: Configuration,
    cost: f64,
    used_indexes: Configuration,
    expanded: bool,
}

impl IbgNode {
    fn placeholder(config: Configuration) -> IbgNode {
        let capacity = config.capacity();
        IbgNode { config, cost: f64::NAN, used_indexes: Configuration::empty(capacity), expanded: false }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn cost(&self) -> Option<f64> {
        if self.expanded { Some(self.cost) } else { None }
    }

    pub fn used_indexes(&self) -> Option<&Configuration> {
        if self.expanded { Some(&self.used_indexes) } else { None }
    }
}

pub struct IndexBenefitGraph {
    graph: DiGraph<IbgNode, IndexId>,
    node_cache: AHashMap<Configuration, NodeId>,
    root: NodeId,
    empty_cost: Option<f64>,
    snapshot: Snapshot,
    what_if_calls: usize,
}

impl IndexBenefitGraph {
    fn new(snapshot: Snapshot) -> IndexBenefitGraph {
        let mut graph = DiGraph::new();
        let root_config = snapshot.configuration();
        let root = graph.add_node(IbgNode::placeholder(root_config.clone()));
        let mut node_cache = AHashMap::new();
        node_cache.insert(root_config, root);
        IndexBenefitGraph {
            graph,
            node_cache,
            root,
            empty_cost: None,
            snapshot,
            what_if_calls: 0,
        }
    }

    // Returns the node for the configuration and whether it had to be created
    fn node_for(&mut self, config: Configuration) -> (NodeId, bool) {
        if let Some(&node) = self.node_cache.get(&config) {
            return (node, false);
        }
        let node = self.graph.add_node(IbgNode::placeholder(config.clone()));
        self.node_cache.insert(config, node);
        (node, true)
    }

    fn set_expansion(&mut self, node: NodeId, cost: f64, used_indexes: Configuration) {
        let node = &mut self.graph[node];
        node.cost = cost;
        node.used_indexes = used_indexes;
        node.expanded = true;
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId, removed: IndexId) {
        self.graph.add_edge(parent, child, removed);
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &IbgNode {
        &self.graph[id]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn find_node(&self, config: &Configuration) -> Option<NodeId> {
        self.node_cache.get(config).copied()
    }

    // (removed index, child) pairs, in the order the children were created
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (IndexId, NodeId)> + '_ {
        let mut children = self.graph.edges_directed(id, Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect::<Vec<_>>();
        // petgraph hands out the most recently added edge first
        children.reverse();
        children.into_iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &IbgNode)> {
        self.graph.node_indices().map(move |id| (id, &self.graph[id]))
    }

    pub fn expanded_nodes(&self) -> impl Iterator<Item = (NodeId, &IbgNode)> {
        self.nodes().filter(|(_, node)| node.expanded)
    }

    // Empty visited set over the current arena
    pub(crate) fn visit_map(&self) -> impl VisitMap<NodeId> {
        self.graph.visit_map()
    }

    pub fn is_complete(&self) -> bool {
        self.empty_cost.is_some() && self.graph.node_indices().all(|id| self.graph[id].expanded)
    }

    pub fn empty_cost(&self) -> Option<f64> {
        self.empty_cost
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn what_if_calls(&self) -> usize {
        self.what_if_calls
    }

    // Every index some plan of this statement used. Only these can have a benefit.
    pub fn used_index_union(&self) -> Configuration {
        self.expanded_nodes()
            .fold(Configuration::empty(self.snapshot.capacity()), |acc, (_, node)| acc.union(&node.used_indexes))
    }
}

impl Display for IndexBenefitGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.empty_cost {
            Some(cost) => writeln!(f, "empty configuration: cost {:.2}", cost)?,
            None => writeln!(f, "empty configuration: unknown")?,
        }
        for (id, node) in self.nodes() {
            write!(f, "node {} {}", id.index(), node.config)?;
            if node.expanded {
                write!(f, " cost {:.2} used {}", node.cost, node.used_indexes)?;
            } else {
                write!(f, " (unexpanded)")?;
            }
            let children = self.children(id)
                .map(|(removed, child)| format!("-{}:{}", removed, child.index()))
                .collect::<Vec<_>>();
            if !children.is_empty() {
                write!(f, " children [{}]", children.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
