//! Lazily grown single-source shortest-path tree
//!
//! [`ShortestPathTree`] runs a resumable Dijkstra over a [`Graph`]: a query
//! settles vertices only until the queried one is final, and the frontier is
//! kept between queries. Edge weight changes reach the tree through
//! [`EdgeListener`] and are repaired in place by the
//! [`ShortestPathTreeUpdater`] instead of recomputing the tree.
//!
//! # Example
//!
//! ```rust
//! use rust_dynamic_spt::{Graph, ShortestPathTree, TreeConfig};
//!
//! let mut graph = Graph::from_edges([('a', 'b', 5), ('a', 'c', 10), ('c', 'b', 2)], true);
//! let (tree, _listener) = ShortestPathTree::attach(&mut graph, 'a', TreeConfig::new()).unwrap();
//!
//! assert_eq!(tree.borrow_mut().distance(&graph, &'b').unwrap(), 5);
//!
//! graph.update_weight(&'a', &'b', 20).unwrap();
//! assert_eq!(tree.borrow_mut().distance(&graph, &'b').unwrap(), 12);
//! assert_eq!(tree.borrow_mut().previous(&graph, &'b').unwrap(), Some('c'));
//! ```

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::candidate::RepairCandidate;
use crate::config::{RepairScope, TreeConfig};
use crate::error::{Result, SptError};
use crate::facade::FiboHeap;
use crate::fibonacci::FibHandle;
use crate::graph::{Edge, EdgeListener, Graph, GraphId, ListenerId, VertexKey, Weight, UNREACHABLE};
use crate::updater::ShortestPathTreeUpdater;

new_key_type! {
    /// Index of a [`TreeNode`] inside one tree
    pub struct NodeId;
}

/// Frontier of the resumable Dijkstra, keyed by tentative distance
type Frontier = FiboHeap<(Weight, NodeId)>;

/// Per-vertex state of a shortest-path tree
#[derive(Debug)]
pub struct TreeNode<K> {
    pub(crate) vertex: K,
    pub(crate) distance: Weight,
    /// `None` for the root and for unreachable vertices
    pub(crate) predecessor: Option<NodeId>,
    pub(crate) successors: SmallVec<[NodeId; 4]>,
    pub(crate) settled: bool,
    pub(crate) queue_handle: Option<FibHandle>,
    pub(crate) in_repair_set: bool,
    pub(crate) visited: bool,
    pub(crate) best_alternative: Option<Rc<RepairCandidate>>,
}

impl<K> TreeNode<K> {
    fn new(vertex: K, distance: Weight, settled: bool) -> Self {
        TreeNode {
            vertex,
            distance,
            predecessor: None,
            successors: SmallVec::new(),
            settled,
            queue_handle: None,
            in_repair_set: false,
            visited: false,
            best_alternative: None,
        }
    }

    pub fn vertex(&self) -> &K {
        &self.vertex
    }

    pub fn distance(&self) -> Weight {
        self.distance
    }

    pub fn predecessor(&self) -> Option<NodeId> {
        self.predecessor
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    /// Distance and predecessor are final
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn is_reachable(&self) -> bool {
        self.distance != UNREACHABLE
    }
}

/// Node arena, vertex index and frontier of one tree
pub(crate) struct TreeState<K> {
    pub(crate) root: NodeId,
    pub(crate) nodes: SlotMap<NodeId, TreeNode<K>>,
    pub(crate) index: FxHashMap<K, NodeId>,
    /// `None` once the tree is complete
    pub(crate) frontier: Option<Frontier>,
    /// Settled nodes of a partial tree ordered by distance; empty once complete
    settled_by_distance: BTreeSet<(Weight, NodeId)>,
    pub(crate) complete: bool,
}

impl<K: VertexKey> TreeState<K> {
    /// Fresh state with only the root on the frontier
    fn seeded(root: K) -> Result<Self> {
        let mut nodes = SlotMap::with_key();
        let id = nodes.insert(TreeNode::new(root.clone(), 0, false));
        let mut index = FxHashMap::default();
        index.insert(root, id);
        let mut state = TreeState {
            root: id,
            nodes,
            index,
            frontier: Some(Frontier::new()),
            settled_by_distance: BTreeSet::new(),
            complete: false,
        };
        state.sync_frontier(id)?;
        Ok(state)
    }

    pub(crate) fn id_of(&self, key: &K) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Node for `key`, created unreachable if the tree has not seen it yet
    ///
    /// New nodes of a complete tree are settled right away.
    pub(crate) fn node_or_insert(&mut self, key: &K) -> NodeId {
        if let Some(&id) = self.index.get(key) {
            return id;
        }
        let id = self
            .nodes
            .insert(TreeNode::new(key.clone(), UNREACHABLE, self.complete));
        self.index.insert(key.clone(), id);
        id
    }

    pub(crate) fn distance_of(&self, id: NodeId) -> Weight {
        self.nodes.get(id).map_or(UNREACHABLE, |node| node.distance)
    }

    /// Out-edges of a live node exist in the tree's view of the graph
    pub(crate) fn is_live(&self, id: NodeId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| node.settled && node.distance != UNREACHABLE)
    }

    pub(crate) fn is_settled(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.settled)
    }

    /// Sets a distance, keeping the frontier key of an unsettled node in sync
    pub(crate) fn set_distance(&mut self, id: NodeId, distance: Weight) -> Result<()> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(());
        };
        let old = std::mem::replace(&mut node.distance, distance);
        if node.settled {
            if !self.complete && old != distance {
                self.settled_by_distance.remove(&(old, id));
                self.settled_by_distance.insert((distance, id));
            }
            return Ok(());
        }
        self.sync_frontier(id)
    }

    /// Takes `id` out of the settled prefix; its frontier entry is restored
    /// by the next [`set_distance`](Self::set_distance)
    pub(crate) fn unsettle(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            if std::mem::replace(&mut node.settled, false) {
                self.settled_by_distance.remove(&(node.distance, id));
            }
        }
    }

    /// Settled nodes farther from the root than `bound`, farthest first
    pub(crate) fn settled_beyond(&self, bound: Weight) -> Vec<NodeId> {
        self.settled_by_distance
            .iter()
            .rev()
            .take_while(|&&(distance, _)| distance > bound)
            .map(|&(_, id)| id)
            .collect()
    }

    fn sync_frontier(&mut self, id: NodeId) -> Result<()> {
        let (Some(frontier), Some(node)) = (self.frontier.as_mut(), self.nodes.get_mut(id)) else {
            return Ok(());
        };
        match (node.queue_handle, node.distance) {
            (Some(handle), UNREACHABLE) => {
                frontier.delete(handle)?;
                node.queue_handle = None;
            }
            (Some(handle), distance) => frontier.update_key(handle, (distance, id))?,
            (None, UNREACHABLE) => {}
            (None, distance) => node.queue_handle = Some(frontier.insert((distance, id))?),
        }
        Ok(())
    }

    /// Re-parents `id`, keeping successor lists consistent
    pub(crate) fn set_predecessor(&mut self, id: NodeId, predecessor: Option<NodeId>) {
        let old = match self.nodes.get_mut(id) {
            Some(node) => std::mem::replace(&mut node.predecessor, predecessor),
            None => return,
        };
        if old == predecessor {
            return;
        }
        if let Some(parent) = old.and_then(|old| self.nodes.get_mut(old)) {
            if let Some(pos) = parent.successors.iter().position(|&child| child == id) {
                parent.successors.swap_remove(pos);
            }
        }
        if let Some(parent) = predecessor.and_then(|new| self.nodes.get_mut(new)) {
            parent.successors.push(id);
        }
    }

    /// `top` and its descendants, parents before children
    ///
    /// Nodes for which `skip` holds are left out together with their subtrees.
    pub(crate) fn subtree(&self, top: NodeId, skip: impl Fn(&TreeNode<K>) -> bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![top];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if skip(node) {
                continue;
            }
            out.push(id);
            stack.extend(node.successors.iter().rev().copied());
        }
        out
    }

    pub(crate) fn frontier_min(&self) -> Option<Weight> {
        self.frontier
            .as_ref()
            .and_then(|frontier| frontier.peek_min())
            .map(|&(distance, _)| distance)
    }

    /// Settles frontier vertices until `target` is settled or the frontier
    /// runs dry
    pub(crate) fn run_dijkstra(&mut self, graph: &Graph<K>, target: Option<&K>) -> Result<()> {
        if self.complete {
            return Ok(());
        }
        if let Some(id) = target.and_then(|key| self.id_of(key)) {
            if self.is_settled(id) {
                return Ok(());
            }
        }
        loop {
            let next = self.frontier.as_mut().and_then(|frontier| frontier.extract_min());
            let Some((distance, id)) = next else {
                self.finish();
                return Ok(());
            };
            let vertex = {
                let node = &mut self.nodes[id];
                node.queue_handle = None;
                node.settled = true;
                self.settled_by_distance.insert((node.distance, id));
                node.vertex.clone()
            };
            trace!(vertex = ?vertex, distance, "settled");

            for (end, weight) in graph.out_edges(&vertex) {
                let candidate = distance.saturating_add(weight);
                let neighbour = self.node_or_insert(end);
                let node = &self.nodes[neighbour];
                if node.settled || candidate >= node.distance {
                    continue;
                }
                self.set_predecessor(neighbour, Some(id));
                self.set_distance(neighbour, candidate)?;
            }

            if self.frontier.as_ref().map_or(true, |frontier| frontier.is_empty()) {
                self.finish();
                return Ok(());
            }
            if target == Some(&vertex) {
                return Ok(());
            }
        }
    }

    fn finish(&mut self) {
        self.frontier = None;
        self.complete = true;
        self.settled_by_distance.clear();
        for node in self.nodes.values_mut() {
            node.settled = true;
            node.queue_handle = None;
        }
        debug!(nodes = self.nodes.len(), "shortest-path tree complete");
    }
}

/// Single-source shortest-path tree that repairs itself on weight changes
///
/// The tree does not own its graph: every query takes the graph it was built
/// from and rejects any other with [`SptError::ForeignGraph`].
pub struct ShortestPathTree<K> {
    graph: GraphId,
    config: TreeConfig,
    state: TreeState<K>,
    updater: ShortestPathTreeUpdater<K>,
}

impl<K: VertexKey> ShortestPathTree<K> {
    /// Creates a tree rooted at `root`
    ///
    /// # Errors
    /// [`SptError::NegativeWeight`] if any edge of `graph` is negative.
    pub fn new(graph: &Graph<K>, root: K, config: TreeConfig) -> Result<Self> {
        if graph.has_negative_edge() {
            if let Some(err) = find_negative_edge(graph) {
                return Err(err);
            }
        }
        debug!(root = ?root, ?config, "seeding shortest-path tree");
        let mut tree = ShortestPathTree {
            graph: graph.id(),
            config,
            state: TreeState::seeded(root)?,
            updater: ShortestPathTreeUpdater::new(),
        };
        if tree.config.is_eager() {
            tree.state.run_dijkstra(graph, None)?;
        }
        Ok(tree)
    }

    /// Creates a tree and subscribes it to `graph`
    ///
    /// The graph keeps only a weak reference: dropping the returned tree
    /// ends the subscription.
    pub fn attach(
        graph: &mut Graph<K>,
        root: K,
        config: TreeConfig,
    ) -> Result<(Rc<RefCell<Self>>, ListenerId)>
    where
        K: 'static,
    {
        let tree = Rc::new(RefCell::new(Self::new(graph, root, config)?));
        let id = graph.subscribe(&tree);
        Ok((tree, id))
    }

    pub fn root(&self) -> &K {
        &self.state.nodes[self.state.root].vertex
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn is_complete(&self) -> bool {
        self.state.complete
    }

    pub fn settled_count(&self) -> usize {
        self.state.nodes.values().filter(|node| node.settled).count()
    }

    /// Buffered weight changes not yet merged into the tree
    pub fn pending_updates(&self) -> usize {
        self.updater.pending_updates()
    }

    /// Current state of `key`'s node, without merging or settling anything
    pub fn node(&self, key: &K) -> Option<&TreeNode<K>> {
        self.state.id_of(key).map(|id| &self.state.nodes[id])
    }

    /// Shortest distance from the root, [`UNREACHABLE`] if there is no path
    pub fn distance(&mut self, graph: &Graph<K>, key: &K) -> Result<Weight> {
        let id = self.settle(graph, key)?;
        Ok(id.map_or(UNREACHABLE, |id| self.state.distance_of(id)))
    }

    /// Predecessor of `key` on its shortest path; the root reports itself
    pub fn previous(&mut self, graph: &Graph<K>, key: &K) -> Result<Option<K>> {
        let Some(id) = self.settle(graph, key)? else {
            return Ok(None);
        };
        if id == self.state.root {
            return Ok(Some(self.root().clone()));
        }
        Ok(self.state.nodes[id]
            .predecessor
            .map(|pred| self.state.nodes[pred].vertex.clone()))
    }

    /// Vertices from the root to `key`, `None` if `key` is unreachable
    pub fn path_to(&mut self, graph: &Graph<K>, key: &K) -> Result<Option<Vec<K>>> {
        let Some(mut id) = self.settle(graph, key)? else {
            return Ok(None);
        };
        if self.state.distance_of(id) == UNREACHABLE {
            return Ok(None);
        }
        let mut path = vec![self.state.nodes[id].vertex.clone()];
        while let Some(pred) = self.state.nodes[id].predecessor {
            path.push(self.state.nodes[pred].vertex.clone());
            id = pred;
        }
        path.reverse();
        Ok(Some(path))
    }

    /// The path to `key` rendered as `a -> b -> c`
    pub fn path_string(&mut self, graph: &Graph<K>, key: &K) -> Result<Option<String>>
    where
        K: fmt::Display,
    {
        Ok(self.path_to(graph, key)?.map(|path| {
            path.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        }))
    }

    /// Merges pending changes and settles every reachable vertex
    pub fn complete(&mut self, graph: &Graph<K>) -> Result<()> {
        self.check_graph(graph)?;
        self.updater.try_merge_update(&mut self.state, graph)?;
        self.state.run_dijkstra(graph, None)
    }

    /// Discards all state and seeds the tree again from `graph`
    pub fn reset(&mut self, graph: &Graph<K>) -> Result<()> {
        self.check_graph(graph)?;
        let root = self.root().clone();
        debug!(root = ?root, "resetting shortest-path tree");
        self.state = TreeState::seeded(root)?;
        self.updater.clear();
        if self.config.is_eager() {
            self.state.run_dijkstra(graph, None)?;
        }
        Ok(())
    }

    /// True when no node carries state from an unfinished repair pass
    pub fn check_all_reset(&self) -> bool {
        self.state.nodes.values().all(|node| {
            !node.in_repair_set && !node.visited && node.best_alternative.is_none()
        })
    }

    /// Indented dump of the tree below the root
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.state.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.state.nodes.get(id) else {
                continue;
            };
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("{:?} ({})", node.vertex, render_distance(node.distance)));
            if !node.settled {
                out.push_str(" ?");
            }
            out.push('\n');
            let mut children = node.successors.to_vec();
            children.sort_by_key(|&child| self.state.distance_of(child));
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }
        out
    }

    /// Frontier entries in heap order, empty once the tree is complete
    pub fn render_frontier(&self) -> String {
        let entries: Vec<String> = self
            .state
            .frontier
            .iter()
            .flat_map(|frontier| frontier.inner().iter())
            .filter_map(|&(distance, id)| {
                let node = self.state.nodes.get(id)?;
                Some(format!("{:?}:{}", node.vertex, render_distance(distance)))
            })
            .collect();
        format!("[{}]", entries.join(", "))
    }

    fn check_graph(&self, graph: &Graph<K>) -> Result<()> {
        if graph.id() == self.graph {
            Ok(())
        } else {
            Err(SptError::ForeignGraph)
        }
    }

    /// Merges pending changes, then runs Dijkstra until `key` is settled
    fn settle(&mut self, graph: &Graph<K>, key: &K) -> Result<Option<NodeId>> {
        self.check_graph(graph)?;
        self.updater.try_merge_update(&mut self.state, graph)?;
        self.state.run_dijkstra(graph, Some(key))?;
        Ok(self.state.id_of(key))
    }
}

impl<K: VertexKey> EdgeListener<K> for ShortestPathTree<K> {
    fn on_edge_weight_changed(
        &mut self,
        graph: &Graph<K>,
        edge: &Edge<K>,
        old_weight: Weight,
    ) -> Result<()> {
        self.check_graph(graph)?;
        let immediate = !self.config.batches_updates();
        if immediate && self.config.scope() == RepairScope::CompleteOnly && !self.state.complete {
            warn!(
                start = ?edge.start(),
                end = ?edge.end(),
                "immediate change reached a partial tree; rebuilding"
            );
            self.reset(graph)?;
            return Err(SptError::PartialTree);
        }
        self.updater
            .edge_changed(&mut self.state, graph, immediate, edge, old_weight)
    }

    fn on_edge_added(&mut self, graph: &Graph<K>, edge: &Edge<K>) -> Result<()> {
        debug!(start = ?edge.start(), end = ?edge.end(), "edge added");
        self.reset(graph)
    }
}

impl<K: VertexKey> fmt::Debug for ShortestPathTree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortestPathTree")
            .field("root", self.root())
            .field("complete", &self.state.complete)
            .field("nodes", &self.state.nodes.len())
            .field("pending", &self.updater.pending_updates())
            .finish()
    }
}

fn render_distance(distance: Weight) -> String {
    if distance == UNREACHABLE {
        "inf".to_string()
    } else {
        distance.to_string()
    }
}

fn find_negative_edge<K: VertexKey>(graph: &Graph<K>) -> Option<SptError> {
    graph.vertices().find_map(|vertex| {
        graph
            .out_edges(vertex.key())
            .find(|&(_, weight)| weight < 0)
            .map(|(end, weight)| SptError::negative_weight(vertex.key(), end, weight))
    })
}
