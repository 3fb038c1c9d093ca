//! Graph plus one shortest-path tree per queried source
//!
//! [`ShortestPathTreeCache`] owns the graph. Trees are created on the first
//! query from a source and subscribed to the graph, so every later weight
//! change reaches all of them.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::TreeConfig;
use crate::error::Result;
use crate::graph::{Graph, ListenerId, VertexKey, Weight};
use crate::tree::ShortestPathTree;

type SharedTree<K> = Rc<RefCell<ShortestPathTree<K>>>;

/// Shortest-path trees over one graph, keyed by source
pub struct ShortestPathTreeCache<K> {
    graph: Graph<K>,
    config: TreeConfig,
    trees: FxHashMap<K, (SharedTree<K>, ListenerId)>,
}

impl<K: VertexKey + 'static> ShortestPathTreeCache<K> {
    /// Trees built by this cache use `config`
    pub fn new(graph: Graph<K>, config: TreeConfig) -> Self {
        ShortestPathTreeCache {
            graph,
            config,
            trees: FxHashMap::default(),
        }
    }

    pub fn graph(&self) -> &Graph<K> {
        &self.graph
    }

    /// Number of cached trees
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// The tree rooted at `source`, built and subscribed on first use
    pub fn tree(&mut self, source: &K) -> Result<SharedTree<K>> {
        if let Some((tree, _)) = self.trees.get(source) {
            return Ok(Rc::clone(tree));
        }
        let (tree, listener) =
            ShortestPathTree::attach(&mut self.graph, source.clone(), self.config.clone())?;
        debug!(source = ?source, cached = self.trees.len() + 1, "cached new shortest-path tree");
        self.trees
            .insert(source.clone(), (Rc::clone(&tree), listener));
        Ok(tree)
    }

    pub fn distance(&mut self, source: &K, target: &K) -> Result<Weight> {
        let tree = self.tree(source)?;
        let distance = tree.borrow_mut().distance(&self.graph, target);
        distance
    }

    pub fn previous(&mut self, source: &K, target: &K) -> Result<Option<K>> {
        let tree = self.tree(source)?;
        let previous = tree.borrow_mut().previous(&self.graph, target);
        previous
    }

    pub fn path_to(&mut self, source: &K, target: &K) -> Result<Option<Vec<K>>> {
        let tree = self.tree(source)?;
        let path = tree.borrow_mut().path_to(&self.graph, target);
        path
    }

    /// Changes an edge weight and lets every cached tree react
    pub fn update_weight(&mut self, start: &K, end: &K, weight: Weight) -> Result<bool> {
        self.graph.update_weight(start, end, weight)
    }

    pub fn add_edge(&mut self, start: K, end: K, weight: Weight) -> Result<()> {
        self.graph.add_edge(start, end, weight)
    }

    /// Drops the tree rooted at `source` and unsubscribes it
    pub fn evict(&mut self, source: &K) -> bool {
        match self.trees.remove(source) {
            Some((_, listener)) => self.graph.unsubscribe(listener),
            None => false,
        }
    }

    /// Unsubscribes every tree and hands the graph back
    pub fn into_graph(mut self) -> Graph<K> {
        for (_, (_, listener)) in self.trees.drain() {
            self.graph.unsubscribe(listener);
        }
        self.graph
    }
}
