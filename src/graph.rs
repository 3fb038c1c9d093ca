//! Weighted graph with change notification
//!
//! The graph owns every vertex and edge. Weights change only through
//! [`Graph::update_weight`] / [`Graph::add_edge`], which fan the change out to
//! every subscribed [`EdgeListener`]. The graph only holds weak references:
//! a listener leaves the fan-out when [`Graph::unsubscribe`] is called or when
//! its last strong reference is dropped.

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, warn};

use crate::error::{Result, SptError};

/// Edge weight and path distance
pub type Weight = i64;

/// Distance reported for vertices the source cannot reach
pub const UNREACHABLE: Weight = Weight::MAX;

/// Requirements on vertex identities
pub trait VertexKey: Clone + Eq + Hash + fmt::Debug {}

impl<T: Clone + Eq + Hash + fmt::Debug> VertexKey for T {}

/// Process-unique identity of a graph instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

impl GraphId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        GraphId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

new_key_type! {
    /// Registration of an [`EdgeListener`] on a graph
    pub struct ListenerId;
}

/// A directed view of an edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<K> {
    start: K,
    end: K,
    weight: Weight,
}

impl<K> Edge<K> {
    pub fn start(&self) -> &K {
        &self.start
    }

    pub fn end(&self) -> &K {
        &self.end
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }
}

type EdgeIndex = usize;

/// A vertex and its incident edges
#[derive(Debug, Clone)]
pub struct Vertex<K> {
    key: K,
    out_edges: FxHashMap<K, EdgeIndex>,
    in_edges: FxHashMap<K, EdgeIndex>,
}

impl<K> Vertex<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn out_degree(&self) -> usize {
        self.out_edges.len()
    }

    pub fn in_degree(&self) -> usize {
        self.in_edges.len()
    }
}

/// Receiver of graph changes
pub trait EdgeListener<K> {
    /// `edge` carries the new weight
    fn on_edge_weight_changed(
        &mut self,
        graph: &Graph<K>,
        edge: &Edge<K>,
        old_weight: Weight,
    ) -> Result<()>;

    fn on_edge_added(&mut self, graph: &Graph<K>, edge: &Edge<K>) -> Result<()>;
}

/// Weighted, directed or undirected graph
pub struct Graph<K> {
    id: GraphId,
    directed: bool,
    vertices: FxHashMap<K, Vertex<K>>,
    /// Edge records; an undirected edge has one record reachable from both ends
    edges: Vec<Edge<K>>,
    has_negative_edge: bool,
    listeners: SlotMap<ListenerId, Weak<RefCell<dyn EdgeListener<K>>>>,
}

impl<K: VertexKey> Graph<K> {
    pub fn new(directed: bool) -> Self {
        Graph {
            id: GraphId::next(),
            directed,
            vertices: FxHashMap::default(),
            edges: Vec::new(),
            has_negative_edge: false,
            listeners: SlotMap::with_key(),
        }
    }

    /// Builds a graph from `(start, end, weight)` triples
    ///
    /// A repeated `(start, end)` pair keeps the last weight. Negative weights
    /// are accepted here but recorded, so that building a shortest-path tree
    /// on this graph fails.
    pub fn from_edges<I>(edges: I, directed: bool) -> Self
    where
        I: IntoIterator<Item = (K, K, Weight)>,
    {
        let mut graph = Graph::new(directed);
        for (start, end, weight) in edges {
            if weight < 0 {
                graph.has_negative_edge = true;
            }
            graph.insert_edge(start, end, weight);
        }
        graph
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn has_negative_edge(&self) -> bool {
        self.has_negative_edge
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, key: &K) -> Option<&Vertex<K>> {
        self.vertices.get(key)
    }

    pub fn contains_vertex(&self, key: &K) -> bool {
        self.vertices.contains_key(key)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<K>> + '_ {
        self.vertices.values()
    }

    pub fn walk_vertices<F: FnMut(&Vertex<K>)>(&self, mut f: F) {
        for vertex in self.vertices.values() {
            f(vertex);
        }
    }

    /// Weight of the edge `start -> end`
    pub fn weight(&self, start: &K, end: &K) -> Option<Weight> {
        let index = *self.vertices.get(start)?.out_edges.get(end)?;
        Some(self.edges[index].weight)
    }

    /// Directed view of the edge `start -> end`
    pub fn edge(&self, start: &K, end: &K) -> Option<Edge<K>> {
        self.weight(start, end).map(|weight| Edge {
            start: start.clone(),
            end: end.clone(),
            weight,
        })
    }

    /// `(end, weight)` for every edge leaving `key`
    pub fn out_edges<'a>(&'a self, key: &K) -> impl Iterator<Item = (&'a K, Weight)> + 'a {
        self.vertices.get(key).into_iter().flat_map(move |vertex| {
            vertex
                .out_edges
                .iter()
                .map(move |(end, &index)| (end, self.edges[index].weight))
        })
    }

    /// `(start, weight)` for every edge entering `key`
    pub fn in_edges<'a>(&'a self, key: &K) -> impl Iterator<Item = (&'a K, Weight)> + 'a {
        self.vertices.get(key).into_iter().flat_map(move |vertex| {
            vertex
                .in_edges
                .iter()
                .map(move |(start, &index)| (start, self.edges[index].weight))
        })
    }

    /// Changes the weight of `start -> end` and notifies every listener
    ///
    /// Returns `Ok(false)` if there is no such edge. Setting the current
    /// weight again notifies nobody. On an undirected graph both directions
    /// are reported.
    pub fn update_weight(&mut self, start: &K, end: &K, weight: Weight) -> Result<bool> {
        if weight < 0 {
            return Err(SptError::negative_weight(start, end, weight));
        }
        let Some(index) = self
            .vertices
            .get(start)
            .and_then(|vertex| vertex.out_edges.get(end))
            .copied()
        else {
            return Ok(false);
        };
        let old_weight = self.edges[index].weight;
        if old_weight == weight {
            return Ok(true);
        }
        self.edges[index].weight = weight;
        debug!(?start, ?end, old_weight, weight, "edge weight changed");
        self.prune_listeners();

        let forward = Edge {
            start: start.clone(),
            end: end.clone(),
            weight,
        };
        let mut outcome = self.notify(|listener, graph| {
            listener.on_edge_weight_changed(graph, &forward, old_weight)
        });
        if !self.directed && start != end {
            let backward = Edge {
                start: end.clone(),
                end: start.clone(),
                weight,
            };
            let reverse = self.notify(|listener, graph| {
                listener.on_edge_weight_changed(graph, &backward, old_weight)
            });
            outcome = outcome.and(reverse);
        }
        outcome.map(|()| true)
    }

    /// Adds the edge `start -> end`, creating missing vertices
    ///
    /// An existing edge is treated as a weight update.
    pub fn add_edge(&mut self, start: K, end: K, weight: Weight) -> Result<()> {
        if weight < 0 {
            return Err(SptError::negative_weight(&start, &end, weight));
        }
        if self.weight(&start, &end).is_some() {
            return self.update_weight(&start, &end, weight).map(|_| ());
        }
        let edge = Edge {
            start: start.clone(),
            end: end.clone(),
            weight,
        };
        self.insert_edge(start, end, weight);
        debug!(start = ?edge.start, end = ?edge.end, weight, "edge added");
        self.prune_listeners();
        self.notify(|listener, graph| listener.on_edge_added(graph, &edge))
    }

    /// Registers `listener` for every later change
    ///
    /// Only a weak reference is kept, so the registration ends by itself once
    /// the caller drops the listener.
    pub fn subscribe<L>(&mut self, listener: &Rc<RefCell<L>>) -> ListenerId
    where
        L: EdgeListener<K> + 'static,
    {
        let strong: Rc<RefCell<dyn EdgeListener<K>>> = listener.clone();
        self.listeners.insert(Rc::downgrade(&strong))
    }

    /// Removes a registration; returns whether it existed
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    /// Number of listeners that are still alive
    pub fn listener_count(&self) -> usize {
        self.listeners
            .values()
            .filter(|listener| listener.strong_count() > 0)
            .count()
    }

    /// Forgets registrations whose listener has been dropped
    fn prune_listeners(&mut self) {
        let before = self.listeners.len();
        self.listeners.retain(|_, listener| listener.strong_count() > 0);
        let dropped = before - self.listeners.len();
        if dropped > 0 {
            debug!(dropped, "pruned dropped listeners");
        }
    }

    fn vertex_entry(&mut self, key: K) -> &mut Vertex<K> {
        self.vertices.entry(key.clone()).or_insert_with(|| Vertex {
            key,
            out_edges: FxHashMap::default(),
            in_edges: FxHashMap::default(),
        })
    }

    fn insert_edge(&mut self, start: K, end: K, weight: Weight) {
        let existing = self
            .vertices
            .get(&start)
            .and_then(|vertex| vertex.out_edges.get(&end))
            .copied();
        if let Some(index) = existing {
            self.edges[index].weight = weight;
            return;
        }
        let index = self.edges.len();
        self.edges.push(Edge {
            start: start.clone(),
            end: end.clone(),
            weight,
        });
        self.vertex_entry(start.clone())
            .out_edges
            .insert(end.clone(), index);
        self.vertex_entry(end.clone())
            .in_edges
            .insert(start.clone(), index);
        if !self.directed {
            self.vertex_entry(end.clone())
                .out_edges
                .insert(start.clone(), index);
            self.vertex_entry(start).in_edges.insert(end, index);
        }
    }

    /// Delivers one change to every listener, returning the first failure
    fn notify<F>(&self, mut deliver: F) -> Result<()>
    where
        F: FnMut(&mut dyn EdgeListener<K>, &Graph<K>) -> Result<()>,
    {
        let mut first_error = None;
        for (id, listener) in &self.listeners {
            let Some(listener) = listener.upgrade() else {
                continue;
            };
            let outcome = match listener.try_borrow_mut() {
                Ok(mut listener) => deliver(&mut *listener, self),
                Err(_) => Err(SptError::ListenerBusy),
            };
            if let Err(err) = outcome {
                warn!(listener = ?id, error = %err, "listener rejected graph change");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<K: VertexKey> fmt::Debug for Graph<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("directed", &self.directed)
            .field("vertices", &self.vertices.len())
            .field("edges", &self.edges.len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
