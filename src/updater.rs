//! Incremental repair of a shortest-path tree after edge weight changes
//!
//! An increase of a tree edge `u -> v` invalidates the subtree below `v`
//! (the repair set). Its nodes first take an optimistic distance along their
//! old tree paths, then every node looks for its cheapest way back in from
//! outside the set. Those [`RepairCandidate`]s are drained cheapest first,
//! Dijkstra style, ranked by how much each attachment changes the target's
//! distance. A node that has nothing better than its parent's candidate
//! shares it instead of queueing its own.
//!
//! A decrease can only improve distances: the subtree below `v` shifts down
//! as a whole and improvements spread outward from it, strictly improving
//! candidates only.
//!
//! Changes to a tree that is still growing are repaired against the graph
//! the tree has explored so far, in which unsettled vertices have no
//! out-edges. The settled set is then cut back to a distance prefix so the
//! resumed Dijkstra stays exact.
//!
//! With batching enabled, changes are buffered per edge and merged right
//! before the next read: decreases one by one, then all increases in a
//! single pass seeded from every increased tree edge.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::candidate::{RepairCandidate, RepairQueue};
use crate::error::Result;
use crate::graph::{Edge, Graph, VertexKey, Weight, UNREACHABLE};
use crate::tree::{NodeId, TreeState};

/// Old weight of every edge changed since the last merge, by start and end
type PendingWeights<K> = FxHashMap<K, FxHashMap<K, Weight>>;

/// Edge weights as seen by a repair pass
///
/// Edges with a buffered change that has not been applied yet still report
/// their old weight.
pub struct WeightView<'a, K> {
    graph: &'a Graph<K>,
    unapplied: Option<&'a PendingWeights<K>>,
}

impl<'a, K: VertexKey> WeightView<'a, K> {
    /// The graph's current weights
    pub fn new(graph: &'a Graph<K>) -> Self {
        WeightView {
            graph,
            unapplied: None,
        }
    }

    fn with_unapplied(graph: &'a Graph<K>, unapplied: &'a PendingWeights<K>) -> Self {
        WeightView {
            graph,
            unapplied: Some(unapplied),
        }
    }

    fn unapplied_weight(&self, start: &K, end: &K) -> Option<Weight> {
        self.unapplied?.get(start)?.get(end).copied()
    }

    pub fn weight(&self, start: &K, end: &K) -> Option<Weight> {
        self.unapplied_weight(start, end)
            .or_else(|| self.graph.weight(start, end))
    }

    pub fn out_edges<'b>(&'b self, key: &'b K) -> impl Iterator<Item = (&'a K, Weight)> + 'b {
        self.graph.out_edges(key).map(move |(end, weight)| {
            (end, self.unapplied_weight(key, end).unwrap_or(weight))
        })
    }

    pub fn in_edges<'b>(&'b self, key: &'b K) -> impl Iterator<Item = (&'a K, Weight)> + 'b {
        self.graph.in_edges(key).map(move |(start, weight)| {
            (start, self.unapplied_weight(start, key).unwrap_or(weight))
        })
    }
}

/// Applies or buffers weight changes on behalf of one tree
#[derive(Debug)]
pub struct ShortestPathTreeUpdater<K> {
    pending: PendingWeights<K>,
}

impl<K: VertexKey> Default for ShortestPathTreeUpdater<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: VertexKey> ShortestPathTreeUpdater<K> {
    pub fn new() -> Self {
        ShortestPathTreeUpdater {
            pending: FxHashMap::default(),
        }
    }

    /// Number of directed edges with a buffered change
    pub fn pending_updates(&self) -> usize {
        self.pending.values().map(|ends| ends.len()).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    /// Repairs `state` for one changed edge, or buffers the change
    pub(crate) fn edge_changed(
        &mut self,
        state: &mut TreeState<K>,
        graph: &Graph<K>,
        immediate: bool,
        edge: &Edge<K>,
        old_weight: Weight,
    ) -> Result<()> {
        if immediate {
            return apply_change(state, graph, edge.start(), edge.end(), old_weight, edge.weight());
        }
        // Only the weight from before the first buffered change matters.
        self.pending
            .entry(edge.start().clone())
            .or_default()
            .entry(edge.end().clone())
            .or_insert(old_weight);
        trace!(start = ?edge.start(), end = ?edge.end(), old_weight, "buffered weight change");
        Ok(())
    }

    /// Merges every buffered change into `state`
    pub(crate) fn try_merge_update(&mut self, state: &mut TreeState<K>, graph: &Graph<K>) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut unapplied = std::mem::take(&mut self.pending);

        let mut decreases = Vec::new();
        let mut increases = Vec::new();
        for (start, ends) in &unapplied {
            for (end, &old_weight) in ends {
                match graph.weight(start, end) {
                    Some(weight) if weight < old_weight => {
                        decreases.push((start.clone(), end.clone()))
                    }
                    Some(weight) if weight > old_weight => {
                        increases.push((start.clone(), end.clone()))
                    }
                    _ => {}
                }
            }
        }
        debug!(
            decreases = decreases.len(),
            increases = increases.len(),
            "merging buffered weight changes"
        );

        for (start, end) in &decreases {
            if let Some(ends) = unapplied.get_mut(start) {
                ends.remove(end);
            }
            let view = WeightView::with_unapplied(graph, &unapplied);
            decrease_pass(state, &view, start, end)?;
        }

        let view = WeightView::new(graph);
        let seeds: Vec<(NodeId, NodeId)> = increases
            .iter()
            .filter_map(|(start, end)| Some((state.id_of(start)?, state.id_of(end)?)))
            .collect();
        increase_pass(state, &view, &seeds)?;
        restore_prefix(state, &view)
    }
}

fn apply_change<K: VertexKey>(
    state: &mut TreeState<K>,
    graph: &Graph<K>,
    start: &K,
    end: &K,
    old_weight: Weight,
    new_weight: Weight,
) -> Result<()> {
    if old_weight == new_weight {
        return Ok(());
    }
    let view = WeightView::new(graph);
    if new_weight > old_weight {
        let (Some(u), Some(v)) = (state.id_of(start), state.id_of(end)) else {
            return Ok(());
        };
        increase_pass(state, &view, &[(u, v)])?;
    } else {
        decrease_pass(state, &view, start, end)?;
    }
    restore_prefix(state, &view)
}

/// Bookkeeping shared by the increase and decrease passes
struct RepairPass {
    queue: RepairQueue,
    /// Nodes whose `visited` marker has to be cleared at the end
    touched: Vec<NodeId>,
}

impl RepairPass {
    fn new() -> Self {
        RepairPass {
            queue: RepairQueue::new(),
            touched: Vec::new(),
        }
    }

    /// Drops the node's reference to its best alternative
    fn release_slot<K>(&mut self, state: &mut TreeState<K>, id: NodeId) -> Result<()> {
        if let Some(candidate) = state
            .nodes
            .get_mut(id)
            .and_then(|node| node.best_alternative.take())
        {
            self.queue.release(candidate)?;
        }
        Ok(())
    }

    /// Makes `candidate` the best alternative of its target
    fn offer<K>(&mut self, state: &mut TreeState<K>, candidate: RepairCandidate) -> Result<()> {
        let target = candidate.target();
        self.release_slot(state, target)?;
        let candidate = self.queue.offer(candidate)?;
        if let Some(node) = state.nodes.get_mut(target) {
            node.best_alternative = Some(candidate);
        }
        Ok(())
    }

    fn mark_visited<K>(&mut self, state: &mut TreeState<K>, id: NodeId) {
        if let Some(node) = state.nodes.get_mut(id) {
            node.visited = true;
            self.touched.push(id);
        }
    }

    fn finish<K>(mut self, state: &mut TreeState<K>) -> Result<(usize, usize)> {
        for id in std::mem::take(&mut self.touched) {
            self.release_slot(state, id)?;
            if let Some(node) = state.nodes.get_mut(id) {
                node.visited = false;
                node.in_repair_set = false;
            }
        }
        Ok(self.queue.stats())
    }

    /// Re-attaches `target` under `source` and shifts its subtree along
    fn adopt<K: VertexKey>(
        &mut self,
        state: &mut TreeState<K>,
        view: &WeightView<'_, K>,
        source: NodeId,
        target: NodeId,
        distance: Weight,
    ) -> Result<()> {
        let old = state.distance_of(target);
        let shift = if old == UNREACHABLE { 0 } else { old - distance };
        state.set_predecessor(target, Some(source));

        let closure = state.subtree(target, |node| node.visited);
        for &id in &closure {
            let moved = if id == target {
                distance
            } else {
                state.distance_of(id).saturating_sub(shift)
            };
            self.release_slot(state, id)?;
            state.set_distance(id, moved)?;
            self.mark_visited(state, id);
        }

        for &id in &closure {
            if !state.is_live(id) {
                continue;
            }
            let reached = state.distance_of(id);
            let vertex = state.nodes[id].vertex.clone();
            for (end, weight) in view.out_edges(&vertex) {
                let next = state.node_or_insert(end);
                let node = &state.nodes[next];
                if node.visited || node.predecessor == Some(id) {
                    continue;
                }
                let improved = reached.saturating_add(weight);
                if improved >= node.distance {
                    continue;
                }
                let delta = improved - node.distance;
                if node
                    .best_alternative
                    .as_ref()
                    .is_some_and(|best| best.delta() <= delta)
                {
                    continue;
                }
                let target_distance = node.distance;
                self.offer(
                    state,
                    RepairCandidate::new(id, next, delta, target_distance, improved),
                )?;
            }
        }
        Ok(())
    }

    /// Fixes `target` at `distance` under `source`, then every repair-set
    /// node reachable from it at the same delta
    fn finalize<K: VertexKey>(
        &mut self,
        state: &mut TreeState<K>,
        view: &WeightView<'_, K>,
        baseline: &FxHashMap<NodeId, Weight>,
        target: NodeId,
        source: NodeId,
        distance: Weight,
    ) -> Result<usize> {
        let mut finalized = 0;
        let mut work = vec![(target, source, distance)];
        while let Some((id, source, distance)) = work.pop() {
            if !state.nodes[id].in_repair_set {
                continue;
            }
            self.release_slot(state, id)?;
            state.nodes[id].in_repair_set = false;
            self.mark_visited(state, id);
            state.set_predecessor(id, Some(source));
            state.set_distance(id, distance)?;
            finalized += 1;
            if !state.is_settled(id) {
                continue;
            }

            let delta = distance - baseline.get(&id).copied().unwrap_or(distance);
            let vertex = state.nodes[id].vertex.clone();
            for (end, weight) in view.out_edges(&vertex) {
                let Some(next) = state.id_of(end) else {
                    continue;
                };
                let node = &state.nodes[next];
                if !node.in_repair_set {
                    continue;
                }
                let Some(&base) = baseline.get(&next) else {
                    continue;
                };
                let reached = distance.saturating_add(weight);
                if reached == UNREACHABLE {
                    continue;
                }
                let key = reached - base;
                if key <= delta {
                    work.push((next, id, reached));
                    continue;
                }
                if node
                    .best_alternative
                    .as_ref()
                    .is_some_and(|best| best.delta() <= key)
                {
                    continue;
                }
                let target_distance = node.distance;
                self.offer(
                    state,
                    RepairCandidate::new(id, next, key, target_distance, reached),
                )?;
            }
        }
        Ok(finalized)
    }
}

/// Repairs the tree after the weights of `seeds` went up
fn increase_pass<K: VertexKey>(
    state: &mut TreeState<K>,
    view: &WeightView<'_, K>,
    seeds: &[(NodeId, NodeId)],
) -> Result<()> {
    let mut roots: Vec<(NodeId, NodeId)> = seeds
        .iter()
        .copied()
        .filter(|&(u, v)| {
            state.is_live(u) && state.nodes.get(v).is_some_and(|node| node.predecessor == Some(u))
        })
        .collect();
    if roots.is_empty() {
        return Ok(());
    }
    roots.sort_unstable();
    roots.dedup();
    let seed_edges: FxHashSet<(NodeId, NodeId)> = roots.iter().copied().collect();

    for &(_, v) in &roots {
        for id in state.subtree(v, |node| node.in_repair_set) {
            state.nodes[id].in_repair_set = true;
        }
    }
    // Parents before children, starting from the topmost increased edges.
    let mut order = Vec::new();
    for &(u, v) in &roots {
        if !state.nodes[u].in_repair_set {
            order.extend(state.subtree(v, |node| !node.in_repair_set));
        }
    }
    let baseline: FxHashMap<NodeId, Weight> = order
        .iter()
        .map(|&id| (id, state.distance_of(id)))
        .collect();

    for &id in &order {
        let bumped = match state.nodes[id].predecessor {
            Some(pred) => {
                let weight = view
                    .weight(&state.nodes[pred].vertex, &state.nodes[id].vertex)
                    .unwrap_or(UNREACHABLE);
                state.distance_of(pred).saturating_add(weight)
            }
            None => UNREACHABLE,
        };
        state.set_distance(id, bumped)?;
    }

    let mut pass = RepairPass::new();
    for &id in &order {
        let base = baseline[&id];
        let vertex = state.nodes[id].vertex.clone();
        let mut own: Option<(Weight, NodeId, Weight)> = None;
        for (start, weight) in view.in_edges(&vertex) {
            let Some(source) = state.id_of(start) else {
                continue;
            };
            if !state.is_live(source) || state.nodes[source].in_repair_set {
                continue;
            }
            let reached = state.distance_of(source).saturating_add(weight);
            if reached == UNREACHABLE {
                continue;
            }
            let delta = reached - base;
            if own.map_or(true, |(best, _, _)| delta < best) {
                own = Some((delta, source, reached));
            }
        }

        let inherited = match state.nodes[id].predecessor {
            Some(pred) if state.nodes[pred].in_repair_set && !seed_edges.contains(&(pred, id)) => {
                state.nodes[pred].best_alternative.clone()
            }
            _ => None,
        };
        match (inherited, own) {
            (Some(shared), own) if own.map_or(true, |(delta, _, _)| delta >= shared.delta()) => {
                state.nodes[id].best_alternative = Some(RepairQueue::retain(&shared));
            }
            (_, Some((delta, source, reached))) => {
                let target_distance = state.distance_of(id);
                pass.offer(
                    state,
                    RepairCandidate::new(source, id, delta, target_distance, reached),
                )?;
            }
            _ => {}
        }
    }

    let mut finalized = 0;
    while let Some(candidate) = pass.queue.poll() {
        let target = candidate.target();
        if !state.nodes[target].in_repair_set {
            continue;
        }
        finalized += pass.finalize(
            state,
            view,
            &baseline,
            target,
            candidate.source(),
            candidate.distance(),
        )?;
    }

    // Whatever the drain did not reach keeps its optimistic distance.
    let mut leftover = 0;
    for &id in &order {
        if !state.nodes[id].in_repair_set {
            continue;
        }
        pass.release_slot(state, id)?;
        state.nodes[id].in_repair_set = false;
        if state.distance_of(id) == UNREACHABLE {
            state.set_predecessor(id, None);
        }
        leftover += 1;
    }

    let (offered, polled) = pass.finish(state)?;
    debug!(
        seeds = roots.len(),
        repair_set = order.len(),
        offered,
        polled,
        finalized,
        leftover,
        "increase pass done"
    );
    Ok(())
}

/// Repairs the tree after the weight of `start -> end` went down
fn decrease_pass<K: VertexKey>(
    state: &mut TreeState<K>,
    view: &WeightView<'_, K>,
    start: &K,
    end: &K,
) -> Result<()> {
    let Some(u) = state.id_of(start) else {
        return Ok(());
    };
    if !state.is_live(u) {
        return Ok(());
    }
    let Some(weight) = view.weight(start, end) else {
        return Ok(());
    };
    let reached = state.distance_of(u).saturating_add(weight);
    let v = state.node_or_insert(end);
    if reached >= state.distance_of(v) {
        return Ok(());
    }

    let mut pass = RepairPass::new();
    pass.adopt(state, view, u, v, reached)?;
    while let Some(candidate) = pass.queue.poll() {
        let target = candidate.target();
        if state.nodes.get(target).map_or(true, |node| node.visited) {
            continue;
        }
        pass.adopt(state, view, candidate.source(), target, candidate.distance())?;
    }
    let improved = pass.touched.len();
    let (offered, polled) = pass.finish(state)?;
    debug!(
        start = ?start,
        end = ?end,
        improved,
        offered,
        polled,
        "decrease pass done"
    );
    Ok(())
}

/// Unsettles every settled node beyond the frontier minimum and re-derives
/// the tentative distances that depended on them
fn restore_prefix<K: VertexKey>(state: &mut TreeState<K>, view: &WeightView<'_, K>) -> Result<()> {
    if state.complete {
        return Ok(());
    }
    let Some(bound) = state.frontier_min() else {
        return Ok(());
    };
    let overshoot = state.settled_beyond(bound);
    if overshoot.is_empty() {
        return Ok(());
    }
    for &id in &overshoot {
        state.unsettle(id);
    }

    let mut seen = FxHashSet::default();
    let mut affected = Vec::new();
    for &id in &overshoot {
        if seen.insert(id) {
            affected.push(id);
        }
        for &child in &state.nodes[id].successors {
            if seen.insert(child) {
                affected.push(child);
            }
        }
    }

    for &id in &affected {
        let vertex = state.nodes[id].vertex.clone();
        let mut best: Option<(Weight, NodeId)> = None;
        for (start, weight) in view.in_edges(&vertex) {
            let Some(source) = state.id_of(start) else {
                continue;
            };
            if !state.is_live(source) {
                continue;
            }
            let reached = state.distance_of(source).saturating_add(weight);
            if reached != UNREACHABLE && best.map_or(true, |(current, _)| reached < current) {
                best = Some((reached, source));
            }
        }
        match best {
            Some((distance, source)) => {
                state.set_predecessor(id, Some(source));
                state.set_distance(id, distance)?;
            }
            None => {
                state.set_predecessor(id, None);
                state.set_distance(id, UNREACHABLE)?;
            }
        }
    }
    debug!(
        bound,
        unsettled = overshoot.len(),
        recomputed = affected.len(),
        "restored settled prefix"
    );
    Ok(())
}
