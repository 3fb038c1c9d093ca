//! Repair candidates and the short-lived queue that ranks them
//!
//! A [`RepairCandidate`] proposes attaching `target` under `source`. While a
//! repair pass runs, a tree node may point at the best candidate known for it
//! through a shared, reference-counted slot; several nodes of one subtree can
//! share their ancestor's candidate. [`RepairQueue::release`] drops one
//! reference and evicts the candidate from the queue once nobody points at it.

use std::cell::Cell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::aware::{AwareFibonacciHeap, HeapAware};
use crate::facade::{FiboHeap, HeapKey};
use crate::fibonacci::FibHandle;
use crate::graph::Weight;
use crate::traits::HeapError;
use crate::tree::NodeId;

/// Proposed re-attachment of `target` under `source`
#[derive(Debug)]
pub struct RepairCandidate {
    source: NodeId,
    target: NodeId,
    /// Change of the target's distance this candidate produces, measured
    /// against the distance the target had when the pass started
    delta: Weight,
    /// Target distance at the time the candidate was offered; breaks ties
    target_distance: Weight,
    /// Distance the target gets when the candidate is applied
    distance: Weight,
    refs: Cell<u32>,
    slot: Cell<Option<FibHandle>>,
}

impl RepairCandidate {
    pub fn new(
        source: NodeId,
        target: NodeId,
        delta: Weight,
        target_distance: Weight,
        distance: Weight,
    ) -> Self {
        RepairCandidate {
            source,
            target,
            delta,
            target_distance,
            distance,
            refs: Cell::new(0),
            slot: Cell::new(None),
        }
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn delta(&self) -> Weight {
        self.delta
    }

    pub fn distance(&self) -> Weight {
        self.distance
    }

    /// Number of tree nodes currently pointing at this candidate
    pub fn refs(&self) -> u32 {
        self.refs.get()
    }

    fn rank(&self) -> (Weight, Weight) {
        (self.delta, self.target_distance)
    }
}

impl PartialEq for RepairCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl PartialOrd for RepairCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.rank().cmp(&other.rank()))
    }
}

impl HeapAware for RepairCandidate {
    fn heap_handle(&self) -> Option<FibHandle> {
        self.slot.get()
    }

    fn set_heap_handle(&self, handle: Option<FibHandle>) {
        self.slot.set(handle)
    }
}

impl HeapKey for Rc<RepairCandidate> {
    type Heap = AwareFibonacciHeap<Rc<RepairCandidate>>;
}

/// Priority queue of repair candidates, cheapest delta first
#[derive(Debug, Default)]
pub struct RepairQueue {
    heap: FiboHeap<Rc<RepairCandidate>>,
    offered: usize,
    polled: usize,
}

impl RepairQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Queues `candidate` and returns the first reference to it
    pub fn offer(&mut self, candidate: RepairCandidate) -> Result<Rc<RepairCandidate>, HeapError> {
        let candidate = Rc::new(candidate);
        candidate.refs.set(1);
        self.heap.insert(Rc::clone(&candidate))?;
        self.offered += 1;
        Ok(candidate)
    }

    /// Takes the cheapest candidate out of the queue
    ///
    /// References held by tree nodes stay valid; they still have to be
    /// released.
    pub fn poll(&mut self) -> Option<Rc<RepairCandidate>> {
        let candidate = self.heap.extract_min()?;
        self.polled += 1;
        Some(candidate)
    }

    /// Adds a reference to a candidate already held elsewhere
    pub fn retain(candidate: &Rc<RepairCandidate>) -> Rc<RepairCandidate> {
        candidate.refs.set(candidate.refs.get() + 1);
        Rc::clone(candidate)
    }

    /// Drops one reference; the last one evicts the candidate if queued
    pub fn release(&mut self, candidate: Rc<RepairCandidate>) -> Result<(), HeapError> {
        let refs = candidate.refs.get().saturating_sub(1);
        candidate.refs.set(refs);
        if refs == 0 {
            candidate.remove_from(&mut self.heap)?;
        }
        Ok(())
    }

    /// `(offered, polled)` counts since construction
    pub fn stats(&self) -> (usize, usize) {
        (self.offered, self.polled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<NodeId> {
        let mut map: SlotMap<NodeId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    #[test]
    fn test_orders_by_delta_then_target_distance() {
        let n = ids(3);
        let mut queue = RepairQueue::new();
        let _a = queue.offer(RepairCandidate::new(n[0], n[1], 4, 10, 14)).unwrap();
        let _b = queue.offer(RepairCandidate::new(n[0], n[2], 2, 20, 22)).unwrap();
        let _c = queue.offer(RepairCandidate::new(n[1], n[2], 2, 7, 9)).unwrap();

        let order: Vec<(Weight, Weight)> = std::iter::from_fn(|| queue.poll())
            .map(|c| (c.delta(), c.distance()))
            .collect();
        assert_eq!(order, vec![(2, 9), (2, 22), (4, 14)]);
        assert_eq!(queue.stats(), (3, 3));
    }

    #[test]
    fn test_negative_deltas_come_first() {
        let n = ids(2);
        let mut queue = RepairQueue::new();
        let _a = queue.offer(RepairCandidate::new(n[0], n[1], 0, 5, 5)).unwrap();
        let _b = queue.offer(RepairCandidate::new(n[1], n[0], -3, 8, 5)).unwrap();
        assert_eq!(queue.poll().map(|c| c.delta()), Some(-3));
    }

    // ========================================================================
    // Reference counting
    // ========================================================================

    #[test]
    fn test_release_evicts_at_zero() {
        let n = ids(2);
        let mut queue = RepairQueue::new();
        let first = queue.offer(RepairCandidate::new(n[0], n[1], 1, 1, 2)).unwrap();
        let second = RepairQueue::retain(&first);
        assert_eq!(first.refs(), 2);

        queue.release(second).unwrap();
        assert_eq!(queue.len(), 1);
        assert!(first.in_heap());

        queue.release(Rc::clone(&first)).unwrap();
        assert!(queue.is_empty());
        assert!(!first.in_heap());
        assert_eq!(first.refs(), 0);
    }

    #[test]
    fn test_release_after_poll_is_harmless() {
        let n = ids(2);
        let mut queue = RepairQueue::new();
        let held = queue.offer(RepairCandidate::new(n[0], n[1], 1, 1, 2)).unwrap();
        let polled = queue.poll().unwrap();
        assert!(Rc::ptr_eq(&held, &polled));
        assert!(!held.in_heap());

        queue.release(held).unwrap();
        assert!(queue.is_empty());
    }
}
