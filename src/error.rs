//! Error types for the graph and shortest-path-tree layer

use thiserror::Error;

use crate::graph::Weight;
use crate::traits::HeapError;

/// Result type for graph and tree operations
pub type Result<T> = std::result::Result<T, SptError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SptError {
    /// Dijkstra-based repair is only sound for non-negative weights
    #[error("negative edge weight {weight} on {edge}")]
    NegativeWeight { edge: String, weight: Weight },

    /// An immediate change reached a partial tree whose scope forbids it
    #[error("tree is still partial but its repair scope only allows complete trees")]
    PartialTree,

    #[error("tree was built from a different graph")]
    ForeignGraph,

    /// A listener was already borrowed when the graph tried to notify it
    #[error("listener is busy and cannot be notified")]
    ListenerBusy,

    #[error(transparent)]
    Heap(#[from] HeapError),
}

impl SptError {
    pub(crate) fn negative_weight<K: std::fmt::Debug>(start: &K, end: &K, weight: Weight) -> Self {
        SptError::NegativeWeight {
            edge: format!("{:?} -> {:?}", start, end),
            weight,
        }
    }
}
