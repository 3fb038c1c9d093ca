//! Dynamic Shortest-Path Trees over a Fibonacci Heap
//!
//! This crate maintains single-source shortest-path trees over a weighted
//! graph whose edge weights change over time. Instead of recomputing a tree
//! after each change, the affected part of the tree is repaired in place.
//!
//! # Features
//!
//! - **Fibonacci Heap**: O(1) amortized insert, decrease_key and union; O(log n) amortized
//!   extract-min, increase_key and delete; a cached second minimum lets some
//!   extractions skip consolidation
//! - **Key-aware heap**: keys remember their own handle and can reorder themselves
//!   after their priority changed in place
//! - **Heap facade**: [`FiboHeap`] picks the right variant from the key type
//! - **Lazy shortest-path tree**: a resumable Dijkstra that settles only as much of
//!   the tree as queries need
//! - **Incremental repair**: edge weight increases and decreases are repaired in
//!   place, immediately or batched until the next read, on complete and partial trees
//!
//! # Example
//!
//! ```rust
//! use rust_dynamic_spt::{Graph, ShortestPathTreeCache, TreeConfig};
//!
//! let graph = Graph::from_edges([("a", "b", 5), ("a", "c", 10), ("c", "b", 2)], true);
//! let mut cache = ShortestPathTreeCache::new(graph, TreeConfig::new());
//!
//! assert_eq!(cache.distance(&"a", &"b").unwrap(), 5);
//! cache.update_weight(&"a", &"b", 20).unwrap();
//! assert_eq!(cache.distance(&"a", &"b").unwrap(), 12);
//! assert_eq!(cache.previous(&"a", &"b").unwrap(), Some("c"));
//! ```

pub mod aware;
pub mod cache;
pub mod candidate;
pub mod config;
pub mod error;
pub mod facade;
pub mod fibonacci;
pub mod graph;
pub mod traits;
pub mod tree;
pub mod updater;

// Re-export the main types for convenience
pub use cache::ShortestPathTreeCache;
pub use config::{RepairScope, TreeConfig};
pub use error::{Result, SptError};
pub use facade::{FiboHeap, HeapKey};
pub use fibonacci::{FibHandle, FibonacciHeap};
pub use graph::{Edge, EdgeListener, Graph, ListenerId, Vertex, Weight, UNREACHABLE};
pub use traits::{Heap, HeapError};
pub use tree::ShortestPathTree;
