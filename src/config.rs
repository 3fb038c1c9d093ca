//! Per-tree configuration

/// Which tree states an immediate (non-batched) change may repair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairScope {
    /// Complete trees and partial trees alike
    #[default]
    Any,
    /// Only complete trees; a change reaching a partial tree is an error
    CompleteOnly,
}

/// Configuration of a [`ShortestPathTree`](crate::tree::ShortestPathTree)
///
/// Built in fluent style:
///
/// ```rust
/// use rust_dynamic_spt::config::{RepairScope, TreeConfig};
///
/// let config = TreeConfig::new()
///     .batch_updates(false)
///     .repair_scope(RepairScope::CompleteOnly)
///     .eager(true);
/// assert!(!config.batches_updates());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    batch_updates: bool,
    repair_scope: RepairScope,
    eager: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            batch_updates: true,
            repair_scope: RepairScope::Any,
            eager: false,
        }
    }
}

impl TreeConfig {
    /// Default configuration: batched updates, lazy completion
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers weight changes and merges them before the next read.
    pub fn batch_updates(mut self, enabled: bool) -> Self {
        self.batch_updates = enabled;
        self
    }

    /// Restricts which tree states immediate changes may repair.
    pub fn repair_scope(mut self, scope: RepairScope) -> Self {
        self.repair_scope = scope;
        self
    }

    /// Completes the whole tree up front instead of on demand.
    pub fn eager(mut self, enabled: bool) -> Self {
        self.eager = enabled;
        self
    }

    pub fn batches_updates(&self) -> bool {
        self.batch_updates
    }

    pub fn scope(&self) -> RepairScope {
        self.repair_scope
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }
}
