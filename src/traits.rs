//! Common traits for the heap layer
//!
//! This module provides the pieces shared by every heap variant in the crate:
//!
//! - [`HeapError`]: failures reported by handle-based operations
//! - [`Handle`]: marker for opaque element handles
//! - [`KeyOrder`]: the comparator capability a heap is parameterized over
//! - [`Heap`]: the uniform queue surface implemented by the core heap, the
//!   key-aware adapter, and the facade
//!
//! Keys carry their own ordering (there is no separate priority/item pair),
//! because the shortest-path engine orders entries by state that lives in
//! the key itself.

use std::cmp::Ordering;

use thiserror::Error;

use crate::fibonacci::FibHandle;

/// Error type for heap operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// The new key is greater than the current key
    #[error("new key is greater than the current key")]
    PriorityNotDecreased,
    /// The new key is less than the current key
    #[error("new key is less than the current key")]
    PriorityNotIncreased,
    /// The handle is no longer valid (element was removed, or it belongs to another heap)
    #[error("handle is no longer valid (element was removed)")]
    InvalidHandle,
    /// The comparator could not order two keys
    #[error("keys are not mutually comparable")]
    Incomparable,
    /// The heap was structurally modified while a cursor was open
    #[error("heap was modified during iteration")]
    ConcurrentModification,
}

/// A handle to an element in the heap, used for key updates and deletion
///
/// This is an opaque type that identifies a specific element in the heap.
pub trait Handle: Clone + PartialEq + Eq {}

/// Comparator capability over keys
///
/// Returning `None` means the two keys cannot be ordered; the heap reports
/// [`HeapError::Incomparable`] for such keys instead of guessing.
///
/// Any `Fn(&K, &K) -> Option<Ordering>` closure is a `KeyOrder`:
///
/// ```rust
/// use rust_dynamic_spt::fibonacci::FibonacciHeap;
/// use rust_dynamic_spt::Heap;
///
/// // max-heap over u32
/// let mut heap = FibonacciHeap::with_order(|a: &u32, b: &u32| b.partial_cmp(a));
/// heap.insert(1).unwrap();
/// heap.insert(7).unwrap();
/// assert_eq!(heap.extract_min(), Some(7));
/// ```
pub trait KeyOrder<K: ?Sized> {
    /// Compares two keys
    fn compare(&self, a: &K, b: &K) -> Option<Ordering>;
}

/// Ordering taken from the key's own `PartialOrd` implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: PartialOrd + ?Sized> KeyOrder<K> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Option<Ordering> {
        a.partial_cmp(b)
    }
}

impl<K: ?Sized, F> KeyOrder<K> for F
where
    F: Fn(&K, &K) -> Option<Ordering>,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Option<Ordering> {
        self(a, b)
    }
}

/// Uniform queue surface for heap variants
///
/// The core [`FibonacciHeap`](crate::fibonacci::FibonacciHeap), the
/// [`AwareFibonacciHeap`](crate::aware::AwareFibonacciHeap) adapter and the
/// [`FiboHeap`](crate::facade::FiboHeap) facade all implement this trait, so
/// callers can be written once against any of them.
///
/// # Example
///
/// ```rust
/// use rust_dynamic_spt::{FiboHeap, Heap};
///
/// let mut heap: FiboHeap<i32> = FiboHeap::new();
/// heap.insert(3).unwrap();
/// heap.insert(1).unwrap();
/// heap.insert(2).unwrap();
///
/// assert_eq!(heap.peek_min(), Some(&1));
/// assert_eq!(heap.extract_min(), Some(1));
/// ```
pub trait Heap<K> {
    /// Returns true if the heap is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of elements in the heap
    fn len(&self) -> usize;

    /// Inserts a key, returning a handle to it
    ///
    /// The key is compared against the current minimum before any link is
    /// touched, so an incomparable key leaves the heap unchanged.
    ///
    /// # Time Complexity
    /// O(1)
    fn insert(&mut self, key: K) -> Result<FibHandle, HeapError>;

    /// Returns the minimum key without removing it
    ///
    /// # Time Complexity
    /// O(1)
    fn peek_min(&self) -> Option<&K>;

    /// Removes and returns the minimum key
    ///
    /// # Time Complexity
    /// O(log n) amortized, O(1) when the cached second minimum is still valid
    fn extract_min(&mut self) -> Option<K>;

    /// Removes the key behind `handle` and returns it
    ///
    /// # Time Complexity
    /// O(log n) amortized
    fn delete(&mut self, handle: FibHandle) -> Result<K, HeapError>;

    /// Moves every key of `other` into this heap, leaving `other` empty
    ///
    /// Handles issued by `other` stay valid and now refer into `self`.
    ///
    /// # Time Complexity
    /// O(1), independent of how many keys move
    fn union(&mut self, other: &mut Self) -> Result<(), HeapError>
    where
        Self: Sized;

    /// Replaces the key behind `handle`, moving it up or down as needed
    fn update_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError>;

    /// Restores heap order after the key behind `handle` became smaller
    /// through interior mutability
    fn sift_decreased(&mut self, handle: FibHandle) -> Result<(), HeapError>;

    /// Restores heap order after the key behind `handle` became larger
    /// through interior mutability
    fn sift_increased(&mut self, handle: FibHandle) -> Result<(), HeapError>;

    /// Removes every key
    fn clear(&mut self);
}
