//! Key-aware adapter over [`FibonacciHeap`]
//!
//! Keys that implement [`HeapAware`] are told their handle whenever their
//! membership changes: on insert, and (cleared) on extraction or deletion.
//! Handles survive a union, so absorbed keys keep theirs. Such a key can then reorder itself with
//! [`HeapAware::decrease_key`] / [`HeapAware::increase_key`] without the caller
//! keeping any handle around.
//!
//! Because a key moves into the heap on insert, self-aware keys are shared
//! pointers (typically `Rc<T>` with interior mutability): the caller keeps one
//! clone, the heap owns another.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use rust_dynamic_spt::aware::{AwareFibonacciHeap, HeapAware};
//! use rust_dynamic_spt::fibonacci::FibHandle;
//!
//! #[derive(Debug)]
//! struct Task {
//!     cost: Cell<u32>,
//!     slot: Cell<Option<FibHandle>>,
//! }
//!
//! impl PartialEq for Task {
//!     fn eq(&self, other: &Self) -> bool {
//!         self.cost.get() == other.cost.get()
//!     }
//! }
//!
//! impl PartialOrd for Task {
//!     fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
//!         self.cost.get().partial_cmp(&other.cost.get())
//!     }
//! }
//!
//! impl HeapAware for Task {
//!     fn heap_handle(&self) -> Option<FibHandle> {
//!         self.slot.get()
//!     }
//!     fn set_heap_handle(&self, handle: Option<FibHandle>) {
//!         self.slot.set(handle);
//!     }
//! }
//!
//! let mut heap = AwareFibonacciHeap::new();
//! let slow = Rc::new(Task { cost: Cell::new(10), slot: Cell::new(None) });
//! heap.insert(Rc::new(Task { cost: Cell::new(5), slot: Cell::new(None) })).unwrap();
//! heap.insert(Rc::clone(&slow)).unwrap();
//!
//! slow.cost.set(1);
//! slow.decrease_key(&mut heap).unwrap();
//! assert_eq!(heap.extract_min().map(|t| t.cost.get()), Some(1));
//! assert!(!slow.in_heap());
//! ```

use std::fmt;
use std::rc::Rc;

use crate::fibonacci::{FibHandle, FibonacciHeap, Iter};
use crate::traits::{Heap, HeapError, KeyOrder, NaturalOrder};

/// Capability of a key to remember its own heap membership
///
/// Implementations store the handle (which also identifies the heap) in a
/// `Cell` or similar; the adapter is the only writer.
pub trait HeapAware {
    /// Current handle, or `None` when the key is in no heap
    fn heap_handle(&self) -> Option<FibHandle>;

    fn set_heap_handle(&self, handle: Option<FibHandle>);

    fn in_heap(&self) -> bool {
        self.heap_handle().is_some()
    }

    /// Restores order in `heap` after this key became smaller
    ///
    /// A key that is in no heap ignores the call.
    fn decrease_key<H: Heap<Self>>(&self, heap: &mut H) -> Result<(), HeapError>
    where
        Self: Sized,
    {
        match self.heap_handle() {
            Some(handle) => heap.sift_decreased(handle),
            None => Ok(()),
        }
    }

    /// Restores order in `heap` after this key became larger
    ///
    /// A key that is in no heap ignores the call.
    fn increase_key<H: Heap<Self>>(&self, heap: &mut H) -> Result<(), HeapError>
    where
        Self: Sized,
    {
        match self.heap_handle() {
            Some(handle) => heap.sift_increased(handle),
            None => Ok(()),
        }
    }

    /// Deletes this key from `heap`, returning the heap's copy of it
    fn remove_from<H: Heap<Self>>(&self, heap: &mut H) -> Result<Option<Self>, HeapError>
    where
        Self: Sized,
    {
        match self.heap_handle() {
            Some(handle) => heap.delete(handle).map(Some),
            None => Ok(None),
        }
    }
}

impl<T: HeapAware + ?Sized> HeapAware for Rc<T> {
    fn heap_handle(&self) -> Option<FibHandle> {
        (**self).heap_handle()
    }

    fn set_heap_handle(&self, handle: Option<FibHandle>) {
        (**self).set_heap_handle(handle)
    }
}

/// [`FibonacciHeap`] that keeps its keys informed of their handles
pub struct AwareFibonacciHeap<K: HeapAware, C = NaturalOrder> {
    core: FibonacciHeap<K, C>,
}

impl<K: HeapAware> AwareFibonacciHeap<K, NaturalOrder> {
    pub fn new() -> Self {
        Self {
            core: FibonacciHeap::new(),
        }
    }
}

impl<K: HeapAware, C: Default> Default for AwareFibonacciHeap<K, C> {
    fn default() -> Self {
        Self {
            core: FibonacciHeap::default(),
        }
    }
}

impl<K: HeapAware, C> AwareFibonacciHeap<K, C> {
    pub fn with_order(order: C) -> Self {
        Self {
            core: FibonacciHeap::with_order(order),
        }
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }

    pub fn peek_min(&self) -> Option<&K> {
        self.core.peek_min()
    }

    pub fn get(&self, handle: FibHandle) -> Option<&K> {
        self.core.get(handle)
    }

    pub fn iter(&self) -> Iter<'_, K, C> {
        self.core.iter()
    }

    /// The wrapped core heap
    pub fn core(&self) -> &FibonacciHeap<K, C> {
        &self.core
    }

    pub fn clear(&mut self) {
        for key in self.core.iter() {
            key.set_heap_handle(None);
        }
        self.core.clear();
    }
}

impl<K: HeapAware, C: KeyOrder<K>> AwareFibonacciHeap<K, C> {
    pub fn insert(&mut self, key: K) -> Result<FibHandle, HeapError> {
        let handle = self.core.insert(key)?;
        if let Some(key) = self.core.get(handle) {
            key.set_heap_handle(Some(handle));
        }
        Ok(handle)
    }

    pub fn extract_min(&mut self) -> Option<K> {
        let key = self.core.extract_min()?;
        key.set_heap_handle(None);
        Some(key)
    }

    pub fn delete(&mut self, handle: FibHandle) -> Result<K, HeapError> {
        let key = self.core.delete(handle)?;
        key.set_heap_handle(None);
        Ok(key)
    }

    /// Absorbs `other`; the moved keys' handles stay as they are
    pub fn union(&mut self, other: &mut Self) -> Result<(), HeapError> {
        self.core.union(&mut other.core)
    }

    pub fn decrease_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        self.core.decrease_key(handle, key)?;
        self.rebind(handle);
        Ok(())
    }

    pub fn increase_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        self.core.increase_key(handle, key)?;
        self.rebind(handle);
        Ok(())
    }

    pub fn update_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        self.core.update_key(handle, key)?;
        self.rebind(handle);
        Ok(())
    }

    pub fn sift_decreased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        self.core.sift_decreased(handle)
    }

    pub fn sift_increased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        self.core.sift_increased(handle)
    }

    /// A replacement key has to learn the handle of the entry it now occupies
    fn rebind(&self, handle: FibHandle) {
        if let Some(key) = self.core.get(handle) {
            key.set_heap_handle(Some(handle));
        }
    }
}

impl<K: HeapAware + fmt::Debug, C> AwareFibonacciHeap<K, C> {
    pub fn render_forest(&self) -> String {
        self.core.render_forest()
    }
}

impl<K: HeapAware, C> Drop for AwareFibonacciHeap<K, C> {
    fn drop(&mut self) {
        // Clones held outside the heap must not keep a dangling membership.
        for key in self.core.iter() {
            key.set_heap_handle(None);
        }
    }
}

impl<K: HeapAware + fmt::Debug, C> fmt::Debug for AwareFibonacciHeap<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwareFibonacciHeap")
            .field("core", &self.core)
            .finish()
    }
}

impl<K: HeapAware, C: KeyOrder<K>> Heap<K> for AwareFibonacciHeap<K, C> {
    fn len(&self) -> usize {
        self.core.len()
    }

    fn insert(&mut self, key: K) -> Result<FibHandle, HeapError> {
        AwareFibonacciHeap::insert(self, key)
    }

    fn peek_min(&self) -> Option<&K> {
        self.core.peek_min()
    }

    fn extract_min(&mut self) -> Option<K> {
        AwareFibonacciHeap::extract_min(self)
    }

    fn delete(&mut self, handle: FibHandle) -> Result<K, HeapError> {
        AwareFibonacciHeap::delete(self, handle)
    }

    fn union(&mut self, other: &mut Self) -> Result<(), HeapError> {
        AwareFibonacciHeap::union(self, other)
    }

    fn update_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        AwareFibonacciHeap::update_key(self, handle, key)
    }

    fn sift_decreased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        self.core.sift_decreased(handle)
    }

    fn sift_increased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        self.core.sift_increased(handle)
    }

    fn clear(&mut self) {
        AwareFibonacciHeap::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::cmp::Ordering;

    #[derive(Debug)]
    struct Counter {
        value: Cell<i64>,
        slot: Cell<Option<FibHandle>>,
    }

    impl Counter {
        fn shared(value: i64) -> Rc<Self> {
            Rc::new(Counter {
                value: Cell::new(value),
                slot: Cell::new(None),
            })
        }
    }

    impl PartialEq for Counter {
        fn eq(&self, other: &Self) -> bool {
            self.value.get() == other.value.get()
        }
    }

    impl PartialOrd for Counter {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            self.value.get().partial_cmp(&other.value.get())
        }
    }

    impl HeapAware for Counter {
        fn heap_handle(&self) -> Option<FibHandle> {
            self.slot.get()
        }

        fn set_heap_handle(&self, handle: Option<FibHandle>) {
            self.slot.set(handle);
        }
    }

    fn values(heap: &mut AwareFibonacciHeap<Rc<Counter>>) -> Vec<i64> {
        std::iter::from_fn(|| heap.extract_min().map(|c| c.value.get())).collect()
    }

    #[test]
    fn test_insert_binds_and_extract_unbinds() {
        let mut heap = AwareFibonacciHeap::new();
        let a = Counter::shared(3);
        let b = Counter::shared(1);
        let ha = heap.insert(Rc::clone(&a)).unwrap();
        heap.insert(Rc::clone(&b)).unwrap();

        assert_eq!(a.heap_handle(), Some(ha));
        assert!(b.in_heap());

        let min = heap.extract_min().unwrap();
        assert!(Rc::ptr_eq(&min, &b));
        assert!(!b.in_heap());
        assert!(a.in_heap());
    }

    #[test]
    fn test_key_reorders_itself() {
        let mut heap = AwareFibonacciHeap::new();
        let keys: Vec<_> = (0..20).map(|v| Counter::shared(v * 10)).collect();
        for key in &keys {
            heap.insert(Rc::clone(key)).unwrap();
        }
        assert_eq!(heap.extract_min().map(|c| c.value.get()), Some(0));

        keys[15].value.set(-1);
        keys[15].decrease_key(&mut heap).unwrap();
        keys[1].value.set(1000);
        keys[1].increase_key(&mut heap).unwrap();

        let out = values(&mut heap);
        assert_eq!(out.first(), Some(&-1));
        assert_eq!(out.last(), Some(&1000));
        let mut sorted = out.clone();
        sorted.sort_unstable();
        assert_eq!(out, sorted);
    }

    #[test]
    fn test_key_outside_heap_ignores_requests() {
        let mut heap: AwareFibonacciHeap<Rc<Counter>> = AwareFibonacciHeap::new();
        let loose = Counter::shared(4);
        assert_eq!(loose.decrease_key(&mut heap), Ok(()));
        assert_eq!(loose.remove_from(&mut heap), Ok(None));
    }

    #[test]
    fn test_remove_from_deletes_and_unbinds() {
        let mut heap = AwareFibonacciHeap::new();
        let a = Counter::shared(2);
        let b = Counter::shared(5);
        heap.insert(Rc::clone(&a)).unwrap();
        heap.insert(Rc::clone(&b)).unwrap();

        let removed = b.remove_from(&mut heap).unwrap();
        assert!(removed.is_some_and(|r| Rc::ptr_eq(&r, &b)));
        assert!(!b.in_heap());
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_union_keeps_absorbed_keys_bound() {
        let mut a = AwareFibonacciHeap::new();
        let mut b = AwareFibonacciHeap::new();
        a.insert(Counter::shared(10)).unwrap();
        let moved = Counter::shared(20);
        b.insert(Rc::clone(&moved)).unwrap();

        let before = moved.heap_handle();
        a.union(&mut b).unwrap();
        assert_eq!(moved.heap_handle(), before);
        assert!(before.is_some_and(|h| a.core().contains(h) && !b.core().contains(h)));

        moved.value.set(1);
        moved.decrease_key(&mut a).unwrap();
        assert_eq!(values(&mut a), vec![1, 10]);
    }

    #[test]
    fn test_drop_and_clear_unbind() {
        let kept = Counter::shared(1);
        {
            let mut heap = AwareFibonacciHeap::new();
            heap.insert(Rc::clone(&kept)).unwrap();
            assert!(kept.in_heap());
        }
        assert!(!kept.in_heap());

        let mut heap = AwareFibonacciHeap::new();
        heap.insert(Rc::clone(&kept)).unwrap();
        heap.clear();
        assert!(!kept.in_heap());
        assert!(heap.is_empty());
    }
}
