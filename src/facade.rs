//! Single entry point over the two heap variants
//!
//! [`FiboHeap<K>`] picks its implementation from the key type: every key type
//! names its heap through [`HeapKey`]. Plain keys (numbers, strings, tuples,
//! `Reverse<T>`) get the bare [`FibonacciHeap`]; key types that implement
//! [`HeapAware`](crate::aware::HeapAware) declare
//! [`AwareFibonacciHeap`](crate::aware::AwareFibonacciHeap) instead. Callers
//! only see the [`Heap`] surface.
//!
//! ```rust
//! use std::cmp::Reverse;
//! use rust_dynamic_spt::FiboHeap;
//!
//! let mut heap: FiboHeap<Reverse<u8>> = FiboHeap::new();
//! heap.insert(Reverse(1)).unwrap();
//! heap.insert(Reverse(9)).unwrap();
//! assert_eq!(heap.extract_min(), Some(Reverse(9)));
//! ```

use std::cmp::Reverse;
use std::fmt;

use crate::fibonacci::{FibHandle, FibonacciHeap};
use crate::traits::{Heap, HeapError};

/// Selects the heap variant used for a key type
///
/// Self-aware keys implement this with
/// `type Heap = AwareFibonacciHeap<Self>;`
pub trait HeapKey: Sized {
    type Heap: Heap<Self> + Default;
}

macro_rules! plain_heap_key {
    ($($t:ty),* $(,)?) => {
        $(
            impl HeapKey for $t {
                type Heap = FibonacciHeap<$t>;
            }
        )*
    };
}

plain_heap_key!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, char, bool, String,
);

impl HeapKey for &'static str {
    type Heap = FibonacciHeap<&'static str>;
}

impl<T: PartialOrd> HeapKey for Reverse<T> {
    type Heap = FibonacciHeap<Reverse<T>>;
}

impl<A: PartialOrd, B: PartialOrd> HeapKey for (A, B) {
    type Heap = FibonacciHeap<(A, B)>;
}

impl<A: PartialOrd, B: PartialOrd, C: PartialOrd> HeapKey for (A, B, C) {
    type Heap = FibonacciHeap<(A, B, C)>;
}

/// Priority queue whose variant is chosen by the key type
pub struct FiboHeap<K: HeapKey> {
    inner: K::Heap,
}

impl<K: HeapKey> FiboHeap<K> {
    pub fn new() -> Self {
        Self {
            inner: K::Heap::default(),
        }
    }

    /// The selected heap variant
    pub fn inner(&self) -> &K::Heap {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn insert(&mut self, key: K) -> Result<FibHandle, HeapError> {
        self.inner.insert(key)
    }

    pub fn peek_min(&self) -> Option<&K> {
        self.inner.peek_min()
    }

    pub fn extract_min(&mut self) -> Option<K> {
        self.inner.extract_min()
    }

    pub fn delete(&mut self, handle: FibHandle) -> Result<K, HeapError> {
        self.inner.delete(handle)
    }

    pub fn union(&mut self, other: &mut Self) -> Result<(), HeapError> {
        self.inner.union(&mut other.inner)
    }

    pub fn update_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        self.inner.update_key(handle, key)
    }

    pub fn clear(&mut self) {
        self.inner.clear()
    }
}

impl<K: HeapKey> Default for FiboHeap<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: HeapKey> fmt::Debug for FiboHeap<K>
where
    K::Heap: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FiboHeap").field(&self.inner).finish()
    }
}

impl<K: HeapKey> Heap<K> for FiboHeap<K> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn insert(&mut self, key: K) -> Result<FibHandle, HeapError> {
        self.inner.insert(key)
    }

    fn peek_min(&self) -> Option<&K> {
        self.inner.peek_min()
    }

    fn extract_min(&mut self) -> Option<K> {
        self.inner.extract_min()
    }

    fn delete(&mut self, handle: FibHandle) -> Result<K, HeapError> {
        self.inner.delete(handle)
    }

    fn union(&mut self, other: &mut Self) -> Result<(), HeapError> {
        self.inner.union(&mut other.inner)
    }

    fn update_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        self.inner.update_key(handle, key)
    }

    fn sift_decreased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        self.inner.sift_decreased(handle)
    }

    fn sift_increased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        self.inner.sift_increased(handle)
    }

    fn clear(&mut self) {
        self.inner.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aware::{AwareFibonacciHeap, HeapAware};
    use std::cell::Cell;
    use std::cmp::Ordering;
    use std::rc::Rc;

    /// Generic caller that does not know which variant it drives
    fn drain_all<K, H: Heap<K>>(heap: &mut H) -> Vec<K> {
        std::iter::from_fn(|| heap.extract_min()).collect()
    }

    #[test]
    fn test_plain_keys_use_core() {
        let mut heap: FiboHeap<i32> = FiboHeap::new();
        for k in [5, 3, 8, 1] {
            heap.insert(k).unwrap();
        }
        assert_eq!(heap.inner().len(), 4);
        assert_eq!(drain_all(&mut heap), vec![1, 3, 5, 8]);
    }

    #[test]
    fn test_tuple_keys_order_lexicographically() {
        let mut heap: FiboHeap<(i64, u32)> = FiboHeap::new();
        heap.insert((2, 1)).unwrap();
        let h = heap.insert((2, 0)).unwrap();
        heap.insert((1, 9)).unwrap();
        heap.update_key(h, (0, 0)).unwrap();
        assert_eq!(drain_all(&mut heap), vec![(0, 0), (1, 9), (2, 1)]);
    }

    #[test]
    fn test_facade_union_and_delete() {
        let mut a: FiboHeap<u64> = FiboHeap::new();
        let mut b: FiboHeap<u64> = FiboHeap::new();
        let gone = a.insert(7).unwrap();
        a.insert(3).unwrap();
        b.insert(1).unwrap();

        assert_eq!(a.delete(gone), Ok(7));
        a.union(&mut b).unwrap();
        assert!(b.is_empty());
        assert_eq!(drain_all(&mut a), vec![1, 3]);
    }

    #[derive(Debug)]
    struct Job {
        rank: Cell<i32>,
        slot: Cell<Option<FibHandle>>,
    }

    impl PartialEq for Job {
        fn eq(&self, other: &Self) -> bool {
            self.rank.get() == other.rank.get()
        }
    }

    impl PartialOrd for Job {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            self.rank.get().partial_cmp(&other.rank.get())
        }
    }

    impl HeapAware for Job {
        fn heap_handle(&self) -> Option<FibHandle> {
            self.slot.get()
        }

        fn set_heap_handle(&self, handle: Option<FibHandle>) {
            self.slot.set(handle)
        }
    }

    impl HeapKey for Rc<Job> {
        type Heap = AwareFibonacciHeap<Rc<Job>>;
    }

    #[test]
    fn test_aware_keys_use_adapter() {
        let mut heap: FiboHeap<Rc<Job>> = FiboHeap::new();
        let jobs: Vec<_> = (0..4)
            .map(|r| {
                Rc::new(Job {
                    rank: Cell::new(r),
                    slot: Cell::new(None),
                })
            })
            .collect();
        for job in &jobs {
            heap.insert(Rc::clone(job)).unwrap();
        }
        assert!(jobs.iter().all(|j| j.in_heap()));

        jobs[3].rank.set(-5);
        jobs[3].decrease_key(&mut heap).unwrap();
        jobs[0].rank.set(10);
        jobs[0].increase_key(&mut heap).unwrap();

        let ranks: Vec<i32> = drain_all(&mut heap).iter().map(|j| j.rank.get()).collect();
        assert_eq!(ranks, vec![-5, 1, 2, 10]);
        assert!(jobs.iter().all(|j| !j.in_heap()));
    }
}
