//! Property-based tests using proptest
//!
//! These tests generate random sequences of heap operations and check every
//! step against a plain reference list of the keys that should be present.

use proptest::prelude::*;
use rust_dynamic_spt::aware::{AwareFibonacciHeap, HeapAware};
use rust_dynamic_spt::fibonacci::{FibHandle, FibonacciHeap};
use rust_dynamic_spt::FiboHeap;

use std::cell::Cell;
use std::cmp::Ordering;
use std::rc::Rc;

/// Keys are `(priority, serial)` so that every key is unique and the entry
/// returned by an extraction is known exactly.
type Key = (i32, u32);

#[derive(Debug, Clone)]
enum Op {
    Insert(i32),
    Extract,
    Decrease(prop::sample::Index, i32),
    Increase(prop::sample::Index, i32),
    Delete(prop::sample::Index),
    Union(Vec<i32>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-500i32..500).prop_map(Op::Insert),
        2 => Just(Op::Extract),
        2 => (any::<prop::sample::Index>(), 0i32..300).prop_map(|(i, d)| Op::Decrease(i, d)),
        2 => (any::<prop::sample::Index>(), 0i32..300).prop_map(|(i, d)| Op::Increase(i, d)),
        1 => any::<prop::sample::Index>().prop_map(Op::Delete),
        1 => prop::collection::vec(-500i32..500, 0..8).prop_map(Op::Union),
    ]
}

/// Runs `ops` against a heap and a reference list of `(handle, key)` pairs
fn check_against_reference(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let mut heap: FibonacciHeap<Key> = FibonacciHeap::new();
    let mut live: Vec<(FibHandle, Key)> = Vec::new();
    let mut serial = 0u32;
    let mut next_key = |priority: i32| {
        serial += 1;
        (priority, serial)
    };

    for op in ops {
        match op {
            Op::Insert(priority) => {
                let key = next_key(priority);
                let handle = heap.insert(key).unwrap();
                live.push((handle, key));
            }
            Op::Extract => {
                let expected = live.iter().map(|&(_, key)| key).min();
                let got = heap.extract_min();
                prop_assert_eq!(got, expected);
                live.retain(|&(_, key)| Some(key) != got);
            }
            Op::Decrease(index, amount) if !live.is_empty() => {
                let slot = index.index(live.len());
                let (handle, (priority, id)) = live[slot];
                let key = (priority - amount, id);
                heap.decrease_key(handle, key).unwrap();
                live[slot].1 = key;
            }
            Op::Increase(index, amount) if !live.is_empty() => {
                let slot = index.index(live.len());
                let (handle, (priority, id)) = live[slot];
                let key = (priority + amount, id);
                heap.increase_key(handle, key).unwrap();
                live[slot].1 = key;
            }
            Op::Delete(index) if !live.is_empty() => {
                let slot = index.index(live.len());
                let (handle, key) = live.swap_remove(slot);
                prop_assert_eq!(heap.delete(handle), Ok(key));
                prop_assert!(!heap.contains(handle));
            }
            Op::Union(priorities) => {
                let mut other: FibonacciHeap<Key> = FibonacciHeap::new();
                let mut absorbed = Vec::new();
                for priority in priorities {
                    let key = next_key(priority);
                    absorbed.push((other.insert(key).unwrap(), key));
                }
                heap.union(&mut other).unwrap();
                prop_assert!(other.is_empty());
                for (handle, key) in absorbed {
                    prop_assert!(!other.contains(handle));
                    prop_assert_eq!(heap.get(handle), Some(&key));
                    live.push((handle, key));
                }
            }
            _ => {}
        }

        prop_assert_eq!(heap.len(), live.len());
        let expected_min = live.iter().map(|&(_, key)| key).min();
        prop_assert_eq!(heap.peek_min().copied(), expected_min);
    }

    let mut expected: Vec<Key> = live.into_iter().map(|(_, key)| key).collect();
    expected.sort_unstable();
    let drained: Vec<Key> = std::iter::from_fn(|| heap.extract_min()).collect();
    prop_assert_eq!(drained, expected);
    Ok(())
}

/// update_key must order keys exactly like delete followed by a fresh insert
fn check_update_matches_reinsert(
    initial: Vec<i32>,
    updates: Vec<(prop::sample::Index, i32)>,
    extract_every: usize,
) -> Result<(), TestCaseError> {
    let mut updated: FiboHeap<Key> = FiboHeap::new();
    let mut reinserted: FiboHeap<Key> = FiboHeap::new();
    let mut handles = Vec::new();
    for (id, &priority) in initial.iter().enumerate() {
        let key = (priority, id as u32);
        handles.push((updated.insert(key).unwrap(), reinserted.insert(key).unwrap(), key));
    }

    for (step, (index, priority)) in updates.into_iter().enumerate() {
        if handles.is_empty() {
            break;
        }
        let slot = index.index(handles.len());
        let (a, b, (_, id)) = handles[slot];
        let key = (priority, id);
        updated.update_key(a, key).unwrap();
        reinserted.delete(b).unwrap();
        let b = reinserted.insert(key).unwrap();
        handles[slot] = (a, b, key);

        if step % extract_every == 0 {
            let left = updated.extract_min();
            prop_assert_eq!(left, reinserted.extract_min());
            if let Some(gone) = left {
                handles.retain(|&(_, _, key)| key != gone);
            }
        }
    }

    let left: Vec<Key> = std::iter::from_fn(|| updated.extract_min()).collect();
    let right: Vec<Key> = std::iter::from_fn(|| reinserted.extract_min()).collect();
    prop_assert_eq!(left, right);
    Ok(())
}

#[derive(Debug)]
struct Item {
    priority: Cell<i64>,
    id: u32,
    slot: Cell<Option<FibHandle>>,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        (self.priority.get(), self.id) == (other.priority.get(), other.id)
    }
}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.priority.get(), self.id).partial_cmp(&(other.priority.get(), other.id))
    }
}

impl HeapAware for Item {
    fn heap_handle(&self) -> Option<FibHandle> {
        self.slot.get()
    }

    fn set_heap_handle(&self, handle: Option<FibHandle>) {
        self.slot.set(handle)
    }
}

/// Keys changed in place and re-sifted through their own handle
fn check_aware_keys(initial: Vec<i64>, changes: Vec<(prop::sample::Index, i64)>) -> Result<(), TestCaseError> {
    let mut heap: AwareFibonacciHeap<Rc<Item>> = AwareFibonacciHeap::new();
    let items: Vec<Rc<Item>> = initial
        .iter()
        .enumerate()
        .map(|(id, &priority)| {
            Rc::new(Item {
                priority: Cell::new(priority),
                id: id as u32,
                slot: Cell::new(None),
            })
        })
        .collect();
    for item in &items {
        heap.insert(Rc::clone(item)).unwrap();
    }

    for (index, priority) in changes {
        if items.is_empty() {
            break;
        }
        let item = &items[index.index(items.len())];
        let old = item.priority.replace(priority);
        if priority < old {
            item.decrease_key(&mut heap).unwrap();
        } else {
            item.increase_key(&mut heap).unwrap();
        }
    }

    let mut expected: Vec<(i64, u32)> = items.iter().map(|i| (i.priority.get(), i.id)).collect();
    expected.sort_unstable();
    let drained: Vec<(i64, u32)> = std::iter::from_fn(|| heap.extract_min())
        .map(|i| (i.priority.get(), i.id))
        .collect();
    prop_assert_eq!(drained, expected);
    prop_assert!(items.iter().all(|i| !i.in_heap()));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_operations_match_reference(ops in prop::collection::vec(op_strategy(), 0..200)) {
        check_against_reference(ops)?;
    }

    #[test]
    fn prop_update_key_matches_delete_and_reinsert(
        initial in prop::collection::vec(-100i32..100, 1..40),
        updates in prop::collection::vec((any::<prop::sample::Index>(), -200i32..200), 0..60),
        extract_every in 1usize..6,
    ) {
        check_update_matches_reinsert(initial, updates, extract_every)?;
    }

    #[test]
    fn prop_aware_keys_reorder_themselves(
        initial in prop::collection::vec(-100i64..100, 1..40),
        changes in prop::collection::vec((any::<prop::sample::Index>(), -200i64..200), 0..60),
    ) {
        check_aware_keys(initial, changes)?;
    }

    #[test]
    fn prop_union_keeps_the_multiset(
        left in prop::collection::vec(-50i32..50, 0..30),
        right in prop::collection::vec(-50i32..50, 0..30),
    ) {
        let mut a: FiboHeap<i32> = FiboHeap::new();
        let mut b: FiboHeap<i32> = FiboHeap::new();
        for &k in &left {
            a.insert(k).unwrap();
        }
        for &k in &right {
            b.insert(k).unwrap();
        }
        a.union(&mut b).unwrap();
        prop_assert!(b.is_empty());

        let mut expected: Vec<i32> = left.iter().chain(right.iter()).copied().collect();
        expected.sort_unstable();
        let drained: Vec<i32> = std::iter::from_fn(|| a.extract_min()).collect();
        prop_assert_eq!(drained, expected);
    }
}

#[test]
fn test_documented_extraction_order() {
    let mut heap: FiboHeap<i32> = FiboHeap::new();
    heap.insert(5).unwrap();
    heap.insert(3).unwrap();
    let eight = heap.insert(8).unwrap();
    heap.insert(1).unwrap();

    assert_eq!(heap.extract_min(), Some(1));
    heap.update_key(eight, 0).unwrap();
    let rest: Vec<i32> = std::iter::from_fn(|| heap.extract_min()).collect();
    assert_eq!(rest, vec![0, 3, 5]);
}
