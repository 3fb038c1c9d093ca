//! Fibonacci Heap implementation
//!
//! A Fibonacci heap is a data structure for priority queue operations with:
//! - O(1) amortized insert, decrease_key, and union
//! - O(log n) amortized extract_min, increase_key and delete
//!
//! The structure consists of a collection of heap-ordered trees. Roots are linked
//! in a circular doubly linked list. The heap maintains the minimum node and,
//! opportunistically, the second smallest root so that `extract_min` can skip
//! consolidation when nothing has disturbed that cache.
//!
//! Entries live in generational arenas; every parent/child/sibling link names
//! an arena and a slot in it, so a stale or foreign handle is detected instead
//! of aliasing. A union takes over the other heap's arenas wholesale, which
//! keeps it independent of the number of entries moved.

use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::traits::{Handle, Heap, HeapError, KeyOrder, NaturalOrder};

new_key_type! {
    /// Arena index of a heap entry
    pub struct EntryKey;
}

/// Process-unique identity of a heap instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u64);

impl HeapId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        HeapId(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Process-unique identity of an entry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(u64);

impl ArenaId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ArenaId(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Handle to an element in a Fibonacci heap
///
/// A handle names the arena its entry was allocated in. Arenas travel with
/// their entries when [`FibonacciHeap::union`] absorbs a heap, so a handle
/// stays valid in whichever heap holds the entry. Using it with a heap that
/// does not hold the entry, or after the element was removed, yields
/// [`HeapError::InvalidHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FibHandle {
    arena: ArenaId,
    entry: EntryKey,
}

impl FibHandle {
    /// The arena the entry was allocated in
    pub fn arena_id(&self) -> ArenaId {
        self.arena
    }
}

impl Handle for FibHandle {}

/// Links between entries are handles too
type Node = FibHandle;

/// Upper bound on the degree of any node in a heap of `len` entries:
/// a node of degree d roots at least F(d+2) >= phi^d nodes.
fn max_degree(len: usize) -> usize {
    const PHI: f64 = 1.618_033_988_749_895;
    if len < 2 {
        return 1;
    }
    ((len as f64).ln() / PHI.ln()) as usize + 1
}

struct Entry<K> {
    /// `None` only while the entry is being deleted
    key: Option<K>,
    parent: Option<Node>,
    child: Option<Node>,
    left: Node,
    right: Node,
    degree: usize,
    marked: bool,
}

type Slots<K> = SlotMap<EntryKey, Entry<K>>;

/// Entry storage of one heap: the arena it allocates from plus every arena
/// taken over by a union
struct Arenas<K> {
    home: ArenaId,
    slots: Slots<K>,
    /// Absorbed arenas that still hold entries
    absorbed: FxHashMap<ArenaId, Slots<K>>,
    len: usize,
}

impl<K> Arenas<K> {
    fn new() -> Self {
        Arenas {
            home: ArenaId::next(),
            slots: SlotMap::with_key(),
            absorbed: FxHashMap::default(),
            len: 0,
        }
    }

    fn arena(&self, id: ArenaId) -> Option<&Slots<K>> {
        if id == self.home {
            Some(&self.slots)
        } else {
            self.absorbed.get(&id)
        }
    }

    fn arena_mut(&mut self, id: ArenaId) -> Option<&mut Slots<K>> {
        if id == self.home {
            Some(&mut self.slots)
        } else {
            self.absorbed.get_mut(&id)
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn contains(&self, node: Node) -> bool {
        self.arena(node.arena)
            .is_some_and(|slots| slots.contains_key(node.entry))
    }

    /// Allocates in the home arena; `build` receives the new entry's handle
    fn insert_with(&mut self, build: impl FnOnce(Node) -> Entry<K>) -> Node {
        let arena = self.home;
        let entry = self
            .slots
            .insert_with_key(|entry| build(FibHandle { arena, entry }));
        self.len += 1;
        FibHandle { arena, entry }
    }

    fn remove(&mut self, node: Node) -> Option<Entry<K>> {
        let removed = if node.arena == self.home {
            self.slots.remove(node.entry)
        } else {
            let slots = self.absorbed.get_mut(&node.arena)?;
            let removed = slots.remove(node.entry);
            if slots.is_empty() {
                self.absorbed.remove(&node.arena);
            }
            removed
        };
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.absorbed.clear();
        self.len = 0;
    }

    /// Takes over every arena of `other`, which restarts with a fresh one
    fn absorb(&mut self, other: &mut Arenas<K>) {
        let Arenas {
            home,
            slots,
            mut absorbed,
            len,
        } = mem::replace(other, Arenas::new());
        // Merge the smaller table into the larger one.
        if absorbed.len() > self.absorbed.len() {
            mem::swap(&mut absorbed, &mut self.absorbed);
        }
        self.absorbed.extend(absorbed);
        if !slots.is_empty() {
            self.absorbed.insert(home, slots);
        }
        self.len += len;
    }
}

impl<K> Index<Node> for Arenas<K> {
    type Output = Entry<K>;

    fn index(&self, node: Node) -> &Entry<K> {
        match self.arena(node.arena) {
            Some(slots) => &slots[node.entry],
            None => panic!("heap link into an arena it does not hold"),
        }
    }
}

impl<K> IndexMut<Node> for Arenas<K> {
    fn index_mut(&mut self, node: Node) -> &mut Entry<K> {
        match self.arena_mut(node.arena) {
            Some(slots) => &mut slots[node.entry],
            None => panic!("heap link into an arena it does not hold"),
        }
    }
}

/// Fibonacci Heap
///
/// Keys are ordered by a [`KeyOrder`] comparator, [`NaturalOrder`] by default.
///
/// # Example
///
/// ```rust
/// use rust_dynamic_spt::fibonacci::FibonacciHeap;
///
/// let mut heap = FibonacciHeap::new();
/// let five = heap.insert(5).unwrap();
/// heap.insert(3).unwrap();
/// heap.decrease_key(five, 1).unwrap();
/// assert_eq!(heap.peek_min(), Some(&1));
/// ```
pub struct FibonacciHeap<K, C = NaturalOrder> {
    id: HeapId,
    entries: Arenas<K>,
    min: Option<Node>,
    second_min: Option<Node>,
    mod_count: u64,
    /// Scratch table for consolidation, indexed by degree
    degree_table: Vec<Option<Node>>,
    order: C,
}

impl<K> FibonacciHeap<K, NaturalOrder> {
    /// Creates an empty heap ordered by the keys' `PartialOrd`
    pub fn new() -> Self {
        Self::with_order(NaturalOrder)
    }
}

impl<K, C: Default> Default for FibonacciHeap<K, C> {
    fn default() -> Self {
        Self::with_order(C::default())
    }
}

impl<K, C> FibonacciHeap<K, C> {
    /// Creates an empty heap ordered by `order`
    pub fn with_order(order: C) -> Self {
        Self {
            id: HeapId::next(),
            entries: Arenas::new(),
            min: None,
            second_min: None,
            mod_count: 0,
            degree_table: Vec::new(),
            order,
        }
    }

    /// Identity of this heap, checked by its cursors
    pub fn id(&self) -> HeapId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none()
    }

    pub fn peek_min(&self) -> Option<&K> {
        self.min.and_then(|m| self.entries[m].key.as_ref())
    }

    /// Returns the key behind `handle`, if it is still in this heap
    pub fn get(&self, handle: FibHandle) -> Option<&K> {
        let node = self.resolve(handle).ok()?;
        self.entries[node].key.as_ref()
    }

    pub fn contains(&self, handle: FibHandle) -> bool {
        self.resolve(handle).is_ok()
    }

    /// Handle of the current minimum
    pub fn min_handle(&self) -> Option<FibHandle> {
        self.min
    }

    /// Removes every key
    pub fn clear(&mut self) {
        self.entries.clear();
        self.min = None;
        self.second_min = None;
        self.mod_count += 1;
    }

    /// Borrowing iterator over the whole forest, parent before children
    pub fn iter(&self) -> Iter<'_, K, C> {
        Iter {
            heap: self,
            next: self.min,
            remaining: self.entries.len(),
        }
    }

    /// Detached cursor over the forest
    ///
    /// Unlike [`iter`](Self::iter) the cursor does not borrow the heap, so
    /// the heap may be modified between steps; the next step then reports
    /// [`HeapError::ConcurrentModification`].
    pub fn cursor(&self) -> HeapCursor {
        HeapCursor {
            heap: self.id,
            next: self.min,
            expected: self.mod_count,
        }
    }

    fn resolve(&self, handle: FibHandle) -> Result<Node, HeapError> {
        if !self.entries.contains(handle) {
            return Err(HeapError::InvalidHandle);
        }
        Ok(handle)
    }

    fn alloc(&mut self, key: K) -> Node {
        self.entries.insert_with(|this| Entry {
            key: Some(key),
            parent: None,
            child: None,
            left: this,
            right: this,
            degree: 0,
            marked: false,
        })
    }

    // ========================================================================
    // Circular list plumbing
    // ========================================================================

    /// Inserts the single `node` into the ring of `head`, just before it
    fn splice_before(&mut self, node: Node, head: Node) {
        let left = self.entries[head].left;
        self.entries[node].left = left;
        self.entries[node].right = head;
        self.entries[left].right = node;
        self.entries[head].left = node;
    }

    /// Removes `node` from its ring, leaving it as a singleton
    fn unlink(&mut self, node: Node) {
        let (left, right) = (self.entries[node].left, self.entries[node].right);
        self.entries[left].right = right;
        self.entries[right].left = left;
        self.entries[node].left = node;
        self.entries[node].right = node;
    }

    /// Joins the ring containing `b` into the ring containing `a`
    fn append_ring(&mut self, a: Node, b: Node) {
        let a_right = self.entries[a].right;
        let b_left = self.entries[b].left;
        self.entries[a].right = b;
        self.entries[b].left = a;
        self.entries[b_left].right = a_right;
        self.entries[a_right].left = b_left;
    }

    fn ring(&self, start: Node) -> Vec<Node> {
        let mut members = vec![start];
        let mut cur = self.entries[start].right;
        while cur != start {
            members.push(cur);
            cur = self.entries[cur].right;
        }
        members
    }

    /// Next entry in parent-first, depth-before-breadth order
    fn successor(&self, node: Node) -> Option<Node> {
        if let Some(child) = self.entries[node].child {
            return Some(child);
        }
        let mut cur = node;
        loop {
            let parent = self.entries[cur].parent;
            let first = match parent {
                Some(p) => self.entries[p].child?,
                None => self.min?,
            };
            let right = self.entries[cur].right;
            if right != first {
                return Some(right);
            }
            cur = parent?;
        }
    }

    // ========================================================================
    // Structural operations
    // ========================================================================

    /// Moves every child of `node` into the root list
    fn children_to_roots(&mut self, node: Node) {
        let Some(child) = self.entries[node].child.take() else {
            return;
        };
        self.entries[node].degree = 0;
        for member in self.ring(child) {
            let entry = &mut self.entries[member];
            entry.parent = None;
            entry.marked = false;
        }
        match self.min {
            Some(min) => self.append_ring(min, child),
            None => self.min = Some(child),
        }
    }

    /// Detaches `node` from `parent`, optionally splicing it into the root list
    fn cut(&mut self, node: Node, parent: Node, to_roots: bool) {
        let right = self.entries[node].right;
        if right == node {
            self.entries[parent].child = None;
        } else {
            if self.entries[parent].child == Some(node) {
                self.entries[parent].child = Some(right);
            }
            self.unlink(node);
        }
        self.entries[parent].degree -= 1;
        self.entries[node].parent = None;
        self.entries[node].marked = false;
        if to_roots {
            if let Some(min) = self.min {
                self.splice_before(node, min);
            }
        }
    }

    fn cascading_cut(&mut self, mut node: Node) {
        while let Some(parent) = self.entries[node].parent {
            if !self.entries[node].marked {
                self.entries[node].marked = true;
                break;
            }
            self.cut(node, parent, true);
            node = parent;
        }
    }

    /// Makes `child` a child of `parent`; both must be roots
    fn link(&mut self, child: Node, parent: Node) {
        self.entries[child].parent = Some(parent);
        self.entries[child].marked = false;
        match self.entries[parent].child {
            Some(first) => self.splice_before(child, first),
            None => {
                self.entries[child].left = child;
                self.entries[child].right = child;
                self.entries[parent].child = Some(child);
            }
        }
        self.entries[parent].degree += 1;
    }

    /// Caches the previous minimum as second minimum when `node` replaced it,
    /// otherwise invalidates the cache
    fn try_replace_min(&mut self, node: Node, smaller: bool) {
        if smaller {
            self.second_min = self.min;
            self.min = Some(node);
        } else {
            self.second_min = None;
        }
    }
}

impl<K, C: KeyOrder<K>> FibonacciHeap<K, C> {
    /// Inserts a key and returns its handle
    ///
    /// The key is compared against the current minimum before the heap is
    /// touched, so an incomparable key leaves the heap unchanged.
    pub fn insert(&mut self, key: K) -> Result<FibHandle, HeapError> {
        let smaller = match self.min {
            Some(min) => self.key_less_than(&key, min)?,
            None => true,
        };
        let node = self.alloc(key);
        match self.min {
            Some(min) => {
                self.splice_before(node, min);
                self.try_replace_min(node, smaller);
            }
            None => {
                self.min = Some(node);
                self.second_min = None;
            }
        }
        self.mod_count += 1;
        Ok(node)
    }

    /// Removes and returns the minimum key
    pub fn extract_min(&mut self) -> Option<K> {
        let old = self.min?;
        self.children_to_roots(old);
        let next = self.entries[old].right;
        if next == old {
            self.min = None;
            self.second_min = None;
        } else {
            self.unlink(old);
            match self.second_min.take() {
                Some(second) => self.min = Some(second),
                None => {
                    self.min = Some(next);
                    self.consolidate();
                }
            }
        }
        self.mod_count += 1;
        self.entries.remove(old).and_then(|entry| entry.key)
    }

    /// Replaces the key behind `handle` with a smaller (or equal) one
    ///
    /// # Errors
    /// [`HeapError::PriorityNotDecreased`] if `key` is greater than the current key.
    pub fn decrease_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        let node = self.resolve(handle)?;
        if self.compare_to_entry(&key, node)? == Ordering::Greater {
            return Err(HeapError::PriorityNotDecreased);
        }
        let (violates_parent, smaller) = self.decrease_plan(&key, node)?;
        self.entries[node].key = Some(key);
        self.restore_after_decrease(node, violates_parent, smaller);
        Ok(())
    }

    /// Replaces the key behind `handle` with a larger (or equal) one
    ///
    /// # Errors
    /// [`HeapError::PriorityNotIncreased`] if `key` is less than the current key.
    pub fn increase_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        let node = self.resolve(handle)?;
        if self.compare_to_entry(&key, node)? == Ordering::Less {
            return Err(HeapError::PriorityNotIncreased);
        }
        self.entries[node].key = Some(key);
        self.restore_after_increase(node);
        Ok(())
    }

    /// Replaces the key behind `handle`, moving it in whichever direction the
    /// new key requires
    pub fn update_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        let node = self.resolve(handle)?;
        match self.compare_to_entry(&key, node)? {
            Ordering::Less => self.decrease_key(handle, key),
            Ordering::Equal => {
                self.entries[node].key = Some(key);
                self.mod_count += 1;
                Ok(())
            }
            Ordering::Greater => self.increase_key(handle, key),
        }
    }

    /// Restores order after the key behind `handle` was made smaller in place
    pub fn sift_decreased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        let node = self.resolve(handle)?;
        let (violates_parent, smaller) = match self.entries[node].key.as_ref() {
            Some(key) => self.decrease_plan(key, node)?,
            None => return Err(HeapError::InvalidHandle),
        };
        self.restore_after_decrease(node, violates_parent, smaller);
        Ok(())
    }

    /// Restores order after the key behind `handle` was made larger in place
    pub fn sift_increased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        let node = self.resolve(handle)?;
        self.restore_after_increase(node);
        Ok(())
    }

    /// Removes the key behind `handle` and returns it
    pub fn delete(&mut self, handle: FibHandle) -> Result<K, HeapError> {
        let node = self.resolve(handle)?;
        if self.min == Some(node) {
            return self.extract_min().ok_or(HeapError::InvalidHandle);
        }
        // From here on the entry takes part in no comparison.
        let key = self.entries[node].key.take();
        match self.entries[node].parent {
            Some(parent) => {
                self.cut(node, parent, false);
                self.cascading_cut(parent);
            }
            None => self.unlink(node),
        }
        if self.second_min == Some(node) {
            self.second_min = None;
        }
        self.children_to_roots(node);
        self.entries.remove(node);
        self.consolidate();
        self.mod_count += 1;
        key.ok_or(HeapError::InvalidHandle)
    }

    /// Moves every entry of `other` into this heap and empties `other`
    ///
    /// The arenas of `other` are taken over as they are and its root list is
    /// spliced into this one, so no entry is copied. Handles issued by
    /// `other` stay valid and now resolve in this heap. The two minimums are
    /// compared before anything moves.
    pub fn union(&mut self, other: &mut Self) -> Result<(), HeapError> {
        let Some(other_min) = other.min else {
            return Ok(());
        };
        let smaller = match (self.min, other.entries[other_min].key.as_ref()) {
            (Some(min), Some(key)) => self.key_less_than(key, min)?,
            (None, _) => true,
            (Some(_), None) => return Err(HeapError::InvalidHandle),
        };

        self.entries.absorb(&mut other.entries);
        match self.min {
            Some(min) => {
                self.append_ring(min, other_min);
                if smaller {
                    self.min = Some(other_min);
                }
            }
            None => self.min = Some(other_min),
        }
        // The other heap's second smallest key is unknown here.
        self.second_min = None;
        self.mod_count += 1;

        other.min = None;
        other.second_min = None;
        other.mod_count += 1;
        Ok(())
    }

    fn compare_to_entry(&self, key: &K, node: Node) -> Result<Ordering, HeapError> {
        let other = self.entries[node]
            .key
            .as_ref()
            .ok_or(HeapError::InvalidHandle)?;
        self.order.compare(key, other).ok_or(HeapError::Incomparable)
    }

    fn key_less_than(&self, key: &K, node: Node) -> Result<bool, HeapError> {
        Ok(self.compare_to_entry(key, node)? == Ordering::Less)
    }

    /// Order between two live entries; incomparable pairs count as not less
    fn entry_less(&self, a: Node, b: Node) -> bool {
        match (&self.entries[a].key, &self.entries[b].key) {
            (Some(x), Some(y)) => self.order.compare(x, y) == Some(Ordering::Less),
            _ => false,
        }
    }

    /// Comparisons a decrease needs, done before any link moves
    fn decrease_plan(&self, key: &K, node: Node) -> Result<(bool, bool), HeapError> {
        let violates_parent = match self.entries[node].parent {
            Some(parent) => self.key_less_than(key, parent)?,
            None => false,
        };
        let smaller = match self.min {
            Some(min) if min != node => self.key_less_than(key, min)?,
            _ => false,
        };
        Ok((violates_parent, smaller))
    }

    fn restore_after_decrease(&mut self, node: Node, violates_parent: bool, smaller: bool) {
        if let Some(parent) = self.entries[node].parent {
            if violates_parent || smaller {
                self.cut(node, parent, true);
                self.cascading_cut(parent);
            }
        }
        if self.min == Some(node) {
            self.second_min = None;
        } else {
            self.try_replace_min(node, smaller);
        }
        self.mod_count += 1;
    }

    fn restore_after_increase(&mut self, node: Node) {
        // A larger key can only break order against the node's own children.
        self.children_to_roots(node);
        if let Some(parent) = self.entries[node].parent {
            self.cut(node, parent, true);
            self.cascading_cut(parent);
            if self.second_min == Some(node) {
                self.second_min = None;
            }
        } else if self.min == Some(node) {
            self.refresh_min(node);
        } else if self.second_min == Some(node) {
            self.second_min = None;
        }
        self.mod_count += 1;
    }

    /// Finds the minimum again after the old minimum `node` grew
    fn refresh_min(&mut self, node: Node) {
        if let Some(second) = self.second_min.take() {
            // `second` is the smallest of every other entry.
            if self.entry_less(second, node) {
                self.min = Some(second);
            }
            return;
        }
        let mut best = node;
        let mut cur = self.entries[node].right;
        while cur != node {
            if self.entry_less(cur, best) {
                best = cur;
            }
            cur = self.entries[cur].right;
        }
        self.min = Some(best);
    }

    fn consolidate(&mut self) {
        let Some(start) = self.min else {
            return;
        };
        let roots = self.ring(start);
        let bound = max_degree(self.entries.len()) + 1;
        if self.degree_table.len() < bound {
            let grown = bound.max(self.degree_table.len() * 2);
            self.degree_table.resize(grown, None);
        }

        for root in roots {
            let mut x = root;
            let mut degree = self.entries[x].degree;
            loop {
                if degree >= self.degree_table.len() {
                    let grown = (degree + 1).max(self.degree_table.len() * 2);
                    self.degree_table.resize(grown, None);
                }
                match self.degree_table[degree].take() {
                    None => {
                        self.degree_table[degree] = Some(x);
                        break;
                    }
                    Some(mut y) => {
                        if self.entry_less(y, x) {
                            std::mem::swap(&mut x, &mut y);
                        }
                        self.link(y, x);
                        degree += 1;
                    }
                }
            }
        }

        self.min = None;
        self.second_min = None;
        for slot in 0..self.degree_table.len() {
            let Some(node) = self.degree_table[slot].take() else {
                continue;
            };
            match self.min {
                None => {
                    self.entries[node].left = node;
                    self.entries[node].right = node;
                    self.min = Some(node);
                }
                Some(min) => {
                    self.splice_before(node, min);
                    if self.entry_less(node, min) {
                        self.min = Some(node);
                    }
                }
            }
        }
    }
}

impl<K: fmt::Debug, C> FibonacciHeap<K, C> {
    /// Renders the forest as an indented tree, one entry per line
    pub fn render_forest(&self) -> String {
        let mut out = String::new();
        let mut depth = 0usize;
        let mut next = self.min;
        while let Some(node) = next {
            let entry = &self.entries[node];
            if depth > 0 {
                out.push_str(&"     ".repeat(depth - 1));
                out.push_str("└--> ");
            }
            match &entry.key {
                Some(key) => out.push_str(&format!("[{:?}]", key)),
                None => out.push_str("[deleted]"),
            }
            if entry.marked {
                out.push('*');
            }
            out.push('\n');
            next = self.successor(node);
            depth = next.map_or(0, |n| self.depth_of(n));
        }
        out
    }

    fn depth_of(&self, mut node: Node) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.entries[node].parent {
            depth += 1;
            node = parent;
        }
        depth
    }
}

impl<K: fmt::Debug, C> fmt::Debug for FibonacciHeap<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FibonacciHeap")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("min", &self.peek_min())
            .finish()
    }
}

impl<K, C: KeyOrder<K>> Heap<K> for FibonacciHeap<K, C> {
    fn len(&self) -> usize {
        FibonacciHeap::len(self)
    }

    fn insert(&mut self, key: K) -> Result<FibHandle, HeapError> {
        FibonacciHeap::insert(self, key)
    }

    fn peek_min(&self) -> Option<&K> {
        FibonacciHeap::peek_min(self)
    }

    fn extract_min(&mut self) -> Option<K> {
        FibonacciHeap::extract_min(self)
    }

    fn delete(&mut self, handle: FibHandle) -> Result<K, HeapError> {
        FibonacciHeap::delete(self, handle)
    }

    fn union(&mut self, other: &mut Self) -> Result<(), HeapError> {
        FibonacciHeap::union(self, other)
    }

    fn update_key(&mut self, handle: FibHandle, key: K) -> Result<(), HeapError> {
        FibonacciHeap::update_key(self, handle, key)
    }

    fn sift_decreased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        FibonacciHeap::sift_decreased(self, handle)
    }

    fn sift_increased(&mut self, handle: FibHandle) -> Result<(), HeapError> {
        FibonacciHeap::sift_increased(self, handle)
    }

    fn clear(&mut self) {
        FibonacciHeap::clear(self)
    }
}

/// Borrowing iterator over a [`FibonacciHeap`], see [`FibonacciHeap::iter`]
pub struct Iter<'a, K, C> {
    heap: &'a FibonacciHeap<K, C>,
    next: Option<Node>,
    remaining: usize,
}

impl<'a, K, C> Iterator for Iter<'a, K, C> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        let node = self.next?;
        self.next = self.heap.successor(node);
        self.remaining = self.remaining.saturating_sub(1);
        self.heap.entries[node].key.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, C> IntoIterator for &'a FibonacciHeap<K, C> {
    type Item = &'a K;
    type IntoIter = Iter<'a, K, C>;

    fn into_iter(self) -> Iter<'a, K, C> {
        self.iter()
    }
}

/// Restartable traversal of a heap that detects structural modification
///
/// ```rust
/// use rust_dynamic_spt::fibonacci::FibonacciHeap;
/// use rust_dynamic_spt::HeapError;
///
/// let mut heap = FibonacciHeap::new();
/// heap.insert(2).unwrap();
/// heap.insert(1).unwrap();
///
/// let mut cursor = heap.cursor();
/// assert_eq!(cursor.advance(&heap), Ok(Some(&1)));
/// heap.insert(0).unwrap();
/// assert_eq!(cursor.advance(&heap), Err(HeapError::ConcurrentModification));
///
/// cursor.restart(&heap);
/// assert_eq!(cursor.advance(&heap), Ok(Some(&0)));
/// ```
#[derive(Debug, Clone)]
pub struct HeapCursor {
    heap: HeapId,
    next: Option<Node>,
    expected: u64,
}

impl HeapCursor {
    /// Yields the next key, or `None` once the forest is exhausted
    pub fn advance<'a, K, C>(
        &mut self,
        heap: &'a FibonacciHeap<K, C>,
    ) -> Result<Option<&'a K>, HeapError> {
        if heap.id != self.heap {
            return Err(HeapError::InvalidHandle);
        }
        if heap.mod_count != self.expected {
            return Err(HeapError::ConcurrentModification);
        }
        let Some(node) = self.next else {
            return Ok(None);
        };
        self.next = heap.successor(node);
        Ok(heap.entries[node].key.as_ref())
    }

    /// Starts over from the current minimum of `heap`
    pub fn restart<K, C>(&mut self, heap: &FibonacciHeap<K, C>) {
        self.heap = heap.id;
        self.next = heap.min;
        self.expected = heap.mod_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<K, C: KeyOrder<K>>(heap: &mut FibonacciHeap<K, C>) -> Vec<K> {
        std::iter::from_fn(|| heap.extract_min()).collect()
    }

    #[test]
    fn test_basic_operations() {
        let mut heap = FibonacciHeap::new();
        assert!(heap.is_empty());
        assert_eq!(heap.len(), 0);
        assert_eq!(heap.extract_min(), None);

        heap.insert(5).unwrap();
        heap.insert(3).unwrap();
        heap.insert(8).unwrap();
        heap.insert(1).unwrap();

        assert_eq!(heap.len(), 4);
        assert_eq!(heap.peek_min(), Some(&1));
        assert_eq!(drain(&mut heap), vec![1, 3, 5, 8]);
        assert!(heap.is_empty());
    }

    #[test]
    fn test_decrease_key_between_extractions() {
        let mut heap = FibonacciHeap::new();
        heap.insert(5).unwrap();
        heap.insert(3).unwrap();
        let eight = heap.insert(8).unwrap();
        heap.insert(1).unwrap();

        assert_eq!(heap.extract_min(), Some(1));
        heap.decrease_key(eight, 0).unwrap();
        assert_eq!(drain(&mut heap), vec![0, 3, 5]);
    }

    #[test]
    fn test_decrease_key_rejects_larger_key() {
        let mut heap = FibonacciHeap::new();
        let h = heap.insert(10).unwrap();
        assert_eq!(heap.decrease_key(h, 11), Err(HeapError::PriorityNotDecreased));
        assert_eq!(heap.increase_key(h, 9), Err(HeapError::PriorityNotIncreased));
        assert_eq!(heap.peek_min(), Some(&10));
    }

    #[test]
    fn test_decrease_key_cuts_from_parent() {
        let mut heap = FibonacciHeap::new();
        let handles: Vec<_> = (0..32).map(|i| heap.insert(i * 10).unwrap()).collect();
        // Force a consolidation so that most entries have parents.
        assert_eq!(heap.extract_min(), Some(0));

        heap.decrease_key(handles[31], 1).unwrap();
        heap.decrease_key(handles[17], 2).unwrap();
        heap.decrease_key(handles[18], 3).unwrap();

        let out = drain(&mut heap);
        let mut expected: Vec<i32> = (1..32).map(|i| i * 10).collect();
        expected.retain(|k| ![310, 170, 180].contains(k));
        expected.splice(0..0, [1, 2, 3]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_increase_key_of_minimum() {
        let mut heap = FibonacciHeap::new();
        let a = heap.insert(1).unwrap();
        heap.insert(4).unwrap();
        heap.insert(6).unwrap();

        heap.increase_key(a, 5).unwrap();
        assert_eq!(heap.peek_min(), Some(&4));
        assert_eq!(drain(&mut heap), vec![4, 5, 6]);
    }

    #[test]
    fn test_increase_key_with_children() {
        let mut heap = FibonacciHeap::new();
        let handles: Vec<_> = (0..20).map(|i| heap.insert(i).unwrap()).collect();
        assert_eq!(heap.extract_min(), Some(0));

        // Entry 1 is now the root of the largest tree.
        heap.increase_key(handles[1], 100).unwrap();
        heap.increase_key(handles[5], 50).unwrap();
        let out = drain(&mut heap);
        let mut expected: Vec<i32> = (2..20).filter(|&k| k != 5).collect();
        expected.extend([50, 100]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_update_key_picks_direction() {
        let mut heap = FibonacciHeap::new();
        let a = heap.insert(10).unwrap();
        let b = heap.insert(20).unwrap();
        heap.update_key(a, 30).unwrap();
        heap.update_key(b, 5).unwrap();
        heap.update_key(b, 5).unwrap();
        assert_eq!(drain(&mut heap), vec![5, 30]);
    }

    // ========================================================================
    // Delete Tests
    // ========================================================================

    #[test]
    fn test_delete_minimum_and_inner() {
        let mut heap = FibonacciHeap::new();
        let handles: Vec<_> = (0..10).map(|i| heap.insert(i).unwrap()).collect();
        assert_eq!(heap.extract_min(), Some(0));

        assert_eq!(heap.delete(handles[1]), Ok(1));
        assert_eq!(heap.delete(handles[7]), Ok(7));
        assert_eq!(heap.delete(handles[7]), Err(HeapError::InvalidHandle));
        assert_eq!(heap.len(), 7);
        assert_eq!(drain(&mut heap), vec![2, 3, 4, 5, 6, 8, 9]);
    }

    #[test]
    fn test_delete_cached_second_minimum() {
        let mut heap = FibonacciHeap::new();
        heap.insert(5).unwrap();
        let three = heap.insert(3).unwrap();
        heap.insert(1).unwrap();

        assert_eq!(heap.delete(three), Ok(3));
        assert_eq!(drain(&mut heap), vec![1, 5]);
    }

    // ========================================================================
    // Union Tests
    // ========================================================================

    #[test]
    fn test_union_moves_everything() {
        let mut a = FibonacciHeap::new();
        let mut b = FibonacciHeap::new();
        a.insert(5).unwrap();
        a.insert(9).unwrap();
        let b_two = b.insert(2).unwrap();
        b.insert(7).unwrap();

        a.union(&mut b).unwrap();
        assert!(b.is_empty());
        assert_eq!(b.len(), 0);
        assert_eq!(a.len(), 4);
        assert!(!b.contains(b_two));
        assert_eq!(a.get(b_two), Some(&2));

        a.decrease_key(b_two, 1).unwrap();
        assert_eq!(drain(&mut a), vec![1, 5, 7, 9]);
    }

    #[test]
    fn test_union_takes_over_arenas() {
        let mut a = FibonacciHeap::new();
        let mut b = FibonacciHeap::new();
        let mut c = FibonacciHeap::new();
        a.insert(10).unwrap();
        let b_handles: Vec<_> = (0..100).map(|i| b.insert(i * 2 + 1).unwrap()).collect();
        let c_four = c.insert(4).unwrap();

        b.union(&mut c).unwrap();
        a.union(&mut b).unwrap();
        // Only arena tables move, never entries.
        assert_eq!(a.entries.absorbed.len(), 2);
        assert_eq!(a.entries.slots.len(), 1);
        assert!(b.entries.absorbed.is_empty());
        assert_eq!(a.len(), 102);

        assert_eq!(a.delete(c_four), Ok(4));
        assert_eq!(a.entries.absorbed.len(), 1);
        for &h in &b_handles[1..] {
            a.delete(h).unwrap();
        }
        assert_eq!(a.get(b_handles[0]), Some(&1));
        a.delete(b_handles[0]).unwrap();
        assert!(a.entries.absorbed.is_empty());
        assert_eq!(drain(&mut a), vec![10]);
    }

    #[test]
    fn test_emptied_heap_issues_fresh_handles() {
        let mut a = FibonacciHeap::new();
        let mut b = FibonacciHeap::new();
        let old = b.insert(3).unwrap();
        a.union(&mut b).unwrap();

        let fresh = b.insert(8).unwrap();
        assert_ne!(old.arena_id(), fresh.arena_id());
        assert!(!a.contains(fresh));
        assert_eq!(b.delete(old), Err(HeapError::InvalidHandle));
        assert_eq!(b.get(fresh), Some(&8));
        assert_eq!(a.get(old), Some(&3));
    }

    #[test]
    fn test_union_into_empty_heap() {
        let mut a: FibonacciHeap<i32> = FibonacciHeap::new();
        let mut b = FibonacciHeap::new();
        b.insert(4).unwrap();
        b.insert(2).unwrap();
        a.union(&mut b).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(drain(&mut a), vec![2, 4]);
    }

    #[test]
    fn test_union_invalidates_second_minimum() {
        let mut a = FibonacciHeap::new();
        a.insert(10).unwrap();
        a.insert(5).unwrap();
        let mut b = FibonacciHeap::new();
        b.insert(7).unwrap();
        b.insert(1).unwrap();

        a.union(&mut b).unwrap();
        assert_eq!(drain(&mut a), vec![1, 5, 7, 10]);
    }

    // ========================================================================
    // Fail-fast Tests
    // ========================================================================

    #[test]
    fn test_incomparable_insert_leaves_heap_untouched() {
        let mut heap = FibonacciHeap::new();
        heap.insert(1.0).unwrap();
        heap.insert(2.0).unwrap();

        assert_eq!(heap.insert(f64::NAN), Err(HeapError::Incomparable));
        assert_eq!(heap.len(), 2);
        assert_eq!(drain(&mut heap), vec![1.0, 2.0]);
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let mut a = FibonacciHeap::new();
        let mut b = FibonacciHeap::new();
        let ha = a.insert(1).unwrap();
        b.insert(1).unwrap();
        assert_eq!(b.delete(ha), Err(HeapError::InvalidHandle));
        assert_eq!(b.len(), 1);
    }

    // ========================================================================
    // Iteration Tests
    // ========================================================================

    #[test]
    fn test_iter_visits_every_key() {
        let mut heap = FibonacciHeap::new();
        for i in 0..50 {
            heap.insert(i).unwrap();
        }
        heap.extract_min();
        let mut seen: Vec<i32> = heap.iter().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..50).collect::<Vec<_>>());
        assert_eq!(heap.iter().next(), Some(&1));
    }

    #[test]
    fn test_cursor_detects_modification() {
        let mut heap = FibonacciHeap::new();
        let h = heap.insert(3).unwrap();
        heap.insert(4).unwrap();

        let mut cursor = heap.cursor();
        assert_eq!(cursor.advance(&heap), Ok(Some(&3)));
        heap.delete(h).unwrap();
        assert_eq!(cursor.advance(&heap), Err(HeapError::ConcurrentModification));

        cursor.restart(&heap);
        assert_eq!(cursor.advance(&heap), Ok(Some(&4)));
        assert_eq!(cursor.advance(&heap), Ok(None));
    }

    #[test]
    fn test_custom_order() {
        let mut heap = FibonacciHeap::with_order(|a: &i32, b: &i32| b.partial_cmp(a));
        for k in [3, 9, 1, 7] {
            heap.insert(k).unwrap();
        }
        assert_eq!(drain(&mut heap), vec![9, 7, 3, 1]);
    }

    #[test]
    fn test_render_forest() {
        let mut heap = FibonacciHeap::new();
        for i in 0..5 {
            heap.insert(i).unwrap();
        }
        heap.extract_min();
        let rendered = heap.render_forest();
        assert_eq!(rendered.lines().count(), 4);
        assert!(rendered.starts_with("[1]"));
        assert!(rendered.contains("└--> "));
    }

    #[test]
    fn test_max_degree_bound() {
        assert_eq!(max_degree(0), 1);
        assert!(max_degree(1_000_000) >= 28);
        assert!(max_degree(1_000_000) < 32);
    }
}
