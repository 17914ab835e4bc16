//! Insertion-ordered doubly-linked list.
//!
//! Nodes live in a slot arena and link to each other by index, so removal
//! through a [`NodeId`] is O(1) and no node is ever aliased. Two behaviors are
//! pluggable per list:
//! - equality (`EqFn`), used by [`OrderedList::find`] and
//!   [`OrderedList::remove`]
//! - release (`ReleaseFn`), run on every item the list discards itself
//!   (`remove`, `purge`, drop). Items handed back to the caller
//!   (`pop_front`, `take`) are not released.
//!
//! The list is not internally locked; owners serialize access.

/// Item equality used for lookup and removal.
pub type EqFn<T> = fn(&T, &T) -> bool;

/// Hook run on items discarded by the list.
pub type ReleaseFn<T> = fn(T);

/// Handle to a node. Valid until that node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Node<T> {
    item: T,
    prev: Option<usize>,
    next: Option<usize>,
}

pub struct OrderedList<T> {
    slots: Vec<Option<Node<T>>>,
    vacant: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    eq: EqFn<T>,
    release: Option<ReleaseFn<T>>,
}

fn default_eq<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

impl<T: PartialEq> Default for OrderedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> OrderedList<T> {
    /// List using `PartialEq` for lookups.
    pub fn new() -> Self {
        Self::with_eq(default_eq::<T>)
    }
}

impl<T> OrderedList<T> {
    /// List using a custom equality for lookups.
    pub fn with_eq(eq: EqFn<T>) -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            eq,
            release: None,
        }
    }

    /// Install the release hook (builder style).
    pub fn with_release(mut self, release: ReleaseFn<T>) -> Self {
        self.release = Some(release);
        self
    }

    pub fn set_release(&mut self, release: ReleaseFn<T>) {
        self.release = Some(release);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.vacant.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn node(&self, idx: usize) -> Option<&Node<T>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    /// Add at the tail.
    pub fn append(&mut self, item: T) -> NodeId {
        let prev = self.tail;
        let idx = self.alloc(Node {
            item,
            prev,
            next: None,
        });
        match prev.and_then(|p| self.node_mut(p)) {
            Some(p) => p.next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
        NodeId(idx)
    }

    /// Add at the head.
    pub fn push_front(&mut self, item: T) -> NodeId {
        let next = self.head;
        let idx = self.alloc(Node {
            item,
            prev: None,
            next,
        });
        match next.and_then(|n| self.node_mut(n)) {
            Some(n) => n.prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
        NodeId(idx)
    }

    /// Unlink a node and hand its item back without releasing it.
    pub fn take(&mut self, id: NodeId) -> Option<T> {
        let node = self.slots.get_mut(id.0)?.take()?;
        match node.prev {
            Some(p) => {
                if let Some(p) = self.node_mut(p) {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => {
                if let Some(n) = self.node_mut(n) {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        self.vacant.push(id.0);
        self.len -= 1;
        Some(node.item)
    }

    /// Remove the head and hand it to the caller.
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head?;
        self.take(NodeId(head))
    }

    pub fn first(&self) -> Option<&T> {
        self.head.and_then(|h| self.node(h)).map(|n| &n.item)
    }

    pub fn last(&self) -> Option<&T> {
        self.tail.and_then(|t| self.node(t)).map(|n| &n.item)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.node(id.0).map(|n| &n.item)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.node_mut(id.0).map(|n| &mut n.item)
    }

    /// First node whose item matches `pred`.
    pub fn position<F>(&self, mut pred: F) -> Option<NodeId>
    where
        F: FnMut(&T) -> bool,
    {
        self.iter_ids().find(|(_, item)| pred(item)).map(|(id, _)| id)
    }

    /// First item equal to `probe` under the list's equality.
    pub fn find(&self, probe: &T) -> Option<&T> {
        let eq = self.eq;
        self.iter().find(|item| eq(item, probe))
    }

    pub fn contains(&self, probe: &T) -> bool {
        self.find(probe).is_some()
    }

    /// Remove and release the first item equal to `probe`.
    /// A missing item is not an error; returns whether one was removed.
    pub fn remove(&mut self, probe: &T) -> bool {
        let eq = self.eq;
        let Some(id) = self.position(|item| eq(item, probe)) else {
            return false;
        };
        if let Some(item) = self.take(id) {
            self.discard(item);
        }
        true
    }

    /// Remove and release every item, keeping the hooks.
    pub fn purge(&mut self) {
        while let Some(item) = self.pop_front() {
            self.discard(item);
        }
        self.slots.clear();
        self.vacant.clear();
    }

    fn discard(&self, item: T) {
        if let Some(release) = self.release {
            release(item);
        }
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Iterate `(NodeId, &T)` front to back.
    pub fn iter_ids(&self) -> impl Iterator<Item = (NodeId, &T)> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let idx = cursor?;
            let node = self.node(idx)?;
            cursor = node.next;
            Some((NodeId(idx), &node.item))
        })
    }
}

impl<T> Drop for OrderedList<T> {
    fn drop(&mut self) {
        if self.release.is_some() {
            self.purge();
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for OrderedList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

pub struct Iter<'a, T> {
    list: &'a OrderedList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.list.node(self.cursor?)?;
        self.cursor = node.next;
        Some(&node.item)
    }
}

impl<'a, T> IntoIterator for &'a OrderedList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
