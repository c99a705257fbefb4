//! An ordered list with stable node handles.
//!
//! [`NodeList`] is a doubly linked list whose nodes live in a [`Slab`].
//! Appending a value returns a [`NodeId`] that stays valid until exactly
//! that node is removed, which allows O(1) removal of an arbitrary element
//! by whoever holds the handle. Removing one node never invalidates the
//! handle of any other node, so a list can be walked by capturing the next
//! handle before the current node is removed.

use core::fmt;
use slab::Slab;

//------------ NodeId --------------------------------------------------------

/// A handle to a node of a [`NodeList`].
///
/// Handles carry a tag unique within their list so that a handle to a
/// removed node never resolves to a node that later reused its slot.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct NodeId {
    key: usize,
    tag: u64,
}

//------------ Node ----------------------------------------------------------

struct Node<T> {
    value: T,
    tag: u64,
    prev: Option<usize>,
    next: Option<usize>,
}

//------------ NodeList ------------------------------------------------------

/// An insertion-ordered list with O(1) removal by handle.
pub struct NodeList<T> {
    nodes: Slab<Node<T>>,
    head: Option<usize>,
    tail: Option<usize>,
    next_tag: u64,
}

impl<T> NodeList<T> {
    /// Creates a new, empty list.
    pub fn new() -> Self {
        NodeList {
            nodes: Slab::new(),
            head: None,
            tail: None,
            next_tag: 0,
        }
    }

    /// Returns the number of elements in the list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a value and returns the handle of its node.
    pub fn push_back(&mut self, value: T) -> NodeId {
        let tag = self.next_tag;
        self.next_tag += 1;
        let key = self.nodes.insert(Node {
            value,
            tag,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        NodeId { key, tag }
    }

    /// Returns the handle of the first node.
    pub fn first_node(&self) -> Option<NodeId> {
        self.head.map(|key| self.id_of(key))
    }

    /// Returns a reference to the first value.
    pub fn first(&self) -> Option<&T> {
        self.head.map(|key| &self.nodes[key].value)
    }

    /// Returns the handle of the node following `node`.
    ///
    /// Returns `None` if `node` is the last node or no longer part of the
    /// list.
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        let key = self.resolve(node)?;
        self.nodes[key].next.map(|next| self.id_of(next))
    }

    /// Returns whether `node` is still part of the list.
    pub fn contains(&self, node: NodeId) -> bool {
        self.resolve(node).is_some()
    }

    /// Returns a reference to the value of `node`.
    pub fn get(&self, node: NodeId) -> Option<&T> {
        self.resolve(node).map(|key| &self.nodes[key].value)
    }

    /// Returns a mutable reference to the value of `node`.
    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut T> {
        let key = self.resolve(node)?;
        Some(&mut self.nodes[key].value)
    }

    /// Removes `node` from the list and returns its value.
    ///
    /// Returns `None` if the node has already been removed.
    pub fn remove(&mut self, node: NodeId) -> Option<T> {
        let key = self.resolve(node)?;
        let Node {
            value, prev, next, ..
        } = self.nodes.remove(key);
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        Some(value)
    }

    /// Removes the first node and returns its value.
    pub fn pop_front(&mut self) -> Option<T> {
        let node = self.first_node()?;
        self.remove(node)
    }

    /// Returns an iterator over the values in list order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn id_of(&self, key: usize) -> NodeId {
        NodeId {
            key,
            tag: self.nodes[key].tag,
        }
    }

    fn resolve(&self, node: NodeId) -> Option<usize> {
        match self.nodes.get(node.key) {
            Some(item) if item.tag == node.tag => Some(node.key),
            _ => None,
        }
    }
}

//--- Default

impl<T> Default for NodeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

//--- Debug

impl<T: fmt::Debug> fmt::Debug for NodeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

//------------ Iter ----------------------------------------------------------

/// An iterator over the values of a [`NodeList`].
pub struct Iter<'a, T> {
    list: &'a NodeList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let node = &self.list.nodes[key];
        self.cursor = node.next;
        Some(&node.value)
    }
}

//============ Testing =======================================================
