//! Folder node: children map, parent back-reference, protocol lock.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::childmap::ChildMap;
use crate::sync::{LockCounters, NodeLock};

/// A single folder.
///
/// Parents own children through `Arc`; a node only remembers its parent
/// through a non-owning `Weak`, rewritten when the node is relocated.
///
/// The `links` mutex is a short-held data mutex. Logical exclusion over
/// the links comes from the protocol lock: children are read under a
/// read or write hold of this node and mutated only under a write hold
/// of the owning parent.
pub(crate) struct Node {
    lock: NodeLock,
    links: Mutex<Links>,
}

struct Links {
    children: ChildMap<Arc<Node>>,
    parent: Weak<Node>,
}

impl Node {
    /// Allocate a node. `None` makes a root with no parent.
    pub(crate) fn new(parent: Option<&Arc<Node>>) -> Arc<Self> {
        Arc::new(Node {
            lock: NodeLock::new(),
            links: Mutex::new(Links {
                children: ChildMap::new(),
                parent: parent.map_or_else(Weak::new, Arc::downgrade),
            }),
        })
    }

    // ------------------------------------------------------------------
    // Protocol lock
    // ------------------------------------------------------------------

    pub(crate) fn read_lock(&self) {
        self.lock.read_lock();
    }

    pub(crate) fn read_unlock(&self) {
        self.lock.read_unlock();
    }

    pub(crate) fn write_lock(&self) {
        self.lock.write_lock();
    }

    pub(crate) fn write_unlock(&self) {
        self.lock.write_unlock();
    }

    pub(crate) fn subtree_wait(&self) {
        self.lock.subtree_wait();
    }

    pub(crate) fn counters(&self) -> LockCounters {
        self.lock.counters()
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    pub(crate) fn child(&self, name: &str) -> Option<Arc<Node>> {
        self.links.lock().children.get(name).cloned()
    }

    pub(crate) fn has_child(&self, name: &str) -> bool {
        self.links.lock().children.get(name).is_some()
    }

    /// Requires a write hold on this node.
    pub(crate) fn insert_child(&self, name: &str, child: Arc<Node>) {
        let displaced = self.links.lock().children.insert(name, child);
        debug_assert!(displaced.is_none(), "insert_child over an occupied name");
    }

    /// Requires a write hold on this node.
    pub(crate) fn remove_child(&self, name: &str) -> Option<Arc<Node>> {
        self.links.lock().children.remove(name)
    }

    pub(crate) fn child_count(&self) -> usize {
        self.links.lock().children.len()
    }

    pub(crate) fn parent(&self) -> Option<Arc<Node>> {
        self.links.lock().parent.upgrade()
    }

    /// Requires write holds on both the old and the new parent.
    pub(crate) fn set_parent(&self, parent: &Arc<Node>) {
        self.links.lock().parent = Arc::downgrade(parent);
    }

    /// Requires at least a read hold on this node.
    pub(crate) fn contents_string(&self) -> String {
        self.links.lock().children.contents_string()
    }

    /// Children pairs for teardown and invariant walks; quiescent use
    /// only.
    pub(crate) fn children_snapshot(&self) -> Vec<(String, Arc<Node>)> {
        self.links
            .lock()
            .children
            .iter()
            .map(|(name, child)| (name.to_string(), Arc::clone(child)))
            .collect()
    }

    /// Detach and return all children; quiescent use only.
    pub(crate) fn drain_children(&self) -> Vec<Arc<Node>> {
        self.links
            .lock()
            .children
            .drain()
            .map(|(_, child)| child)
            .collect()
    }
}
