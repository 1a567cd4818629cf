//! Concurrent folder tree: handle, operations, lifecycle.

use std::collections::HashSet;
use std::fmt as StdFmt;
use std::sync::Arc;

use crate::node::Node;
use crate::path;
use crate::sync::LockCounters;

mod locking;
mod rename;

// ============================================================================
//  TreeError
// ============================================================================

/// Failure codes returned by the mutating operations.
///
/// `list` reports absence through `Option` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// The path failed syntactic validation.
    InvalidPath,

    /// The target name is already taken, or the target is the root.
    AlreadyExists,

    /// Some path component does not exist.
    NotFound,

    /// The folder still has children and cannot be removed.
    NotEmpty,

    /// The root cannot be removed or relocated.
    Busy,

    /// The move target lies inside the moved folder's own subtree.
    IntoOwnSubtree,
}

impl StdFmt::Display for TreeError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::InvalidPath => write!(f, "invalid path"),

            Self::AlreadyExists => write!(f, "folder already exists"),

            Self::NotFound => write!(f, "folder not found"),

            Self::NotEmpty => write!(f, "folder is not empty"),

            Self::Busy => write!(f, "the root folder cannot be removed or moved"),

            Self::IntoOwnSubtree => write!(f, "target lies inside the source subtree"),
        }
    }
}

impl std::error::Error for TreeError {}

// ============================================================================
//  DirTree
// ============================================================================

/// A shared, concurrently usable folder tree.
///
/// All operations take `&self`; the handle is `Send + Sync` and is
/// typically wrapped in an `Arc` and cloned across worker threads.
///
/// # Example
///
/// ```rust
/// use dirtree::DirTree;
///
/// let tree = DirTree::new();
/// tree.create("/a/").unwrap();
/// tree.create("/a/b/").unwrap();
///
/// assert_eq!(tree.list("/a/").as_deref(), Some("b"));
/// ```
pub struct DirTree {
    root: Arc<Node>,
}

impl DirTree {
    /// Create a tree holding only the root folder `/`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::new(None),
        }
    }

    /// List the contents of the folder at `path`.
    ///
    /// Returns the child names sorted and comma-joined, `None` when the
    /// path is invalid or no such folder exists. Only readers traverse,
    /// so any number of listings proceed in parallel.
    pub fn list(&self, path: &str) -> Option<String> {
        if !path::is_path_valid(path) {
            return None;
        }

        let node = locking::read_lock_path(&self.root, path)?;
        let contents = node.contents_string();
        locking::read_unlock_chain(&node);

        Some(contents)
    }

    /// Create an empty folder at `path`.
    ///
    /// The parent chain is read-locked and the parent itself
    /// write-locked for the insertion.
    pub fn create(&self, path: &str) -> Result<(), TreeError> {
        if !path::is_path_valid(path) {
            return Err(TreeError::InvalidPath);
        }
        let Some((parent_path, name)) = path::split_last(path) else {
            // The root always exists.
            return Err(TreeError::AlreadyExists);
        };

        let Some(parent) = locking::read_write_lock_path(&self.root, parent_path) else {
            return Err(TreeError::NotFound);
        };

        if parent.has_child(name) {
            locking::write_unlock_chain(&parent);
            return Err(TreeError::AlreadyExists);
        }

        let child = Node::new(Some(&parent));
        parent.insert_child(name, child);

        #[cfg(feature = "tracing")]
        tracing::debug!(path, "create: folder inserted");

        locking::write_unlock_chain(&parent);
        Ok(())
    }

    /// Remove the empty folder at `path`.
    ///
    /// Holding the parent's write lock keeps new traversers out of the
    /// victim; the subtree drain then waits out the ones already inside
    /// before the folder is inspected and detached.
    pub fn remove(&self, path: &str) -> Result<(), TreeError> {
        if !path::is_path_valid(path) {
            return Err(TreeError::InvalidPath);
        }
        let Some((parent_path, name)) = path::split_last(path) else {
            return Err(TreeError::Busy);
        };

        let Some(parent) = locking::read_write_lock_path(&self.root, parent_path) else {
            return Err(TreeError::NotFound);
        };

        let Some(victim) = parent.child(name) else {
            locking::write_unlock_chain(&parent);
            return Err(TreeError::NotFound);
        };

        victim.subtree_wait();

        if victim.child_count() > 0 {
            locking::write_unlock_chain(&parent);
            return Err(TreeError::NotEmpty);
        }

        parent.remove_child(name);
        drop(victim);

        #[cfg(feature = "tracing")]
        tracing::debug!(path, "remove: folder deleted");

        locking::write_unlock_chain(&parent);
        Ok(())
    }

    /// Walk the whole tree and panic on any violated structural or
    /// counter invariant.
    ///
    /// The walk takes no protocol locks; callers must guarantee no
    /// operation is in flight. Intended for tests and debugging.
    pub fn verify_invariants(&self) {
        let mut seen: HashSet<*const Node> = HashSet::new();
        let mut stack: Vec<Arc<Node>> = vec![Arc::clone(&self.root)];

        while let Some(node) = stack.pop() {
            assert!(
                seen.insert(Arc::as_ptr(&node)),
                "node reachable through two paths"
            );

            let counters = node.counters();
            assert_eq!(
                counters,
                LockCounters::default(),
                "node counters not quiescent"
            );

            for (name, child) in node.children_snapshot() {
                match child.parent() {
                    Some(back) => assert!(
                        Arc::ptr_eq(&back, &node),
                        "parent back-reference of {name:?} points elsewhere"
                    ),
                    None => panic!("child {name:?} has no parent back-reference"),
                }
                stack.push(child);
            }
        }
    }
}

impl Default for DirTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DirTree {
    /// Iterative teardown. `&mut self` proves no other thread can hold
    /// any lock; draining with an explicit stack keeps deep trees from
    /// overflowing the call stack during the chained `Arc` drops.
    fn drop(&mut self) {
        let mut stack = self.root.drain_children();
        while let Some(node) = stack.pop() {
            stack.append(&mut node.drain_children());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tree_has_empty_root() {
        let tree = DirTree::new();
        assert_eq!(tree.list("/").as_deref(), Some(""));
        tree.verify_invariants();
    }

    #[test]
    fn create_then_list() {
        let tree = DirTree::new();
        assert_eq!(tree.create("/a/"), Ok(()));
        assert_eq!(tree.create("/b/"), Ok(()));
        assert_eq!(tree.create("/a/x/"), Ok(()));

        assert_eq!(tree.list("/").as_deref(), Some("a,b"));
        assert_eq!(tree.list("/a/").as_deref(), Some("x"));
        assert_eq!(tree.list("/a/x/").as_deref(), Some(""));
        assert_eq!(tree.list("/a/x/y/"), None);
        tree.verify_invariants();
    }

    #[test]
    fn create_rejects_bad_paths_and_duplicates() {
        let tree = DirTree::new();
        assert_eq!(tree.create("//"), Err(TreeError::InvalidPath));
        assert_eq!(tree.create("/"), Err(TreeError::AlreadyExists));
        assert_eq!(tree.create("/a/b/c/"), Err(TreeError::NotFound));

        assert_eq!(tree.create("/a/"), Ok(()));
        assert_eq!(tree.create("/a/"), Err(TreeError::AlreadyExists));
        tree.verify_invariants();
    }

    #[test]
    fn remove_follows_the_protocol_codes() {
        let tree = DirTree::new();
        tree.create("/a/").unwrap();
        tree.create("/a/b/").unwrap();

        assert_eq!(tree.remove("/a/"), Err(TreeError::NotEmpty));
        assert_eq!(tree.remove("/a/b/"), Ok(()));
        assert_eq!(tree.remove("/a/"), Ok(()));
        assert_eq!(tree.remove("/a/"), Err(TreeError::NotFound));
        assert_eq!(tree.remove("/"), Err(TreeError::Busy));
        tree.verify_invariants();
    }

    #[test]
    fn create_remove_returns_to_prior_state() {
        let tree = DirTree::new();
        tree.create("/a/").unwrap();
        let before = tree.list("/a/");

        assert_eq!(tree.create("/a/x/"), Ok(()));
        assert_eq!(tree.remove("/a/x/"), Ok(()));

        assert_eq!(tree.list("/a/"), before);
        tree.verify_invariants();
    }

    #[test]
    fn deep_teardown_does_not_overflow() {
        let tree = DirTree::new();
        let mut path = String::from("/");
        for _ in 0..2000 {
            path.push_str("d/");
            tree.create(&path).unwrap();
        }
        drop(tree);
    }
}
