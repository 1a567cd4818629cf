//! The move operation.
//!
//! Relocating a folder touches two positions at once, so `rename`
//! pivots on the lowest common ancestor of the two parent paths: the
//! pivot is write-locked, both parents are reached by bounded descents
//! from it, and the relink happens under all three write holds. Both
//! descents run strictly downward from a node held in write mode, so
//! the two-path operation keeps the tree-wide downward lock order.

use std::sync::Arc;

use crate::node::Node;
use crate::path;

use super::locking;
use super::{DirTree, TreeError};

impl DirTree {
    /// Move the folder at `source` to the position named by `target`.
    ///
    /// The folder keeps its identity and its entire subtree; only the
    /// links in the two parents and the folder's own parent reference
    /// change. Moving a folder to itself succeeds without effect;
    /// moving it into its own subtree fails with
    /// [`TreeError::IntoOwnSubtree`], a purely syntactic verdict
    /// reached before any lock is taken.
    pub fn rename(&self, source: &str, target: &str) -> Result<(), TreeError> {
        if !path::is_path_valid(source) || !path::is_path_valid(target) {
            return Err(TreeError::InvalidPath);
        }
        let Some((source_parent_path, source_name)) = path::split_last(source) else {
            return Err(TreeError::Busy);
        };
        let Some((target_parent_path, target_name)) = path::split_last(target) else {
            return Err(TreeError::AlreadyExists);
        };

        if path::is_proper_prefix(source, target) {
            return Err(TreeError::IntoOwnSubtree);
        }

        // Aliasing cases: one path on the other's ancestor line. Both
        // need a presence check, so both lock.
        if source == target {
            let Some(node) = locking::read_lock_path(&self.root, source) else {
                return Err(TreeError::NotFound);
            };
            locking::read_unlock_chain(&node);
            return Ok(());
        }
        if path::is_proper_prefix(target, source) {
            // The target position is a strict ancestor of the source,
            // so it is either occupied or some component of it is
            // missing, and then the deeper source is missing too.
            let Some(node) = locking::read_lock_path(&self.root, target) else {
                return Err(TreeError::NotFound);
            };
            locking::read_unlock_chain(&node);
            return Err(TreeError::AlreadyExists);
        }

        // General case: neither path prefixes the other, so the two
        // descents from the pivot diverge immediately and never meet.
        let pivot_path = path::common_prefix(source_parent_path, target_parent_path);
        let Some(pivot) = locking::read_write_lock_path(&self.root, pivot_path) else {
            return Err(TreeError::NotFound);
        };

        let source_rel = &source_parent_path[pivot_path.len() - 1..];
        let Some(source_parent) = locking::read_write_lock_path_from(&pivot, source_rel) else {
            locking::write_unlock_chain(&pivot);
            return Err(TreeError::NotFound);
        };

        let Some(moved) = source_parent.child(source_name) else {
            release_branch(&source_parent, &pivot);
            locking::write_unlock_chain(&pivot);
            return Err(TreeError::NotFound);
        };

        // The parent's write hold keeps new traversers out; wait out
        // the ones already inside the folder being moved.
        moved.subtree_wait();

        let target_rel = &target_parent_path[pivot_path.len() - 1..];
        let Some(target_parent) = locking::read_write_lock_path_from(&pivot, target_rel) else {
            release_branch(&source_parent, &pivot);
            locking::write_unlock_chain(&pivot);
            return Err(TreeError::NotFound);
        };

        if target_parent.has_child(target_name) {
            release_branch(&source_parent, &pivot);
            release_branch(&target_parent, &pivot);
            locking::write_unlock_chain(&pivot);
            return Err(TreeError::AlreadyExists);
        }

        // Relink under the held write locks. The moved subtree is not
        // walked: it is drained, and after the relink every future
        // traverser reaches it through the target side.
        source_parent.remove_child(source_name);
        target_parent.insert_child(target_name, Arc::clone(&moved));
        moved.set_parent(&target_parent);

        #[cfg(feature = "tracing")]
        tracing::debug!(source, target, "rename: folder relinked");

        release_branch(&source_parent, &pivot);
        release_branch(&target_parent, &pivot);
        locking::write_unlock_chain(&pivot);
        Ok(())
    }
}

/// Release one descent branch: the parent's write hold, then its
/// read-locked ancestors up to the pivot exclusive. A branch that is
/// the pivot itself is left for the caller's pivot release.
fn release_branch(parent: &Arc<Node>, pivot: &Arc<Node>) {
    if Arc::ptr_eq(parent, pivot) {
        return;
    }
    parent.write_unlock();
    if let Some(up) = parent.parent() {
        locking::read_unlock_chain_until(&up, pivot);
    }
}
