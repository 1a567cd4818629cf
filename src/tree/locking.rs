//! Hand-over-hand path locking.
//!
//! Traversal acquires locks root-to-leaf and keeps the entire chain
//! held; release walks leaf-to-root over the parent back-references.
//! No code path acquires an ancestor while holding only a descendant,
//! so concurrent traversals cannot form a wait cycle: the only upward
//! action is release, which never blocks.

use std::sync::Arc;

use crate::node::Node;
use crate::path;

/// Read-lock every node from `root` down to the folder at `path`.
///
/// At each hop the current node is locked first and the next component
/// looked up under that hold. On success the whole chain stays
/// read-locked and the terminal node is returned; on a missing
/// component every lock taken so far is released leaf-to-root and
/// `None` comes back.
pub(super) fn read_lock_path(root: &Arc<Node>, path: &str) -> Option<Arc<Node>> {
    root.read_lock();

    let mut current = Arc::clone(root);
    let mut rest = path;
    while let Some((name, tail)) = path::split_first(rest) {
        let Some(child) = current.child(name) else {
            read_unlock_chain(&current);
            return None;
        };
        child.read_lock();
        current = child;
        rest = tail;
    }

    Some(current)
}

/// Like [`read_lock_path`], but the terminal node is write-locked while
/// its ancestors stay read-locked. `path == "/"` write-locks `root`
/// itself.
pub(super) fn read_write_lock_path(root: &Arc<Node>, path: &str) -> Option<Arc<Node>> {
    let Some((first, rest)) = path::split_first(path) else {
        root.write_lock();
        return Some(Arc::clone(root));
    };

    root.read_lock();
    descend_write(Arc::clone(root), first, rest, None)
}

/// Write-terminal descent below `start`, whose write lock the caller
/// already holds.
///
/// `start` is never re-acquired and never released on rollback; the
/// first hop is looked up under the caller's hold. `path == "/"` yields
/// `start` itself.
pub(super) fn read_write_lock_path_from(start: &Arc<Node>, path: &str) -> Option<Arc<Node>> {
    let Some((first, rest)) = path::split_first(path) else {
        return Some(Arc::clone(start));
    };

    let child = start.child(first)?;
    let Some((next, tail)) = path::split_first(rest) else {
        child.write_lock();
        return Some(child);
    };

    child.read_lock();
    descend_write(child, next, tail, Some(start))
}

/// Shared descent loop. `current` is read-locked; `name` is the next
/// component to look up and `rest` the remainder after it. Rollback
/// releases down to `stop` exclusive, or the whole chain when `stop` is
/// absent.
fn descend_write<'a>(
    mut current: Arc<Node>,
    mut name: &'a str,
    mut rest: &'a str,
    stop: Option<&Arc<Node>>,
) -> Option<Arc<Node>> {
    loop {
        let Some(child) = current.child(name) else {
            rollback(&current, stop);
            return None;
        };

        if rest == "/" {
            child.write_lock();
            return Some(child);
        }

        child.read_lock();
        current = child;

        let Some((next, tail)) = path::split_first(rest) else {
            // Unreachable for valid input; rest keeps its trailing '/'.
            rollback(&current, stop);
            return None;
        };
        name = next;
        rest = tail;
    }
}

fn rollback(current: &Arc<Node>, stop: Option<&Arc<Node>>) {
    match stop {
        Some(stop) => read_unlock_chain_until(current, stop),
        None => read_unlock_chain(current),
    }
}

/// Read-unlock `node`, then each ancestor in turn up to and including
/// the root.
pub(super) fn read_unlock_chain(node: &Arc<Node>) {
    let mut current = Arc::clone(node);
    loop {
        current.read_unlock();
        let Some(up) = current.parent() else { break };
        current = up;
    }
}

/// Read-unlock `node` and its ancestors, halting at `stop` without
/// releasing it.
pub(super) fn read_unlock_chain_until(node: &Arc<Node>, stop: &Arc<Node>) {
    let mut current = Arc::clone(node);
    while !Arc::ptr_eq(&current, stop) {
        current.read_unlock();
        let Some(up) = current.parent() else { break };
        current = up;
    }
}

/// Release a chain produced by [`read_write_lock_path`]: the terminal
/// write hold first, then the read-locked ancestors leaf-to-root.
pub(super) fn write_unlock_chain(node: &Arc<Node>) {
    node.write_unlock();
    if let Some(up) = node.parent() {
        read_unlock_chain(&up);
    }
}
