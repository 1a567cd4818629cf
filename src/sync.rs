//! Per-node reader/writer/subtree lock.
//!
//! [`NodeLock`] is the synchronization primitive carried by every folder
//! node. Three disciplines compose on one node:
//!
//! 1. Readers: any number may hold the node concurrently.
//! 2. Writer: exclusive against readers and other writers.
//! 3. Subtree waiter: blocks until the node's `subtree_count` drops to
//!    exactly 1, meaning the waiter is the only protocol participant
//!    left accounted on the node.
//!
//! # Counter semantics
//!
//! `subtree_count` is a coarse ticket: every acquisition (read or write)
//! and every [`NodeLock::subtree_wait`] call increments it on entry and
//! decrements it on release. Because a traversal keeps its whole
//! ancestor chain locked, a node's count covers every operation inside
//! its subtree.
//!
//! # Fairness
//!
//! New readers yield to a waiting writer (`write_wait > 0` blocks
//! entry), which prevents writer starvation. A finishing writer hands
//! off to the waiting reader group: it wakes one reader, and each
//! admitted reader wakes the next (cascade), converting a broadcast
//! into a chain of unicasts. Writers queue on the condition variable's
//! own order; no stronger fairness is claimed.
//!
//! # Errors
//!
//! There are none. `parking_lot` primitives neither poison nor fail,
//! and protocol misuse (an unpaired release) is a programming error
//! caught by `debug_assert!`.

use parking_lot::{Condvar, Mutex};



/// Snapshot of a node's counter state.
///
/// All counters are zero on an idle node; tests and the tree-level
/// invariant verifier rely on that quiescent shape.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockCounters {
    /// Readers currently holding the node.
    pub read_count: u32,
    /// Writers currently holding the node (0 or 1).
    pub write_count: u32,
    /// Readers blocked waiting for admission.
    pub read_wait: u32,
    /// Writers blocked waiting for admission.
    pub write_wait: u32,
    /// Protocol participants accounted on this node, waiters included.
    pub subtree_count: u32,
}

/// Reader/writer lock with a subtree-drain wait.
#[derive(Debug, Default)]
pub struct NodeLock {
    state: Mutex<LockCounters>,
    read_cv: Condvar,
    write_cv: Condvar,
    subtree_cv: Condvar,
}

impl NodeLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the node in shared mode.
    ///
    /// Blocks while a writer holds the node or is waiting for it. Once a
    /// departing writer admits the reader group, each admitted reader
    /// wakes the next; the re-check after wakeup looks only at
    /// `write_count` so the whole group enters even if a fresh writer
    /// has queued up in the meantime.
    pub fn read_lock(&self) {
        let mut state = self.state.lock();
        state.subtree_count += 1;
        if state.write_count > 0 || state.write_wait > 0 {
            state.read_wait += 1;
            loop {
                self.read_cv.wait(&mut state);
                if state.write_count == 0 {
                    break;
                }
            }
            state.read_wait -= 1;
        }
        state.read_count += 1;
        // Cascade wake: admit the next queued reader, if any.
        self.read_cv.notify_one();
    }

    /// Release a shared hold.
    pub fn read_unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.read_count > 0, "read_unlock without read_lock");
        state.read_count -= 1;
        if state.read_count == 0 {
            self.write_cv.notify_one();
        }
        state.subtree_count -= 1;
        if state.subtree_count <= 1 {
            self.subtree_cv.notify_one();
        }
    }

    /// Acquire the node exclusively.
    pub fn write_lock(&self) {
        let mut state = self.state.lock();
        state.subtree_count += 1;
        while state.write_count > 0 || state.read_count > 0 {
            state.write_wait += 1;
            self.write_cv.wait(&mut state);
            state.write_wait -= 1;
        }
        state.write_count = 1;
    }

    /// Release an exclusive hold.
    ///
    /// Waiting readers take precedence over waiting writers on the way
    /// out; the single wake starts the reader cascade.
    pub fn write_unlock(&self) {
        let mut state = self.state.lock();
        debug_assert_eq!(state.write_count, 1, "write_unlock without write_lock");
        state.write_count = 0;
        if state.read_wait > 0 {
            self.read_cv.notify_one();
        } else {
            self.write_cv.notify_one();
        }
        state.subtree_count -= 1;
        if state.subtree_count <= 1 {
            self.subtree_cv.notify_one();
        }
    }

    /// Block until this node's subtree is quiescent.
    ///
    /// The caller must hold the write lock of the node's parent, which
    /// keeps new traversers out of the subtree and bounds the wait by
    /// the in-flight operations' completion. At most one thread may wait
    /// on a given node at a time; the parent's write lock guarantees
    /// that too.
    pub fn subtree_wait(&self) {
        let mut state = self.state.lock();
        state.subtree_count += 1;
        while state.subtree_count > 1 {
            self.subtree_cv.wait(&mut state);
        }
        state.subtree_count -= 1;
    }

    /// Snapshot the counters.
    #[must_use]
    pub fn counters(&self) -> LockCounters {
        *self.state.lock()
    }

    /// True when every counter is zero.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.counters() == LockCounters::default()
    }
}
