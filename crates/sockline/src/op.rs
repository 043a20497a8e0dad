//! Pending asynchronous operations.
//!
//! Every `*_async` method registers an operation in its client's
//! [`PendingOps`] set and hands the caller an [`OperationHandle`]. The I/O
//! task resolves the operation exactly once — with its result, with the
//! error that ended it, or with [`OpOutcome::Cancelled`] when the client is
//! closed while the operation is still outstanding. The blocking API
//! variants are just the async variant plus [`OperationHandle::wait`].

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::SocketError;

new_key_type! {
    /// Identifier of a pending asynchronous operation.
    pub struct OpId;
}

/// The result of an asynchronous operation.
#[derive(Clone, Debug)]
pub enum OpOutcome {
    /// A connect completed and the socket is established.
    Connected,
    /// A bind completed; carries the bound local address.
    Bound(std::net::SocketAddr),
    /// A send completed; carries the number of bytes written.
    Sent(usize),
    /// A receive completed; carries the decoded text (possibly empty).
    Received(String),
    /// The operation was released without completing.
    Cancelled,
    /// The operation failed.
    Failed(SocketError),
}

impl OpOutcome {
    /// Whether this outcome represents a completed (non-failed) operation.
    pub fn is_success(&self) -> bool {
        !matches!(self, OpOutcome::Cancelled | OpOutcome::Failed(_))
    }
}

/// A handle to one in-flight asynchronous operation.
///
/// The handle does not cancel the operation when dropped; it is only a
/// waitable view of the completion.
#[derive(Debug)]
pub struct OperationHandle {
    id: OpId,
    rx: Receiver<OpOutcome>,
}

impl OperationHandle {
    /// The identifier this operation is registered under.
    pub fn id(&self) -> OpId {
        self.id
    }

    /// Block until the operation resolves.
    pub fn wait(&self) -> OpOutcome {
        self.rx.recv().unwrap_or(OpOutcome::Cancelled)
    }

    /// Block until the operation resolves or the timeout elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<OpOutcome> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Check for a resolution without blocking.
    pub fn try_wait(&self) -> Option<OpOutcome> {
        self.rx.try_recv().ok()
    }
}

/// The set of outstanding asynchronous operations of one client.
///
/// Registration and resolution are balanced on every path: completion
/// handlers remove the entry whether the operation succeeded, observed an
/// empty packet, or failed, and [`PendingOps::cancel_all`] resolves whatever
/// is left when the client closes. An operation is never resolved twice;
/// late completions for an already-cancelled id are ignored.
#[derive(Default)]
pub(crate) struct PendingOps {
    ops: Mutex<SlotMap<OpId, Sender<OpOutcome>>>,
}

impl PendingOps {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new operation, returning its id and the caller's handle.
    pub(crate) fn register(&self) -> (OpId, OperationHandle) {
        let (tx, rx) = bounded(1);
        let id = self.ops.lock().insert(tx);
        (id, OperationHandle { id, rx })
    }

    /// Resolve an operation and remove it from the set.
    ///
    /// Returns `false` if the id is no longer registered (already resolved
    /// or released by `cancel_all`).
    pub(crate) fn complete(&self, id: OpId, outcome: OpOutcome) -> bool {
        match self.ops.lock().remove(id) {
            Some(tx) => {
                // The waiter may have dropped its handle; that is fine.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Release every outstanding operation with [`OpOutcome::Cancelled`],
    /// clearing the set. Returns how many were released.
    pub(crate) fn cancel_all(&self) -> usize {
        let mut ops = self.ops.lock();
        let count = ops.len();
        for (_, tx) in ops.drain() {
            let _ = tx.send(OpOutcome::Cancelled);
        }
        count
    }

    /// Number of operations currently outstanding.
    pub(crate) fn len(&self) -> usize {
        self.ops.lock().len()
    }
}
