//! Callback-coordinated operation registry.
//!
//! Lets a caller issue a remote request, suspend until an out-of-band
//! callback reports completion (or a timeout/cancellation fires), and take
//! the result exactly once.
//!
//! # Lifecycle
//!
//! ```text
//! register(id) ──→ [send remote request] ──→ await_completion(id, timeout)
//!                                                 │
//!        resolve(id, r) ─────────────────────────→ Completed(r)
//!        cancel(id)     ─────────────────────────→ Cancelled
//!        (nothing)      ─── timeout elapses ─────→ TimedOut
//! ```
//!
//! Every pending operation owns a single-assignment channel created at
//! registration, so a callback that arrives before the caller starts waiting
//! is buffered rather than lost. The entry is removed when the wait ends,
//! whatever the outcome, including when the waiting future is dropped.

use crate::error::RegistryError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// How a wait on a pending operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome<R> {
    /// The callback delivered a result.
    Completed(R),
    /// No callback arrived before the timeout.
    TimedOut,
    /// The operation was cancelled locally.
    Cancelled,
}

impl<R> CallbackOutcome<R> {
    pub fn is_completed(&self) -> bool {
        matches!(self, CallbackOutcome::Completed(_))
    }
}

enum Signal<R> {
    Resolved(R),
    Cancelled,
}

struct PendingOperation<R> {
    generation: u64,
    sender: Option<oneshot::Sender<Signal<R>>>,
    receiver: Option<oneshot::Receiver<Signal<R>>>,
}

/// Process-wide map from operation id to a pending result slot.
///
/// Map insert/remove take a shard lock only briefly; the wait itself holds no
/// lock, so unrelated operations never serialize behind a slow callback.
pub struct CallbackRegistry<R> {
    pending: DashMap<String, PendingOperation<R>>,
    next_generation: AtomicU64,
}

impl<R: Send> CallbackRegistry<R> {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Create the pending slot for `op_id`.
    ///
    /// Must happen before the remote request referencing `op_id` is sent.
    /// A second registration of a live id is a caller bug: it fails and the
    /// existing entry is left untouched.
    pub fn register(&self, op_id: &str) -> Result<(), RegistryError> {
        match self.pending.entry(op_id.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered {
                op_id: op_id.to_string(),
            }),
            Entry::Vacant(entry) => {
                let (sender, receiver) = oneshot::channel();
                entry.insert(PendingOperation {
                    generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                    sender: Some(sender),
                    receiver: Some(receiver),
                });
                Ok(())
            }
        }
    }

    /// Deliver the callback result for `op_id`.
    ///
    /// Returns `true` when the result was stored. Unknown, cancelled or
    /// already-resolved ids are ignored and return `false`; the callback
    /// sender is never told about it.
    pub fn resolve(&self, op_id: &str, result: R) -> bool {
        let sender = match self.pending.get_mut(op_id) {
            Some(mut op) => op.sender.take(),
            None => None,
        };
        match sender {
            Some(sender) => sender.send(Signal::Resolved(result)).is_ok(),
            None => false,
        }
    }

    /// Suspend until `op_id` is resolved, cancelled, or `timeout` elapses.
    ///
    /// The entry is removed before this returns. Only one caller may wait on
    /// a given registration.
    pub async fn await_completion(
        &self,
        op_id: &str,
        timeout: Duration,
    ) -> Result<CallbackOutcome<R>, RegistryError> {
        let (receiver, generation) = {
            let mut op = self
                .pending
                .get_mut(op_id)
                .ok_or_else(|| RegistryError::NotRegistered {
                    op_id: op_id.to_string(),
                })?;
            let receiver = op
                .receiver
                .take()
                .ok_or_else(|| RegistryError::AlreadyAwaited {
                    op_id: op_id.to_string(),
                })?;
            (receiver, op.generation)
        };

        let _cleanup = PendingCleanup {
            pending: &self.pending,
            op_id,
            generation,
        };

        let outcome = match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(Signal::Resolved(result))) => CallbackOutcome::Completed(result),
            Ok(Ok(Signal::Cancelled)) | Ok(Err(_)) => CallbackOutcome::Cancelled,
            Err(_) => CallbackOutcome::TimedOut,
        };
        Ok(outcome)
    }

    /// Drop the pending slot for `op_id` and wake any waiter with `Cancelled`.
    ///
    /// Returns `false` when nothing was registered under `op_id`. A result
    /// already delivered before the cancel still reaches the waiter.
    pub fn cancel(&self, op_id: &str) -> bool {
        match self.pending.remove(op_id) {
            Some((_, mut op)) => {
                if let Some(sender) = op.sender.take() {
                    let _ = sender.send(Signal::Cancelled);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, op_id: &str) -> bool {
        self.pending.contains_key(op_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<R: Send> Default for CallbackRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for CallbackRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Removes the entry a waiter owned once the wait ends or is abandoned.
/// A newer registration under the same id is left alone.
struct PendingCleanup<'a, R> {
    pending: &'a DashMap<String, PendingOperation<R>>,
    op_id: &'a str,
    generation: u64,
}

impl<R> Drop for PendingCleanup<'_, R> {
    fn drop(&mut self) {
        self.pending
            .remove_if(self.op_id, |_, op| op.generation == self.generation);
    }
}

// =============================================================================
// TESTS
// =============================================================================
