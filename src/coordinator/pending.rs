//! Replies awaited from one worker, keyed by request id.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::ipc::RoutedReply;

/// Outstanding requests sent to a single worker.
///
/// Once the worker channel closes the table stops accepting registrations and
/// every waiter is answered with "Worker unavailable".
#[derive(Debug, Default)]
pub struct PendingReplies {
    slots: DashMap<Uuid, oneshot::Sender<RoutedReply>>,
    closed: AtomicBool,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for `id`. Returns `None` if the channel is closed.
    pub fn register(&self, id: Uuid) -> Option<oneshot::Receiver<RoutedReply>> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);

        // `close` flips the flag before draining, so a slot inserted after the
        // drain always observes it here.
        if self.closed.load(Ordering::SeqCst) {
            self.slots.remove(&id);
            return None;
        }
        Some(rx)
    }

    /// Hand `reply` to the waiter for `id`. False if nobody is waiting.
    pub fn complete(&self, id: Uuid, reply: RoutedReply) -> bool {
        match self.slots.remove(&id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    pub fn cancel(&self, id: Uuid) {
        self.slots.remove(&id);
    }

    /// Refuse new slots and fail every outstanding one. Returns how many.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);

        let ids: Vec<Uuid> = self.slots.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, tx)) = self.slots.remove(&id) {
                let _ = tx.send(RoutedReply::worker_unavailable());
                failed += 1;
            }
        }
        failed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
