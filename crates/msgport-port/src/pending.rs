use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::envelope::RequestId;
use crate::error::PortError;

pub(crate) type Settle = oneshot::Sender<Result<Value, PortError>>;

/// Bookkeeping for one outstanding request.
///
/// Removing an entry from its table is what grants the right to settle it,
/// so an entry settles at most once.
pub(crate) struct PendingEntry {
    settle: Settle,
    created_at: Instant,
    timer: Option<AbortHandle>,
}

impl PendingEntry {
    pub(crate) fn new(settle: Settle, timer: Option<AbortHandle>) -> Self {
        Self {
            settle,
            created_at: Instant::now(),
            timer,
        }
    }

    pub(crate) fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Called from the entry's own timer task, which must not abort itself.
    pub(crate) fn disarm(&mut self) {
        self.timer = None;
    }

    pub(crate) fn settle(self, outcome: Result<Value, PortError>) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        // The caller may have dropped its reply already.
        let _ = self.settle.send(outcome);
    }
}

/// Outstanding requests of one port, keyed by correlation id.
pub(crate) struct PendingTable {
    entries: HashMap<RequestId, PendingEntry>,
    next_id: RequestId,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Next id not currently pending. Ids start at 1 and skip 0 on wrap.
    pub(crate) fn allocate_id(&mut self) -> RequestId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    pub(crate) fn insert(&mut self, id: RequestId, entry: PendingEntry) {
        let previous = self.entries.insert(id, entry);
        debug_assert!(previous.is_none(), "correlation id {id} reused while pending");
    }

    pub(crate) fn remove(&mut self, id: RequestId) -> Option<PendingEntry> {
        self.entries.remove(&id)
    }

    pub(crate) fn drain(&mut self) -> Vec<(RequestId, PendingEntry)> {
        self.entries.drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
