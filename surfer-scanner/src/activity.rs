use std::sync::atomic::{AtomicUsize, Ordering};

/// Liveness counters for one traversal.
///
/// `active` is the number of workers currently inside a unit of work.
/// `pending` counts nodes admitted to the frontier that have not yet been
/// fully processed, whether they sit in the relay backlog, in the work queue
/// or in a worker's hands. A node is admitted before it is handed to the relay
/// and settled only after all of its edges and neighbours have been delivered,
/// so `pending == 0` means the frontier can no longer grow.
#[derive(Debug, Default)]
pub struct Activity {
    active: AtomicUsize,
    pending: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySnapshot {
    pub active: usize,
    pub pending: usize,
}

impl Activity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn admit(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn settle(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn is_quiescent(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        ActivitySnapshot {
            active: self.active.load(Ordering::SeqCst),
            pending: self.pending.load(Ordering::SeqCst),
        }
    }
}
