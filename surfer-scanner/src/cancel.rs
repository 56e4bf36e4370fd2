use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Cooperative cancellation signal shared by every task of a traversal.
///
/// Cloning a token yields a handle to the same signal. A token made with
/// [`CancelToken::child`] fires when its parent does, but cancelling the
/// child leaves the parent untouched.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    flag: watch::Sender<bool>,
    children: Mutex<Vec<Arc<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag,
            children: Mutex::new(Vec::new()),
        }
    }

    fn children(&self) -> MutexGuard<'_, Vec<Arc<Inner>>> {
        self.children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cancel(&self) {
        if self.flag.send_replace(true) {
            return;
        }
        let children = std::mem::take(&mut *self.children());
        for child in children {
            child.cancel();
        }
    }

    /// A child nobody can observe any more: no handle and no descendants.
    fn is_abandoned(node: &Arc<Inner>) -> bool {
        Arc::strong_count(node) == 1 && node.children().is_empty()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    pub fn child(&self) -> Self {
        let child = Arc::new(Inner::new());
        {
            let mut children = self.inner.children();
            children.retain(|c| !Inner::is_abandoned(c));
            children.push(child.clone());
        }
        // The flag is set before the parent drains its children, so a child
        // registered after that drain sees it here.
        if self.is_cancelled() {
            child.cancel();
        }
        Self { inner: child }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.flag.borrow()
    }

    /// Resolves once this token or any ancestor has been cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.flag.subscribe();
        // The sender lives in `self.inner`, so this only returns once the flag is set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
