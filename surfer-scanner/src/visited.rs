use std::collections::HashSet;
use tokio::sync::Mutex;

/// URLs already claimed by some worker during one traversal.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that already contains `url`, used for the start node.
    pub fn with_seed(url: &str) -> Self {
        let mut seen = HashSet::new();
        seen.insert(url.to_string());
        Self {
            seen: Mutex::new(seen),
        }
    }

    /// Test-and-set. Returns `true` only for the single caller that inserted `url`.
    pub async fn insert(&self, url: &str) -> bool {
        let mut seen = self.seen.lock().await;
        if seen.contains(url) {
            false
        } else {
            seen.insert(url.to_string())
        }
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.seen.lock().await.contains(url)
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }
}
