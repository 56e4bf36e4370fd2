use serde::{Deserialize, Serialize};

/// A page in the link graph, identified by its URL and the hop count at which
/// it was first discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub url: String,
    pub depth: usize,
}

impl Node {
    pub fn root(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
        }
    }

    /// A neighbour one hop further from the start than `self`.
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: self.depth + 1,
        }
    }
}

/// `source` links to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: Node,
    pub target: Node,
}

impl Edge {
    pub fn new(source: Node, target: Node) -> Self {
        Self { source, target }
    }
}

/// What ended a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalOutcome {
    /// No queued or in-flight work remained.
    Quiesced,
    /// The caller's cancel token fired first.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub url: String,
    pub depth: usize,
    pub reason: String,
}

/// Bookkeeping collected alongside the edge stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalReport {
    pub outcome: TraversalOutcome,
    pub edges_emitted: usize,
    pub nodes_expanded: usize,
    pub depth_limited: usize,
    pub failures: Vec<ExtractionFailure>,
}

impl TraversalReport {
    pub fn new(outcome: TraversalOutcome) -> Self {
        Self {
            outcome,
            edges_emitted: 0,
            nodes_expanded: 0,
            depth_limited: 0,
            failures: Vec::new(),
        }
    }

    /// True when every dequeued node was either expanded or depth-limited.
    pub fn is_complete(&self) -> bool {
        self.outcome == TraversalOutcome::Quiesced && self.failures.is_empty()
    }
}
