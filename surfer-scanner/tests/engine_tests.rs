// Traversal engine tests against in-memory link graphs

use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use surfer_scanner::error::Result;
use surfer_scanner::{
    CancelToken, Edge, LinkExtractor, SurfError, Surfer, SurferConfig, TraversalOutcome,
};

// ============================================================================
// Test graph
// ============================================================================

#[derive(Default)]
struct GraphExtractor {
    links: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    stalling: HashSet<String>,
    panicking: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl GraphExtractor {
    fn from_pairs(pairs: &[(&str, &[&str])]) -> Self {
        let links = pairs
            .iter()
            .map(|(source, targets)| {
                (
                    source.to_string(),
                    targets.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        Self {
            links,
            ..Self::default()
        }
    }

    fn failing_on(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    fn stalling_on(mut self, url: &str) -> Self {
        self.stalling.insert(url.to_string());
        self
    }

    fn panicking_on(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl LinkExtractor for GraphExtractor {
    async fn extract_links(&self, url: &str) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(url.to_string());
        tokio::task::yield_now().await;

        if self.stalling.contains(url) {
            std::future::pending::<()>().await;
        }
        if self.panicking.contains(url) {
            panic!("extractor blew up on {}", url);
        }
        if self.failing.contains(url) {
            return Err(SurfError::Other(format!("cannot fetch {}", url)));
        }
        Ok(self.links.get(url).cloned().unwrap_or_default())
    }
}

fn config(start: &str, max_depth: usize, workers: usize) -> SurferConfig {
    SurferConfig::new(start)
        .with_max_depth(max_depth)
        .with_max_concurrency(workers)
        .with_sample_interval(Duration::from_millis(10))
}

fn pairs(edges: &[Edge]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = edges
        .iter()
        .map(|e| (e.source.url.clone(), e.target.url.clone()))
        .collect();
    pairs.sort();
    pairs
}

fn owned(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = expected
        .iter()
        .map(|(s, t)| (s.to_string(), t.to_string()))
        .collect();
    pairs.sort();
    pairs
}

/// Binary tree of `size` nodes where every node also links back to its parent
/// and to the root, so each page is first reached along exactly one path.
fn tree_with_back_links(size: usize) -> GraphExtractor {
    let mut links = HashMap::new();
    for i in 0..size {
        let mut targets = Vec::new();
        for child in [2 * i + 1, 2 * i + 2] {
            if child < size {
                targets.push(format!("n{}", child));
            }
        }
        if i > 0 {
            targets.push(format!("n{}", (i - 1) / 2));
            targets.push("n0".to_string());
        }
        links.insert(format!("n{}", i), targets);
    }
    GraphExtractor {
        links,
        ..GraphExtractor::default()
    }
}

fn tree_depth(i: usize) -> usize {
    (usize::BITS - (i + 1).leading_zeros() - 1) as usize
}

// ============================================================================
// Concrete scenarios
// ============================================================================

#[tokio::test]
async fn test_diamond_expands_each_page_once() {
    let extractor = Arc::new(GraphExtractor::from_pairs(&[
        ("A", &["B", "C"]),
        ("B", &["C"]),
        ("C", &[]),
    ]));
    let surfer = Surfer::new(config("A", 2, 1), extractor.clone()).unwrap();

    let edges = surfer.collect().await.unwrap();

    assert_eq!(pairs(&edges), owned(&[("A", "B"), ("A", "C"), ("B", "C")]));
    let mut calls = extractor.calls();
    calls.sort();
    assert_eq!(calls, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_self_loop_is_emitted_once_and_not_reexpanded() {
    let extractor = Arc::new(GraphExtractor::from_pairs(&[("A", &["A"])]));
    let surfer = Surfer::new(config("A", 1, 2), extractor.clone()).unwrap();

    let edges = surfer.collect().await.unwrap();

    assert_eq!(pairs(&edges), owned(&[("A", "A")]));
    assert_eq!(edges[0].target.depth, 1);
    assert_eq!(extractor.calls(), vec!["A"]);
}

#[tokio::test]
async fn test_zero_depth_never_expands_start() {
    let extractor = Arc::new(GraphExtractor::from_pairs(&[("A", &["B"])]));
    let surfer = Surfer::new(config("A", 0, 4), extractor.clone()).unwrap();

    let (edges, report) = surfer.collect_with_report().await.unwrap();

    assert!(edges.is_empty());
    assert!(extractor.calls().is_empty());
    assert_eq!(report.outcome, TraversalOutcome::Quiesced);
    assert_eq!(report.nodes_expanded, 0);
    assert_eq!(report.depth_limited, 1);
}

#[tokio::test]
async fn test_failing_page_contributes_no_edges() {
    let extractor = Arc::new(
        GraphExtractor::from_pairs(&[
            ("A", &["X", "B"]),
            ("X", &["Y"]),
            ("B", &["D"]),
            ("D", &[]),
        ])
        .failing_on("X"),
    );
    let surfer = Surfer::new(config("A", 3, 3), extractor.clone()).unwrap();

    let (edges, report) = surfer.collect_with_report().await.unwrap();

    assert_eq!(pairs(&edges), owned(&[("A", "B"), ("A", "X"), ("B", "D")]));
    assert!(edges.iter().all(|e| e.source.url != "X"));
    assert_eq!(report.outcome, TraversalOutcome::Quiesced);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].url, "X");
    assert_eq!(report.failures[0].depth, 1);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_start_without_links_terminates_empty() {
    let extractor = GraphExtractor::from_pairs(&[("A", &[])]);
    let surfer = Surfer::new(config("A", 5, 8), extractor).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), surfer.collect())
        .await
        .expect("traversal should terminate");

    assert!(result.unwrap().is_empty());
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_complete_and_duplicate_free_at_any_concurrency() {
    const SIZE: usize = 63;
    const MAX_DEPTH: usize = 4;

    // Every link of every page shallower than the bound.
    let reference = tree_with_back_links(SIZE);
    let mut expected = Vec::new();
    for i in 0..SIZE {
        if tree_depth(i) < MAX_DEPTH {
            for target in &reference.links[&format!("n{}", i)] {
                expected.push((format!("n{}", i), target.clone()));
            }
        }
    }
    expected.sort();

    for workers in [1, 2, 3, 8, 32] {
        let extractor = Arc::new(tree_with_back_links(SIZE));
        let surfer = Surfer::new(config("n0", MAX_DEPTH, workers), extractor.clone()).unwrap();

        let (edges, report) = surfer.collect_with_report().await.unwrap();

        assert_eq!(pairs(&edges), expected, "edge set differs with {} workers", workers);
        assert_eq!(report.edges_emitted, expected.len());

        let calls = extractor.calls();
        let unique: HashSet<&String> = calls.iter().collect();
        assert_eq!(unique.len(), calls.len(), "duplicate expansion with {} workers", workers);
        assert_eq!(report.nodes_expanded, calls.len());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_depth_relation_holds_for_every_edge() {
    const MAX_DEPTH: usize = 3;
    let extractor = tree_with_back_links(63);
    let surfer = Surfer::new(config("n0", MAX_DEPTH, 6), extractor).unwrap();

    let edges = surfer.collect().await.unwrap();

    assert!(!edges.is_empty());
    for edge in &edges {
        assert_eq!(edge.target.depth, edge.source.depth + 1);
        assert!(edge.source.depth < MAX_DEPTH);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_first_discovery_fixes_depth() {
    // C is reachable at depth 1 and depth 2; whichever edge reaches the visited
    // set first decides, and C is expanded exactly once either way.
    let extractor = Arc::new(GraphExtractor::from_pairs(&[
        ("A", &["B", "C"]),
        ("B", &["C"]),
        ("C", &["D"]),
        ("D", &[]),
    ]));
    let surfer = Surfer::new(config("A", 5, 4), extractor.clone()).unwrap();

    let edges = surfer.collect().await.unwrap();

    let from_c: Vec<&Edge> = edges.iter().filter(|e| e.source.url == "C").collect();
    assert_eq!(from_c.len(), 1);
    assert_eq!(
        extractor.calls().iter().filter(|url| *url == "C").count(),
        1
    );
}

// ============================================================================
// Streaming and cancellation
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stream_yields_same_edges_as_collect() {
    let surfer = Surfer::new(config("n0", 3, 4), tree_with_back_links(31)).unwrap();

    let collected = surfer.collect().await.unwrap();
    let streamed: Vec<Edge> = surfer.stream().collect().await;

    assert_eq!(pairs(&streamed), pairs(&collected));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unread_stream_blocks_workers() {
    let children: Vec<String> = (0..20).map(|i| format!("c{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    let extractor = Arc::new(GraphExtractor::from_pairs(&[("root", &child_refs)]));
    let surfer = Surfer::new(
        config("root", 2, 4).with_result_buffer(1),
        extractor.clone(),
    )
    .unwrap();

    let mut stream = surfer.stream();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Root is stuck on its second edge; at most the first child got through.
    assert!(extractor.calls().len() <= 2);

    let mut received = 0;
    while stream.next().await.is_some() {
        received += 1;
    }
    assert_eq!(received, 20);

    let report = stream.finish().await.unwrap();
    assert_eq!(report.outcome, TraversalOutcome::Quiesced);
    assert_eq!(extractor.calls().len(), 21);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_stops_stalled_traversal() {
    let extractor = GraphExtractor::from_pairs(&[("A", &["B", "C", "D"]), ("C", &["E"])])
        .stalling_on("B")
        .stalling_on("D");
    let token = CancelToken::new();
    let surfer = Surfer::new(config("A", 4, 3), extractor)
        .unwrap()
        .with_cancel_token(token.clone());

    let mut stream = surfer.stream();
    let first = stream.next().await.expect("at least one edge before cancelling");
    assert_eq!(first.source.url, "A");

    token.cancel();

    let report = tokio::time::timeout(Duration::from_secs(2), stream.finish())
        .await
        .expect("cancellation should not hang")
        .unwrap();
    assert_eq!(report.outcome, TraversalOutcome::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancellation_releases_workers_blocked_on_results() {
    let children: Vec<String> = (0..500).map(|i| format!("c{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    let extractor = GraphExtractor::from_pairs(&[("root", &child_refs)]);
    let token = CancelToken::new();
    let surfer = Surfer::new(config("root", 2, 8).with_result_buffer(1), extractor)
        .unwrap()
        .with_cancel_token(token.clone());

    let mut stream = surfer.stream();
    stream.next().await.expect("first edge");
    // Let the root worker fill the buffer and park on the next push.
    tokio::time::sleep(Duration::from_millis(100)).await;

    token.cancel();

    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        let mut late = 0;
        while stream.next().await.is_some() {
            late += 1;
        }
        late
    })
    .await
    .expect("stream should close after cancel");
    assert!(drained <= 2, "{} edges arrived after cancel", drained);

    let report = stream.finish().await.unwrap();
    assert_eq!(report.outcome, TraversalOutcome::Cancelled);
    assert!(report.edges_emitted < 500);
}

#[tokio::test]
async fn test_cancel_after_quiescence_keeps_outcome() {
    let token = CancelToken::new();
    let surfer = Surfer::new(
        config("A", 2, 2),
        GraphExtractor::from_pairs(&[("A", &["B"]), ("B", &[])]),
    )
    .unwrap()
    .with_cancel_token(token.clone());

    let mut stream = surfer.stream();
    let mut received = 0;
    while stream.next().await.is_some() {
        received += 1;
    }
    assert_eq!(received, 1);

    // The stream only closes once the traversal has already quiesced.
    token.cancel();

    let report = stream.finish().await.unwrap();
    assert_eq!(report.outcome, TraversalOutcome::Quiesced);
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_worker_panic_surfaces_as_join_error() {
    let extractor = GraphExtractor::from_pairs(&[("A", &["B", "C"]), ("C", &["D"])])
        .panicking_on("B");
    let surfer = Surfer::new(config("A", 3, 2), extractor).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), surfer.collect_with_report())
        .await
        .expect("a panicking worker should not hang the traversal");

    assert!(matches!(result, Err(SurfError::JoinError(_))));
}

#[tokio::test]
async fn test_cancelled_before_start_yields_nothing() {
    let token = CancelToken::new();
    token.cancel();
    let surfer = Surfer::new(config("A", 3, 2), GraphExtractor::from_pairs(&[("A", &["B"])]))
        .unwrap()
        .with_cancel_token(token);

    let (edges, report) = tokio::time::timeout(Duration::from_secs(2), surfer.collect_with_report())
        .await
        .expect("should not hang")
        .unwrap();

    assert!(edges.is_empty());
    assert_eq!(report.outcome, TraversalOutcome::Cancelled);
}

#[tokio::test]
async fn test_invocations_do_not_share_visited_state() {
    let extractor = Arc::new(GraphExtractor::from_pairs(&[("A", &["B"]), ("B", &[])]));
    let surfer = Surfer::new(config("A", 2, 2), extractor.clone()).unwrap();

    let first = surfer.collect().await.unwrap();
    let second = surfer.collect().await.unwrap();

    assert_eq!(pairs(&first), pairs(&second));
    assert_eq!(extractor.calls().len(), 4);
}

#[test]
fn test_rejects_zero_workers() {
    let result = Surfer::new(config("A", 1, 0), GraphExtractor::default());
    assert!(matches!(result, Err(SurfError::InvalidConfig(_))));
}
