use crate::activity::Activity;
use crate::cancel::CancelToken;
use crate::config::SurferConfig;
use crate::error::{Result, SurfError};
use crate::extractor::LinkExtractor;
use crate::model::{Edge, ExtractionFailure, Node, TraversalOutcome, TraversalReport};
use crate::quiescence::QuiescenceDetector;
use crate::relay::FrontierRelay;
use crate::visited::VisitedSet;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Capacity of the queue workers dequeue from. Kept at the minimum so the
/// relay, not the queue, holds the frontier.
const WORK_QUEUE_CAPACITY: usize = 1;

/// Concurrency-bounded, depth-limited breadth-first traversal of a link graph.
pub struct Surfer<E> {
    config: SurferConfig,
    extractor: Arc<E>,
    cancel: CancelToken,
}

impl<E: LinkExtractor> Surfer<E> {
    pub fn new(config: SurferConfig, extractor: E) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            extractor: Arc::new(extractor),
            cancel: CancelToken::new(),
        })
    }

    /// Use `token` to stop traversals started from now on.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Runs a traversal to completion and returns every edge it emitted.
    pub async fn collect(&self) -> Result<Vec<Edge>> {
        let (edges, _) = self.collect_with_report().await?;
        Ok(edges)
    }

    pub async fn collect_with_report(&self) -> Result<(Vec<Edge>, TraversalReport)> {
        let mut stream = self.stream();
        let mut edges = Vec::new();
        while let Some(edge) = stream.next().await {
            edges.push(edge);
        }
        let report = stream.finish().await?;
        Ok((edges, report))
    }

    /// Starts a traversal and hands back its live edge stream.
    ///
    /// Must be called from within a tokio runtime. Each call is an independent
    /// traversal with its own visited set and counters.
    pub fn stream(&self) -> EdgeStream {
        let config = &self.config;
        info!(
            "Starting traversal of {} (max depth {}, {} workers)",
            config.start_url, config.max_depth, config.max_concurrency
        );

        // `stop` fires on quiescence or when the caller's token does.
        let stop = self.cancel.child();
        let activity = Arc::new(Activity::new());
        let ledger = Arc::new(Ledger::default());

        let (inlet_tx, inlet_rx) = mpsc::channel(config.max_concurrency);
        let (queue_tx, queue_rx) = mpsc::channel(WORK_QUEUE_CAPACITY);
        let (edge_tx, edge_rx) = mpsc::channel(config.result_buffer);

        let seed = Node::root(config.start_url.clone());
        activity.admit();

        let context = Arc::new(WorkerContext {
            extractor: self.extractor.clone(),
            max_depth: config.max_depth,
            visited: VisitedSet::with_seed(&seed.url),
            activity: activity.clone(),
            ledger: ledger.clone(),
            queue: Mutex::new(queue_rx),
            inlet: inlet_tx,
            edges: edge_tx,
            stop: stop.clone(),
        });

        let relay = FrontierRelay::new(inlet_rx, queue_tx)
            .with_seed(seed)
            .spawn(stop.clone());
        let detector =
            QuiescenceDetector::new(activity, config.sample_interval).spawn(stop.clone());

        let mut workers = JoinSet::new();
        for worker_id in 0..config.max_concurrency {
            workers.spawn(run_worker(worker_id, context.clone()));
        }
        // Workers hold the only remaining senders, so the edge stream closes when they exit.
        drop(context);

        let supervisor = tokio::spawn(supervise(
            workers,
            relay,
            detector,
            ledger,
            stop.clone(),
        ));

        EdgeStream {
            edges: edge_rx,
            supervisor: Some(supervisor),
            stop,
            cancel: self.cancel.clone(),
        }
    }
}

/// Live edges of a running traversal.
///
/// Edges arrive in discovery order, which depends on scheduling. A stream that
/// is not read eventually blocks the workers. Dropping the stream stops the
/// traversal.
pub struct EdgeStream {
    edges: mpsc::Receiver<Edge>,
    supervisor: Option<JoinHandle<Result<TraversalReport>>>,
    stop: CancelToken,
    cancel: CancelToken,
}

impl EdgeStream {
    /// Next edge, or `None` once the traversal has quiesced or been cancelled.
    pub async fn next(&mut self) -> Option<Edge> {
        self.edges.recv().await
    }

    /// The caller-facing token for this traversal.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Discards any unread edges, waits for every task to exit and returns the report.
    pub async fn finish(mut self) -> Result<TraversalReport> {
        while self.edges.recv().await.is_some() {}
        match self.supervisor.take() {
            Some(supervisor) => supervisor.await?,
            None => Err(SurfError::Other("traversal already finished".to_string())),
        }
    }
}

impl Stream for EdgeStream {
    type Item = Edge;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Edge>> {
        self.get_mut().edges.poll_recv(cx)
    }
}

impl Drop for EdgeStream {
    fn drop(&mut self) {
        if self.supervisor.is_some() {
            self.stop.cancel();
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    edges_emitted: AtomicUsize,
    nodes_expanded: AtomicUsize,
    depth_limited: AtomicUsize,
    failures: Mutex<Vec<ExtractionFailure>>,
}

struct WorkerContext<E> {
    extractor: Arc<E>,
    max_depth: usize,
    visited: VisitedSet,
    activity: Arc<Activity>,
    ledger: Arc<Ledger>,
    queue: Mutex<mpsc::Receiver<Node>>,
    inlet: mpsc::Sender<Node>,
    edges: mpsc::Sender<Edge>,
    stop: CancelToken,
}

/// Why a worker abandoned a node part-way through.
enum Interrupted {
    Stopped,
    ConsumerGone,
}

async fn run_worker<E: LinkExtractor>(worker_id: usize, context: Arc<WorkerContext<E>>) {
    debug!("Worker {} started", worker_id);

    loop {
        let next = tokio::select! {
            biased;
            _ = context.stop.cancelled() => None,
            node = async { context.queue.lock().await.recv().await } => node,
        };
        let Some(node) = next else {
            break;
        };

        context.activity.enter();
        let processed = context.process(worker_id, &node).await;
        context.activity.settle();
        context.activity.exit();

        match processed {
            Ok(()) => {}
            Err(Interrupted::Stopped) => break,
            Err(Interrupted::ConsumerGone) => {
                debug!("Worker {}: edge consumer went away, stopping", worker_id);
                context.stop.cancel();
                break;
            }
        }
    }

    debug!("Worker {} finished", worker_id);
}

impl<E: LinkExtractor> WorkerContext<E> {
    async fn process(&self, worker_id: usize, node: &Node) -> std::result::Result<(), Interrupted> {
        // Only the start node can get here, when max_depth is 0; deeper nodes at the
        // bound are never forwarded.
        if node.depth >= self.max_depth {
            debug!(
                "[Worker {}] {} is at depth {}, not expanding",
                worker_id, node.url, node.depth
            );
            self.ledger.depth_limited.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let extracted = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return Err(Interrupted::Stopped),
            links = self.extractor.extract_links(&node.url) => links,
        };

        let links = match extracted {
            Ok(links) => links,
            Err(e) => {
                warn!("Extraction failed for {}: {}", node.url, e);
                self.ledger.failures.lock().await.push(ExtractionFailure {
                    url: node.url.clone(),
                    depth: node.depth,
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        self.ledger.nodes_expanded.fetch_add(1, Ordering::Relaxed);
        debug!(
            "[Worker {}] {} (depth {}) links to {} page(s)",
            worker_id,
            node.url,
            node.depth,
            links.len()
        );

        for url in links {
            let neighbour = node.child(url);

            // Every discovered link is reported, visited or not.
            let edge = Edge::new(node.clone(), neighbour.clone());
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => return Err(Interrupted::Stopped),
                sent = self.edges.send(edge) => {
                    if sent.is_err() {
                        return Err(Interrupted::ConsumerGone);
                    }
                }
            }
            self.ledger.edges_emitted.fetch_add(1, Ordering::Relaxed);

            if !self.visited.insert(&neighbour.url).await {
                continue;
            }
            if neighbour.depth >= self.max_depth {
                self.ledger.depth_limited.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            // Admitted before the hand-off so the frontier never looks empty while it moves.
            self.activity.admit();
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    self.activity.settle();
                    return Err(Interrupted::Stopped);
                }
                sent = self.inlet.send(neighbour) => {
                    if sent.is_err() {
                        self.activity.settle();
                        return Err(Interrupted::Stopped);
                    }
                }
            }
        }

        Ok(())
    }
}

async fn supervise(
    mut workers: JoinSet<()>,
    relay: JoinHandle<()>,
    detector: JoinHandle<bool>,
    ledger: Arc<Ledger>,
    stop: CancelToken,
) -> Result<TraversalReport> {
    let mut failure = None;
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!("Worker task failed: {}", e);
            // A lost worker leaves its node unsettled; nothing would ever quiesce.
            stop.cancel();
            failure.get_or_insert(e);
        }
    }
    relay.await?;
    let quiesced = detector.await?;

    if let Some(e) = failure {
        return Err(SurfError::JoinError(e));
    }

    // Whichever trigger fired first decides; a cancel after quiescence changes nothing.
    let outcome = if quiesced {
        TraversalOutcome::Quiesced
    } else {
        TraversalOutcome::Cancelled
    };

    let mut report = TraversalReport::new(outcome);
    report.edges_emitted = ledger.edges_emitted.load(Ordering::Relaxed);
    report.nodes_expanded = ledger.nodes_expanded.load(Ordering::Relaxed);
    report.depth_limited = ledger.depth_limited.load(Ordering::Relaxed);
    report.failures = std::mem::take(&mut *ledger.failures.lock().await);

    info!(
        "Traversal {:?}: {} edge(s), {} page(s) expanded, {} failure(s)",
        report.outcome,
        report.edges_emitted,
        report.nodes_expanded,
        report.failures.len()
    );
    Ok(report)
}
