//! Frontier relay.
//!
//! Workers never send discovered nodes straight into the work queue they
//! dequeue from: with a bounded queue every worker could end up blocked on
//! the send while none is left to receive. Instead they push into the relay's
//! inlet, and the relay forwards to the work queue one node at a time. The
//! relay keeps an unbounded backlog and accepts from the inlet while it is
//! waiting on the queue, so an inlet send never depends on a worker being free.

use crate::cancel::CancelToken;
use crate::model::Node;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

pub struct FrontierRelay {
    inlet: mpsc::Receiver<Node>,
    queue: mpsc::Sender<Node>,
    backlog: VecDeque<Node>,
}

impl FrontierRelay {
    pub fn new(inlet: mpsc::Receiver<Node>, queue: mpsc::Sender<Node>) -> Self {
        Self {
            inlet,
            queue,
            backlog: VecDeque::new(),
        }
    }

    /// Queue `node` ahead of anything that arrives through the inlet.
    pub fn with_seed(mut self, node: Node) -> Self {
        self.backlog.push_back(node);
        self
    }

    pub fn spawn(self, stop: CancelToken) -> JoinHandle<()> {
        tokio::spawn(self.run(stop))
    }

    /// Pumps until `stop` fires, or until the inlet is closed and the backlog
    /// has been handed off. Dropping `self.queue` on return closes the work queue.
    pub async fn run(mut self, stop: CancelToken) {
        let mut inlet_open = true;
        let mut forwarded = 0usize;

        while inlet_open || !self.backlog.is_empty() {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                received = self.inlet.recv(), if inlet_open => match received {
                    Some(node) => {
                        trace!("Relay accepted {} (depth {})", node.url, node.depth);
                        self.backlog.push_back(node);
                    }
                    None => inlet_open = false,
                },
                permit = self.queue.reserve(), if !self.backlog.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(node) = self.backlog.pop_front() {
                            permit.send(node);
                            forwarded += 1;
                        }
                    }
                    // Every worker has dropped its end of the queue.
                    Err(_) => break,
                },
            }
        }

        debug!(
            "Relay finished: forwarded {} node(s), {} left in backlog",
            forwarded,
            self.backlog.len()
        );
    }
}
