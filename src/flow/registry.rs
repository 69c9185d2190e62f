use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    flow::engine::{FLOW_QUEUE_DEPTH, FlowEngine, listen},
    format::FormatPlan,
    packet::types::{RemoteEndpoint, TcpSegment},
    stats::aggregate::{Aggregator, SniffStats},
};

/// Maps remote endpoints to their flow listeners, creating on first
/// sight. Flows are never evicted, so the map is bounded by the number
/// of distinct client endpoints observed during the run.
///
/// Owned by the dispatch task; single ownership stands in for the
/// single-writer locking policy.
pub struct FlowRegistry {
    flows: HashMap<RemoteEndpoint, mpsc::Sender<TcpSegment>>,
    plan: Arc<FormatPlan>,
    aggregator: Arc<Aggregator>,
    stats: Arc<SniffStats>,
    verbose: bool,
}

impl FlowRegistry {
    pub fn new(
        plan: Arc<FormatPlan>,
        aggregator: Arc<Aggregator>,
        stats: Arc<SniffStats>,
        verbose: bool,
    ) -> Self {
        Self {
            flows: HashMap::new(),
            plan,
            aggregator,
            stats,
            verbose,
        }
    }

    /// Hand one classified payload to its flow, spawning the listener on
    /// first sight of the endpoint. Blocks while the flow's queue is
    /// full.
    pub async fn route(&mut self, endpoint: RemoteEndpoint, segment: TcpSegment) {
        let sender = self.flows.entry(endpoint).or_insert_with(|| {
            debug!("new flow from {endpoint}");
            let engine = FlowEngine::new(
                endpoint,
                Arc::clone(&self.plan),
                Arc::clone(&self.aggregator),
                Arc::clone(&self.stats),
                self.verbose,
            );
            let (segments_tx, segments_rx) = mpsc::channel(FLOW_QUEUE_DEPTH);
            tokio::spawn(listen(engine, segments_rx));
            segments_tx
        });

        // A listener only stops when its sender is dropped, so a send
        // failure means shutdown is already underway.
        let _ = sender.send(segment).await;
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
