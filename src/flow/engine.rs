use std::{sync::Arc, time::Instant};

use bytes::BytesMut;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    format::FormatPlan,
    packet::types::{Direction, RemoteEndpoint, TcpSegment},
    proto::{
        carver::{Frame, carve},
        codec::{self, MSG_GET_REQ},
    },
    stats::{
        aggregate::{AggregateEntry, Aggregator, SniffStats},
        reservoir::Reservoir,
    },
};

/// Queue depth per flow. When a flow's queue is full the dispatcher's
/// send blocks, pushing backpressure toward the capture source.
pub const FLOW_QUEUE_DEPTH: usize = 10;

/// The aggregate entry the most recent identity-carrying request on a
/// flow was attributed to. Responses charge their latency sample and
/// byte count here. It survives past the response so verbose output can
/// keep naming the query.
struct Attribution {
    entry: Arc<AggregateEntry>,
    fingerprint: String,
    request_bytes: usize,
}

/// Per-flow stream reconstruction and measurement engine.
///
/// Two states. UNSYNCED (initial): nothing is attributed until one
/// delivered segment completes a GET request frame whose payload decodes;
/// a segment that fails that test costs both buffers, discarding whatever
/// mid-stream tail the capture joined at. SYNCED: every complete frame in
/// the same-direction buffer is processed in capture order, which is
/// assumed to equal wire order.
///
/// The engine is synchronous; [`listen`] wraps it around a flow's
/// segment queue. All per-flow state lives here and is touched only by
/// the owning listener task.
pub struct FlowEngine {
    endpoint: RemoteEndpoint,
    synced: bool,
    req_buf: BytesMut,
    res_buf: BytesMut,
    req_sent: Option<Instant>,
    latencies: Reservoir,
    attribution: Option<Attribution>,
    plan: Arc<FormatPlan>,
    aggregator: Arc<Aggregator>,
    stats: Arc<SniffStats>,
    verbose: bool,
}

impl FlowEngine {
    pub fn new(
        endpoint: RemoteEndpoint,
        plan: Arc<FormatPlan>,
        aggregator: Arc<Aggregator>,
        stats: Arc<SniffStats>,
        verbose: bool,
    ) -> Self {
        Self {
            endpoint,
            synced: false,
            req_buf: BytesMut::new(),
            res_buf: BytesMut::new(),
            req_sent: None,
            latencies: Reservoir::new(),
            attribution: None,
            plan,
            aggregator,
            stats,
            verbose,
        }
    }

    /// Feed one captured TCP payload, in capture order.
    pub fn on_segment(&mut self, segment: TcpSegment) {
        let direction = segment.direction;
        self.buffer_mut(direction).extend_from_slice(&segment.payload);

        if !self.synced {
            // The sync gate: exactly one carve attempt per delivered
            // segment. Anything short of a complete, decodable GET
            // request resets both buffers.
            match carve(self.buffer_mut(direction)) {
                Some(frame)
                    if direction == Direction::Request
                        && frame.msg_type == MSG_GET_REQ
                        && codec::decode_get(&frame.payload).is_ok() =>
                {
                    debug!("[{}] synchronized on GET request boundary", self.endpoint);
                    self.synced = true;
                    self.process_frame(direction, frame);
                }
                _ => {
                    self.req_buf.clear();
                    self.res_buf.clear();
                    return;
                }
            }
        }

        while let Some(frame) = carve(self.buffer_mut(direction)) {
            self.process_frame(direction, frame);
        }
    }

    fn buffer_mut(&mut self, direction: Direction) -> &mut BytesMut {
        match direction {
            Direction::Request => &mut self.req_buf,
            Direction::Response => &mut self.res_buf,
        }
    }

    fn process_frame(&mut self, direction: Direction, frame: Frame) {
        match direction {
            Direction::Request => self.process_request(frame),
            Direction::Response => self.process_response(frame),
        }
    }

    fn process_response(&mut self, frame: Frame) {
        // A response with no outstanding request: the request predates
        // the capture, or was already paired. Nothing to measure.
        let Some(sent) = self.req_sent.take() else {
            return;
        };
        // Clock granularity could round to zero, which would read back as
        // an empty slot; clamp to the smallest real latency.
        let latency_ns = (sent.elapsed().as_nanos() as u64).max(1);
        let response_bytes = frame.payload.len();

        let slot = Reservoir::random_slot();
        self.latencies.record(slot, latency_ns);
        self.stats.record_latency(slot, latency_ns);
        if let Some(attr) = &self.attribution {
            attr.entry
                .record_response(slot, latency_ns, response_bytes as u64);
        }

        if self.verbose {
            let (fingerprint, request_bytes) = self
                .attribution
                .as_ref()
                .map_or(("", 0), |attr| (attr.fingerprint.as_str(), attr.request_bytes));
            println!(
                "{fingerprint} {request_bytes} {response_bytes} {:.2}",
                latency_ns as f64 / 1_000_000.0
            );
        }
    }

    fn process_request(&mut self, frame: Frame) {
        // Overwrites any still-outstanding request. With no response to
        // pair against, the earlier request's latency is lost, and the
        // next response will be attributed to this one.
        self.req_sent = Some(Instant::now());

        let msg = match codec::decode(frame.msg_type, &frame.payload) {
            Ok(Some(msg)) => msg,
            Ok(None) => return,
            Err(err) => {
                warn!(
                    "[{}] failed to decode request frame type {:#04x}: {err}",
                    self.endpoint, frame.msg_type
                );
                return;
            }
        };

        self.stats.record_query();
        let fingerprint = self.plan.render(&self.endpoint, &msg);
        let entry = self.aggregator.entry(&fingerprint);
        entry.record_query();
        self.attribution = Some(Attribution {
            entry,
            fingerprint,
            request_bytes: frame.payload.len(),
        });
    }
}

/// Listener task: the sole consumer of one flow's segment queue. Exits
/// when the dispatcher drops the sending side.
pub async fn listen(mut engine: FlowEngine, mut segments_rx: mpsc::Receiver<TcpSegment>) {
    while let Some(segment) = segments_rx.recv().await {
        engine.on_segment(segment);
    }
    debug!("flow listener for {} exiting", engine.endpoint);
}
