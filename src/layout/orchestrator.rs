//! Serializes layout runs and puts collapsed groups back in order afterwards.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::hierarchy::{compute_layout, select_root};
use super::{LayoutJob, LayoutKind, LayoutOutcome, LayoutProvider, Viewport};
use crate::error::LayoutError;
use crate::graph::{GraphIndex, NodeId};
use crate::groups::GroupRegistry;
use crate::visibility;

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutRequest {
    pub kind: LayoutKind,
    /// Selection at request time, consulted for the hierarchical root.
    pub selection: Vec<NodeId>,
}

impl LayoutRequest {
    pub fn new(kind: LayoutKind) -> Self {
        Self {
            kind,
            selection: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutCompletion {
    pub kind: &'static str,
    pub result: LayoutOutcome,
    /// Display flags flipped back while re-asserting collapsed groups.
    pub reasserted: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunStatus {
    /// Handed to the provider; completion arrives through `poll`/`wait`.
    Started,
    /// Finished synchronously (hierarchical tree).
    Completed(LayoutCompletion),
    /// Another run is in flight; this request replaced any earlier pending one.
    Deferred,
    NotReady,
}

struct InFlight {
    kind: &'static str,
    rx: Receiver<LayoutOutcome>,
    started: Instant,
}

pub struct LayoutOrchestrator {
    provider: Box<dyn LayoutProvider>,
    viewport: Viewport,
    timeout: Duration,
    fallback: LayoutKind,
    in_flight: Option<InFlight>,
    deferred: Option<LayoutRequest>,
}

impl LayoutOrchestrator {
    pub fn new(
        provider: Box<dyn LayoutProvider>,
        viewport: Viewport,
        timeout: Duration,
        fallback: LayoutKind,
    ) -> Self {
        Self {
            provider,
            viewport,
            timeout,
            fallback,
            in_flight: None,
            deferred: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Drops any in-flight or pending run without applying its result.
    pub fn reset(&mut self) {
        if self.in_flight.take().is_some() {
            self.provider.cancel();
        }
        self.deferred = None;
    }

    pub fn run(
        &mut self,
        graph: &mut GraphIndex,
        groups: &GroupRegistry,
        request: LayoutRequest,
    ) -> RunStatus {
        if !graph.is_ready() {
            debug!(kind = request.kind.name(), "layout requested before graph load");
            return RunStatus::NotReady;
        }
        if let Some(in_flight) = &self.in_flight {
            debug!(
                running = in_flight.kind,
                pending = request.kind.name(),
                "layout in flight, deferring request"
            );
            self.deferred = Some(request);
            return RunStatus::Deferred;
        }
        self.start(graph, groups, request)
    }

    /// Collects a finished or timed-out run, or starts the deferred request once idle.
    pub fn poll(
        &mut self,
        graph: &mut GraphIndex,
        groups: &GroupRegistry,
    ) -> Option<LayoutCompletion> {
        let Some(in_flight) = &self.in_flight else {
            let request = self.deferred.take()?;
            return match self.start(graph, groups, request) {
                RunStatus::Completed(completion) => Some(completion),
                _ => None,
            };
        };

        let kind = in_flight.kind;
        let outcome = match in_flight.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Disconnected) => Err(LayoutError::Disconnected),
            Err(TryRecvError::Empty) if in_flight.started.elapsed() >= self.timeout => {
                return Some(self.time_out(graph, groups));
            }
            Err(TryRecvError::Empty) => return None,
        };
        Some(self.finish(graph, groups, kind, outcome))
    }

    /// Blocks until nothing is running or pending, returning every completion in order.
    pub fn wait(&mut self, graph: &mut GraphIndex, groups: &GroupRegistry) -> Vec<LayoutCompletion> {
        let mut completions = Vec::new();
        loop {
            if let Some(completion) = self.poll(graph, groups) {
                completions.push(completion);
                continue;
            }
            let Some(in_flight) = &self.in_flight else {
                if self.deferred.is_none() {
                    break;
                }
                continue;
            };

            let kind = in_flight.kind;
            let remaining = self.timeout.saturating_sub(in_flight.started.elapsed());
            let received = in_flight.rx.recv_timeout(remaining);
            match received {
                Ok(outcome) => completions.push(self.finish(graph, groups, kind, outcome)),
                Err(RecvTimeoutError::Timeout) => completions.push(self.time_out(graph, groups)),
                Err(RecvTimeoutError::Disconnected) => {
                    completions.push(self.finish(graph, groups, kind, Err(LayoutError::Disconnected)))
                }
            }
        }
        completions
    }

    fn start(
        &mut self,
        graph: &mut GraphIndex,
        groups: &GroupRegistry,
        request: LayoutRequest,
    ) -> RunStatus {
        let LayoutRequest { kind, selection } = request;

        let kind = match kind {
            LayoutKind::HierarchicalTree(config) => {
                let job = LayoutJob::from_visible(
                    graph,
                    LayoutKind::HierarchicalTree(config.clone()),
                    self.viewport,
                );
                let computed = select_root(&job, config.root.as_deref(), &selection)
                    .and_then(|root| compute_layout(&job, &root, config.min_level_height));
                match computed {
                    Ok(layout) => {
                        info!(root = %layout.root, nodes = layout.positions.len(), "hierarchical layout");
                        let completion =
                            self.finish(graph, groups, "hierarchical-tree", Ok(layout.positions));
                        return RunStatus::Completed(completion);
                    }
                    Err(error) if self.fallback.is_hierarchical() => {
                        warn!(%error, "hierarchical layout failed and fallback is hierarchical too");
                        let completion = self.finish(graph, groups, "hierarchical-tree", Err(error));
                        return RunStatus::Completed(completion);
                    }
                    Err(error) => {
                        warn!(%error, fallback = self.fallback.name(), "falling back from hierarchical layout");
                        self.fallback.clone()
                    }
                }
            }
            other => other,
        };

        let name = kind.name();
        let job = LayoutJob::from_visible(graph, kind, self.viewport);
        let nodes = job.nodes.len();
        let (tx, rx) = mpsc::channel();
        self.in_flight = Some(InFlight {
            kind: name,
            rx,
            started: Instant::now(),
        });
        self.provider.run(
            job,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        info!(kind = name, nodes, "layout started");
        RunStatus::Started
    }

    fn time_out(&mut self, graph: &mut GraphIndex, groups: &GroupRegistry) -> LayoutCompletion {
        let kind = self.in_flight.as_ref().map_or("unknown", |in_flight| in_flight.kind);
        warn!(kind, timeout_ms = self.timeout.as_millis() as u64, "layout timed out");
        self.provider.cancel();
        self.finish(
            graph,
            groups,
            kind,
            Err(LayoutError::Timeout(self.timeout.as_millis())),
        )
    }

    fn finish(
        &mut self,
        graph: &mut GraphIndex,
        groups: &GroupRegistry,
        kind: &'static str,
        result: LayoutOutcome,
    ) -> LayoutCompletion {
        self.in_flight = None;

        match &result {
            Ok(positions) => {
                let applied = graph.apply_positions(positions);
                debug!(kind, applied, "layout positions applied");
            }
            Err(error) => warn!(kind, %error, "layout finished without positions"),
        }

        let reasserted = reassert_collapsed(graph, groups);
        LayoutCompletion {
            kind,
            result,
            reasserted,
        }
    }
}

/// Some engines touch every node, hidden or not; collapsed groups are forced back
/// into their collapsed shape.
pub fn reassert_collapsed(graph: &mut GraphIndex, groups: &GroupRegistry) -> usize {
    let mut changed = 0usize;
    for group in groups.collapsed() {
        changed += visibility::hide(graph, &group.members);
        changed += visibility::show(graph, [&group.id]);
        changed += visibility::show_edges(graph, group.meta_edges.iter().map(|edge| &edge.id));
    }
    if changed > 0 {
        debug!(changed, "collapsed groups re-asserted");
    }
    changed
}
