// src/watch/collector.rs

//! The debounce collector: coalesces raw notification bursts from both
//! watched roots into discrete batches.
//!
//! The loop is the single consumer of all orchestration state: it owns both
//! detectors and processes each batch synchronously (inline) before waiting
//! again, so batches never overlap and nothing downstream needs locking.

use std::cmp;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::Result;
use crate::watch::detector::ChangeSource;

/// One side's atomic diff result. Paths are relative, `/`-separated;
/// directories carry a trailing `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// One atomic pass over both watched roots.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub source: ChangeSet,
    pub dest: ChangeSet,
}

/// Signals into the collector loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorEvent {
    /// Raw filesystem activity was observed on one of the watched roots.
    Touched,
    /// Stop after the in-flight batch (ctrl-c).
    ShutdownRequested,
}

/// What the sink wants the collector to do after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchControl {
    Continue,
    Stop,
}

/// Consumer of batches.
///
/// Production code uses the orchestrator ([`crate::engine::Reactor`]); tests
/// can record batches instead.
pub trait BatchSink: Send {
    fn process_batch(
        &mut self,
        batch: Batch,
    ) -> Pin<Box<dyn Future<Output = Result<BatchControl>> + Send + '_>>;
}

/// The debounce worker.
///
/// Owns a "next wake" deadline pushed forward by `bundle` on every `Touched`
/// signal, capped by a forced deadline of `timeout` after the previous pass,
/// which also acts as a fallback poll when notifications are missed.
pub struct Collector<S: ChangeSource> {
    source: S,
    dest: S,
    bundle: Duration,
    timeout: Duration,
    event_rx: mpsc::UnboundedReceiver<CollectorEvent>,
}

impl<S: ChangeSource> Collector<S> {
    pub fn new(
        source: S,
        dest: S,
        bundle: Duration,
        timeout: Duration,
        event_rx: mpsc::UnboundedReceiver<CollectorEvent>,
    ) -> Self {
        Self {
            source,
            dest,
            bundle,
            timeout,
            event_rx,
        }
    }

    /// Main loop. Returns when the sink asks to stop, a shutdown signal
    /// arrives, or the sink reports a run-terminating error.
    pub async fn run<K: BatchSink>(mut self, sink: &mut K) -> Result<()> {
        info!("collector started");

        // The first batch fires immediately (initial tree population).
        let mut next_wake = Instant::now();
        let mut forced_wake = next_wake;

        loop {
            // Wait until the deadline, pushing it forward on each touch.
            loop {
                let deadline = cmp::min(next_wake, forced_wake);
                if Instant::now() >= deadline {
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    event = self.event_rx.recv() => match event {
                        Some(CollectorEvent::Touched) => {
                            // Coalesce the burst; the forced deadline keeps a
                            // perpetual storm from postponing batches forever.
                            next_wake = Instant::now() + self.bundle;
                        }
                        Some(CollectorEvent::ShutdownRequested) | None => {
                            info!("collector shutting down");
                            return Ok(());
                        }
                    }
                }
            }

            let now = Instant::now();
            next_wake = now + self.timeout;
            forced_wake = now + self.timeout;

            if !self.source.pending() && !self.dest.pending() {
                // Nothing to apply; the no-op batch is suppressed.
                continue;
            }

            let batch = Batch {
                source: self.source.diff(),
                dest: self.dest.diff(),
            };
            debug!(
                src_changed = batch.source.changed.len(),
                src_deleted = batch.source.deleted.len(),
                dest_changed = batch.dest.changed.len(),
                dest_deleted = batch.dest.deleted.len(),
                "processing batch"
            );

            // Processed inline: the loop holds until the sink returns, so
            // batches are never concurrent with each other.
            match sink.process_batch(batch).await? {
                BatchControl::Continue => {}
                BatchControl::Stop => {
                    info!("sink requested stop");
                    return Ok(());
                }
            }
        }
    }
}
