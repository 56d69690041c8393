//! Buffering stage with debounce-style flushing.
//!
//! Each cycle waits once for either the next upstream value or a freshly
//! armed idle deadline. A value pushes into the ring buffer and re-arms the
//! deadline; an elapsed deadline drains the buffer downstream. Bursts are
//! therefore released together once input has been quiet for the whole
//! idle interval, never on a fixed cadence.

use crate::buffer::RingBuffer;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{PipelineValue, Stage};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Why a flush happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// No value arrived for a full idle interval
    Idle,
    /// The buffer reached capacity with `flush_when_full` enabled
    Full,
    /// The upstream channel closed with `drain_on_close` enabled
    Close,
}

/// Outcome of forwarding one batch
enum Forward {
    Delivered,
    DownstreamClosed,
}

/// Owns a ring buffer fed by the upstream filter and drained on idle timeout
#[derive(Debug)]
pub struct BufferStage {
    buffer: RingBuffer<PipelineValue>,
    idle_interval: Duration,
    flush_when_full: bool,
    drain_on_close: bool,
}

impl BufferStage {
    /// Create a buffer stage; fails on zero capacity or a zero idle interval
    pub fn new(capacity: usize, idle_interval: Duration) -> Result<Self> {
        if idle_interval.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "idle interval must be positive".into(),
            ));
        }

        Ok(Self {
            buffer: RingBuffer::new(capacity)?,
            idle_interval,
            flush_when_full: false,
            drain_on_close: true,
        })
    }

    /// Also flush as soon as the buffer holds `capacity` values
    pub fn with_flush_when_full(mut self, enable: bool) -> Self {
        self.flush_when_full = enable;
        self
    }

    /// Forward whatever is buffered when the upstream channel closes
    pub fn with_drain_on_close(mut self, enable: bool) -> Self {
        self.drain_on_close = enable;
        self
    }

    pub fn capacity(&self) -> usize {
        self.buffer.size()
    }

    pub fn idle_interval(&self) -> Duration {
        self.idle_interval
    }

    /// Drain the buffer and send each value downstream in insertion order
    fn flush(
        &self,
        trigger: FlushTrigger,
        output: &Sender<PipelineValue>,
        metrics: &StageMetrics,
    ) -> Forward {
        let batch = self.buffer.drain_all();
        if batch.is_empty() {
            return Forward::Delivered;
        }

        let len = batch.len();
        debug!(?trigger, len, "flushing buffer");
        let started = Instant::now();
        for (sent, value) in batch.into_iter().enumerate() {
            if output.send(value).is_err() {
                debug!(unsent = len - sent, "downstream closed during flush");
                metrics.record_dropped((len - sent) as u64);
                return Forward::DownstreamClosed;
            }
            metrics.record_emitted();
        }
        metrics.record_flush(started.elapsed());
        Forward::Delivered
    }
}

impl Stage for BufferStage {
    fn run(
        &mut self,
        input: &Receiver<PipelineValue>,
        output: &Sender<PipelineValue>,
        metrics: &StageMetrics,
    ) -> Result<()> {
        loop {
            match input.recv_timeout(self.idle_interval) {
                Ok(value) => {
                    metrics.record_received();
                    let overwritten_before = self.buffer.overwritten_count();
                    self.buffer.push(value);
                    metrics.record_dropped(self.buffer.overwritten_count() - overwritten_before);
                    trace!(value, len = self.buffer.len(), "buffered");

                    if self.flush_when_full && self.buffer.is_full() {
                        if let Forward::DownstreamClosed =
                            self.flush(FlushTrigger::Full, output, metrics)
                        {
                            return Ok(());
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Forward::DownstreamClosed =
                        self.flush(FlushTrigger::Idle, output, metrics)
                    {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if self.drain_on_close {
                        self.flush(FlushTrigger::Close, output, metrics);
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Values still buffered at exit are discarded and counted as dropped
    fn on_shutdown(&mut self, metrics: &StageMetrics) -> Result<()> {
        let discarded = self.buffer.drain_all().len();
        metrics.record_dropped(discarded as u64);
        debug!(
            discarded,
            overwritten = self.buffer.overwritten_count(),
            "buffer stage shut down"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "buffer"
    }
}
