use crate::buffer_stage::BufferStage;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::metrics::StageMetrics;
use crate::stage::{FilterStage, PipelineValue, Stage, StageRunner};
use crossbeam::channel::{bounded, never, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Default ring buffer capacity
pub const DEFAULT_CAPACITY: usize = 10;

/// Default quiet period before the buffer is flushed
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(5);

/// Builder for the source → filters → buffer → sink graph
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    capacity: usize,
    idle_interval: Duration,
    flush_when_full: bool,
    drain_on_close: bool,
    channel_capacity: usize,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            flush_when_full: false,
            drain_on_close: true,
            channel_capacity: 0,
        }
    }

    /// Builder populated from loaded configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new()
            .buffer_capacity(config.buffer.capacity)
            .idle_interval(config.buffer.idle_interval())
            .flush_when_full(config.buffer.flush_when_full)
            .drain_on_close(config.buffer.drain_on_close)
            .channel_capacity(config.channel_capacity)
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn flush_when_full(mut self, enable: bool) -> Self {
        self.flush_when_full = enable;
        self
    }

    pub fn drain_on_close(mut self, enable: bool) -> Self {
        self.drain_on_close = enable;
        self
    }

    /// Slots per inter-stage channel; `0` makes every hop a rendezvous handoff
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Build the pipeline, failing fast on invalid buffer settings
    pub fn build(self) -> Result<Pipeline> {
        let buffer_stage = BufferStage::new(self.capacity, self.idle_interval)?
            .with_flush_when_full(self.flush_when_full)
            .with_drain_on_close(self.drain_on_close);

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(FilterStage::non_negative()),
            Box::new(FilterStage::multiple_of_three()),
            Box::new(buffer_stage),
        ];
        let metrics = stages.iter().map(|_| StageMetrics::new()).collect();

        Ok(Pipeline {
            stages,
            metrics,
            channel_capacity: self.channel_capacity,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A built but not yet running pipeline
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    metrics: Vec<StageMetrics>,
    channel_capacity: usize,
}

impl Pipeline {
    /// Names of the stages in flow order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Get metrics for a specific stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Spawn one thread per stage, chaining them with handoff channels
    pub fn start(self) -> Result<RunningPipeline> {
        let (input_tx, mut upstream) = bounded(self.channel_capacity);
        let mut handles = Vec::with_capacity(self.stages.len());
        let mut names = Vec::with_capacity(self.stages.len());

        for (stage, metrics) in self.stages.into_iter().zip(self.metrics.iter().cloned()) {
            let (tx, rx) = bounded(self.channel_capacity);
            let name = stage.name().to_string();
            let runner = StageRunner::with_metrics(upstream, tx, metrics);

            let handle = thread::Builder::new()
                .name(format!("stage-{name}"))
                .spawn(move || runner.run(stage))?;

            debug!(stage = %name, "spawned stage thread");
            handles.push(handle);
            names.push(name);
            upstream = rx;
        }

        info!(stages = names.len(), "pipeline started");
        Ok(RunningPipeline {
            input: Some(input_tx),
            output: upstream,
            names,
            handles,
            metrics: self.metrics,
        })
    }
}

/// A running pipeline that can be fed, drained, and stopped
pub struct RunningPipeline {
    input: Option<Sender<PipelineValue>>,
    output: Receiver<PipelineValue>,
    names: Vec<String>,
    handles: Vec<JoinHandle<Result<()>>>,
    metrics: Vec<StageMetrics>,
}

impl RunningPipeline {
    /// Send one value into the first stage, blocking until it is taken
    pub fn send(&self, value: PipelineValue) -> Result<()> {
        let input = self.input.as_ref().ok_or(PipelineError::InputClosed)?;
        input.send(value).map_err(|_| PipelineError::InputClosed)
    }

    /// A sender for feeding the pipeline from another thread.
    ///
    /// The graph only unwinds once every such sender has been dropped.
    pub fn input(&self) -> Option<Sender<PipelineValue>> {
        self.input.clone()
    }

    /// Values emitted by the buffer stage, in emission order
    pub fn output(&self) -> &Receiver<PipelineValue> {
        &self.output
    }

    /// Drop this handle's input sender
    pub fn close_input(&mut self) {
        self.input = None;
    }

    /// Get metrics for a stage
    pub fn stage_metrics(&self, index: usize) -> Option<&StageMetrics> {
        self.metrics.get(index)
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        let mut summary = String::from("Pipeline Metrics Summary:\n");
        for (name, metrics) in self.names.iter().zip(&self.metrics) {
            summary.push_str(&format!("  {}: {}\n", name, metrics.snapshot().format()));
        }
        summary
    }

    /// Close the input, collect everything still emitted, and wait for every stage.
    /// Like [`RunningPipeline::shutdown`], blocks while a sender from
    /// [`RunningPipeline::input`] is still alive.
    pub fn finish(mut self) -> Result<Vec<PipelineValue>> {
        self.close_input();
        let remaining = self.output.iter().collect();
        self.join()?;
        Ok(remaining)
    }

    /// Close both ends of the graph and wait for every stage to exit.
    /// Values still buffered are discarded.
    ///
    /// Only this handle's sender is dropped: the call blocks until every
    /// sender obtained from [`RunningPipeline::input`] has been dropped too.
    pub fn shutdown(mut self) -> Result<()> {
        self.close_input();
        drop(std::mem::replace(&mut self.output, never()));
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        let mut results = Vec::with_capacity(self.handles.len());
        for (name, handle) in self.names.iter().zip(self.handles.drain(..)) {
            match handle.join() {
                Ok(result) => results.push(result),
                Err(_) => return Err(PipelineError::ThreadError(format!("stage {name} panicked"))),
            }
        }

        for result in results {
            result?;
        }

        info!("pipeline stopped");
        Ok(())
    }
}
