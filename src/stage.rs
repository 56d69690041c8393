use crate::error::Result;
use crate::metrics::StageMetrics;
use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, trace};

/// Value carried between stages
pub type PipelineValue = i64;

/// A concurrently running pipeline stage.
///
/// `run` owns the stage's loop: it reads from `input` until the channel is
/// closed and writes to `output`. Returning drops the stage's end of both
/// channels, which is what unwinds the stages around it.
pub trait Stage: Send + 'static {
    fn run(
        &mut self,
        input: &Receiver<PipelineValue>,
        output: &Sender<PipelineValue>,
        metrics: &StageMetrics,
    ) -> Result<()>;

    /// Called once `run` has returned
    fn on_shutdown(&mut self, _metrics: &StageMetrics) -> Result<()> {
        Ok(())
    }

    /// Get a human-readable name for this stage
    fn name(&self) -> &str {
        "stage"
    }
}

/// Connects a stage to its channels and drives it to completion
pub struct StageRunner {
    input: Receiver<PipelineValue>,
    output: Sender<PipelineValue>,
    metrics: StageMetrics,
}

impl StageRunner {
    pub fn new(input: Receiver<PipelineValue>, output: Sender<PipelineValue>) -> Self {
        Self {
            input,
            output,
            metrics: StageMetrics::new(),
        }
    }

    /// Runner that reports into existing metrics
    pub fn with_metrics(
        input: Receiver<PipelineValue>,
        output: Sender<PipelineValue>,
        metrics: StageMetrics,
    ) -> Self {
        Self {
            input,
            output,
            metrics,
        }
    }

    pub fn metrics(&self) -> &StageMetrics {
        &self.metrics
    }

    /// Run the stage until its input closes or its output is abandoned.
    /// Consumes the runner so both channel ends are released on return.
    pub fn run(self, mut stage: Box<dyn Stage>) -> Result<()> {
        debug!(stage = stage.name(), "stage started");

        let result = stage.run(&self.input, &self.output, &self.metrics);

        stage.on_shutdown(&self.metrics)?;
        debug!(
            stage = stage.name(),
            received = self.metrics.total_received(),
            emitted = self.metrics.total_emitted(),
            "stage stopped"
        );
        result
    }
}

/// Passes `v` iff `v > 0`. Zero is dropped along with the negatives.
pub fn non_negative(v: PipelineValue) -> bool {
    v > 0
}

/// Passes `v` iff `v` is an integer multiple of three, zero and negatives included
pub fn multiple_of_three(v: PipelineValue) -> bool {
    v % 3 == 0
}

/// A stateless stage forwarding only the values matching a predicate
#[derive(Debug)]
pub struct FilterStage<F>
where
    F: Fn(PipelineValue) -> bool + Send + 'static,
{
    name: String,
    predicate: F,
}

impl<F> FilterStage<F>
where
    F: Fn(PipelineValue) -> bool + Send + 'static,
{
    /// Create a new filter stage
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    pub fn accepts(&self, value: PipelineValue) -> bool {
        (self.predicate)(value)
    }
}

impl FilterStage<fn(PipelineValue) -> bool> {
    /// The first filter: drops zero and negative values
    pub fn non_negative() -> Self {
        Self::new("non_negative", non_negative)
    }

    /// The second filter: drops values not divisible by three
    pub fn multiple_of_three() -> Self {
        Self::new("multiple_of_three", multiple_of_three)
    }
}

impl<F> Stage for FilterStage<F>
where
    F: Fn(PipelineValue) -> bool + Send + 'static,
{
    fn run(
        &mut self,
        input: &Receiver<PipelineValue>,
        output: &Sender<PipelineValue>,
        metrics: &StageMetrics,
    ) -> Result<()> {
        for value in input.iter() {
            metrics.record_received();

            if !self.accepts(value) {
                trace!(stage = %self.name, value, "filtered out");
                metrics.record_dropped(1);
                continue;
            }

            if output.send(value).is_err() {
                debug!(stage = %self.name, "downstream closed");
                break;
            }
            metrics.record_emitted();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
