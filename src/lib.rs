//! A small integer stream pipeline with an idle-flushed ring buffer.
//!
//! Values flow through four concurrently running stages joined by handoff
//! channels:
//!
//! ```text
//! source → non_negative → multiple_of_three → buffer → sink
//! ```
//!
//! The two filters are stateless predicates. The buffer stage keeps the
//! surviving values in a bounded ring buffer (oldest overwritten on overflow)
//! and forwards them once input has been quiet for the configured idle
//! interval. Every received value restarts that interval.
//!
//! # Example
//!
//! ```no_run
//! use debounce_pipeline::PipelineBuilder;
//! use std::time::Duration;
//!
//! let running = PipelineBuilder::new()
//!     .buffer_capacity(10)
//!     .idle_interval(Duration::from_millis(200))
//!     .build()?
//!     .start()?;
//!
//! for v in [-5, 0, 3, 9, 4, 12] {
//!     running.send(v)?;
//! }
//! assert_eq!(running.output().recv().unwrap(), 3);
//! # Ok::<(), debounce_pipeline::PipelineError>(())
//! ```

pub mod buffer;
pub mod buffer_stage;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod source;
pub mod stage;

pub use buffer::RingBuffer;
pub use buffer_stage::{BufferStage, FlushTrigger};
pub use config::{BufferConfig, LogConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Pipeline, PipelineBuilder, RunningPipeline};
pub use source::{parse_line, run_source, SourceLine, SourceSummary};
pub use stage::{multiple_of_three, non_negative, FilterStage, PipelineValue, Stage, StageRunner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
