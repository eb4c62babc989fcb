//! A minimal line-based streaming pipeline.
//!
//! A pipeline is a set of *lines*, each a `source -> processors -> sink`
//! chain scheduled on its own thread. Nodes are bound through one-shot
//! allocators so signal properties flow from the source downstream, then
//! driven through `start`, per-frame `process` and `flush` callbacks.
//! Fan-in and fan-out nodes connect lines by sharing state internally;
//! the runner itself only ever sees independent lines.

mod cancel;
mod line;
pub mod mock;
mod runner;

pub use cancel::{cancellation, CancelToken, Canceller, Never};
pub use line::{
    Line, Processor, ProcessorAllocator, SignalProperties, Sink, SinkAllocator, Source,
    SourceAllocator,
};
pub use runner::{LineSpawner, Mutation, Pipe, PipeError, RunningPipe};
