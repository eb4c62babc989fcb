use anyhow::Result;
use brook_signal::Frame;

use crate::CancelToken;

/// Immutable properties of a connected stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalProperties {
    pub sample_rate: u32,
    pub channels: usize,
}

/// Produces frames at the head of a line.
///
/// `process` fills `out` (handed over at full capacity) and returns
/// `Ok(Some(n))` with the number of samples written per channel, or
/// `Ok(None)` at end of stream. A cancelled blocking wait returns `Ok`.
pub trait Source: Send {
    fn start(&mut self, _cancel: &CancelToken) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, out: &mut Frame) -> Result<Option<usize>>;

    fn flush(&mut self, _cancel: &CancelToken) -> Result<()> {
        Ok(())
    }
}

/// Transforms frames between a source and a sink. `process` returns the
/// number of samples written to `out` per channel.
pub trait Processor: Send {
    fn start(&mut self, _cancel: &CancelToken) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, input: &Frame, out: &mut Frame) -> Result<usize>;

    fn flush(&mut self, _cancel: &CancelToken) -> Result<()> {
        Ok(())
    }
}

/// Consumes frames at the tail of a line.
pub trait Sink: Send {
    fn start(&mut self, _cancel: &CancelToken) -> Result<()> {
        Ok(())
    }

    fn process(&mut self, input: &Frame) -> Result<()>;

    fn flush(&mut self, _cancel: &CancelToken) -> Result<()> {
        Ok(())
    }
}

/// One-shot binder for a line's source. Invoked with the pipe's buffer
/// size; yields the node and the properties it exposes downstream.
pub struct SourceAllocator(
    Box<dyn FnOnce(usize) -> Result<(Box<dyn Source>, SignalProperties)> + Send>,
);

impl SourceAllocator {
    pub fn new<F>(allocate: F) -> Self
    where
        F: FnOnce(usize) -> Result<(Box<dyn Source>, SignalProperties)> + Send + 'static,
    {
        Self(Box::new(allocate))
    }

    pub fn allocate(self, buffer_size: usize) -> Result<(Box<dyn Source>, SignalProperties)> {
        (self.0)(buffer_size)
    }
}

/// One-shot binder for a processor. Receives the upstream properties and
/// yields the node plus the properties it exposes downstream.
pub struct ProcessorAllocator(
    Box<
        dyn FnOnce(usize, SignalProperties) -> Result<(Box<dyn Processor>, SignalProperties)>
            + Send,
    >,
);

impl ProcessorAllocator {
    pub fn new<F>(allocate: F) -> Self
    where
        F: FnOnce(usize, SignalProperties) -> Result<(Box<dyn Processor>, SignalProperties)>
            + Send
            + 'static,
    {
        Self(Box::new(allocate))
    }

    pub fn allocate(
        self,
        buffer_size: usize,
        properties: SignalProperties,
    ) -> Result<(Box<dyn Processor>, SignalProperties)> {
        (self.0)(buffer_size, properties)
    }
}

/// One-shot binder for a line's sink. Receives the upstream properties.
pub struct SinkAllocator(Box<dyn FnOnce(usize, SignalProperties) -> Result<Box<dyn Sink>> + Send>);

impl SinkAllocator {
    pub fn new<F>(allocate: F) -> Self
    where
        F: FnOnce(usize, SignalProperties) -> Result<Box<dyn Sink>> + Send + 'static,
    {
        Self(Box::new(allocate))
    }

    pub fn allocate(
        self,
        buffer_size: usize,
        properties: SignalProperties,
    ) -> Result<Box<dyn Sink>> {
        (self.0)(buffer_size, properties)
    }
}

/// One `source -> processors -> sink` chain, scheduled as a unit.
pub struct Line {
    pub source: SourceAllocator,
    pub processors: Vec<ProcessorAllocator>,
    pub sink: SinkAllocator,
}

impl Line {
    pub fn new(source: SourceAllocator, sink: SinkAllocator) -> Self {
        Self {
            source,
            processors: Vec::new(),
            sink,
        }
    }

    pub fn with_processor(mut self, processor: ProcessorAllocator) -> Self {
        self.processors.push(processor);
        self
    }
}
