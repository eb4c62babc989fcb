//! Test doubles for driving pipelines: a constant-value source, a counting
//! sink and a pass-through processor.

use std::sync::Arc;

use parking_lot::Mutex;

use brook_signal::Frame;

use crate::line::{
    Processor, ProcessorAllocator, SignalProperties, SinkAllocator, SourceAllocator,
};

/// Emits `limit` samples per channel of a constant value.
#[derive(Debug, Clone)]
pub struct Source {
    pub sample_rate: u32,
    pub channels: usize,
    pub limit: usize,
    pub value: f32,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            limit: 0,
            value: 0.0,
        }
    }
}

impl Source {
    pub fn source(self) -> SourceAllocator {
        SourceAllocator::new(move |_buffer_size| {
            let properties = SignalProperties {
                sample_rate: self.sample_rate,
                channels: self.channels,
            };
            Ok((
                Box::new(ConstantSource {
                    remaining: self.limit,
                    value: self.value,
                }),
                properties,
            ))
        })
    }
}

struct ConstantSource {
    remaining: usize,
    value: f32,
}

impl crate::Source for ConstantSource {
    fn process(&mut self, out: &mut Frame) -> anyhow::Result<Option<usize>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let written = out.len().min(self.remaining);
        out.truncate(written);
        for ch in 0..out.channels() {
            out.plane_mut(ch).fill(self.value);
        }
        self.remaining -= written;
        Ok(Some(written))
    }
}

#[derive(Default)]
struct SinkRecord {
    messages: usize,
    samples: usize,
    planes: Vec<Vec<f32>>,
    flushed: bool,
}

/// Counts received messages and samples; keeps the sample data unless
/// constructed with [`Sink::discard`].
#[derive(Default, Clone)]
pub struct Sink {
    record: Arc<Mutex<SinkRecord>>,
    discard: bool,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discard() -> Self {
        Self {
            record: Arc::default(),
            discard: true,
        }
    }

    pub fn sink(&self) -> SinkAllocator {
        let record = Arc::clone(&self.record);
        let discard = self.discard;
        SinkAllocator::new(move |_buffer_size, properties| {
            Ok(Box::new(CountingSink {
                record,
                discard,
                channels: properties.channels,
            }))
        })
    }

    /// Number of frames received.
    pub fn messages(&self) -> usize {
        self.record.lock().messages
    }

    /// Number of samples received per channel.
    pub fn samples(&self) -> usize {
        self.record.lock().samples
    }

    pub fn flushed(&self) -> bool {
        self.record.lock().flushed
    }

    /// The received samples of one channel, concatenated in arrival order.
    pub fn channel(&self, channel: usize) -> Vec<f32> {
        self.record.lock().planes[channel].clone()
    }
}

struct CountingSink {
    record: Arc<Mutex<SinkRecord>>,
    discard: bool,
    channels: usize,
}

impl crate::Sink for CountingSink {
    fn process(&mut self, input: &Frame) -> anyhow::Result<()> {
        let mut record = self.record.lock();
        record.messages += 1;
        record.samples += input.len();
        if !self.discard {
            if record.planes.is_empty() {
                record.planes = vec![Vec::new(); self.channels];
            }
            for ch in 0..self.channels {
                record.planes[ch].extend_from_slice(input.plane(ch));
            }
        }
        Ok(())
    }

    fn flush(&mut self, _cancel: &crate::CancelToken) -> anyhow::Result<()> {
        self.record.lock().flushed = true;
        Ok(())
    }
}

/// Copies input to output unchanged, counting processed frames.
#[derive(Default, Clone)]
pub struct PassThrough {
    processed: Arc<Mutex<usize>>,
}

impl PassThrough {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processor(&self) -> ProcessorAllocator {
        let processed = Arc::clone(&self.processed);
        ProcessorAllocator::new(move |_buffer_size, properties| {
            Ok((Box::new(PassThroughProcessor { processed }), properties))
        })
    }

    pub fn processed(&self) -> usize {
        *self.processed.lock()
    }
}

struct PassThroughProcessor {
    processed: Arc<Mutex<usize>>,
}

impl Processor for PassThroughProcessor {
    fn process(&mut self, input: &Frame, out: &mut Frame) -> anyhow::Result<usize> {
        let written = out.copy_from(input);
        *self.processed.lock() += 1;
        Ok(written)
    }
}
