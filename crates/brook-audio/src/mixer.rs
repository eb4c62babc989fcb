//! Fan-in node: sums N producer lines into one stream of per-sample means.
//!
//! Every producer line binds one sink; the consumer line binds the single
//! source, after the sinks. Each input synchronizes with the consumer
//! through a pair of capacity-1 token channels around a staging frame, so
//! at most one frame per input is in flight and the k-th pull observes the
//! k-th frame of every input still live at that pull. A flushed input is
//! dropped from the mix; the remaining inputs keep streaming.

use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;

use brook_pipe::{CancelToken, SignalProperties, Sink, SinkAllocator, Source, SourceAllocator};
use brook_signal::{Frame, FramePool};

#[derive(Debug, Error)]
pub enum MixError {
    /// A sink was bound with a sample rate different from the first one.
    #[error("sinking different sample rates")]
    DifferentSampleRates,
    /// A sink was bound with a channel count different from the first one.
    #[error("sinking different channels")]
    DifferentChannels,
    /// The source allocator ran before any sink allocator.
    #[error("mixer source bound before sink")]
    SourceBeforeSink,
}

/// Sums multiple signals. Has multiple sinks and a single source.
#[derive(Default, Clone)]
pub struct Mixer {
    bind: Arc<Mutex<Bind>>,
}

#[derive(Default)]
struct Bind {
    properties: Option<SignalProperties>,
    pool: Option<Arc<FramePool>>,
    inputs: Vec<InputHandle>,
}

/// Consumer-side handle of one input. The staging frame is owned by the
/// sink between a write token and the matching read token, and by the
/// consumer between a read token and the matching write token.
struct InputHandle {
    read: Receiver<()>,
    write: Sender<()>,
    staging: Arc<Mutex<Option<Frame>>>,
}

impl Mixer {
    /// Returns a sink allocator. May be invoked once per producer line;
    /// the first invocation fixes the signal properties and every later
    /// one must match them.
    pub fn sink(&self) -> SinkAllocator {
        let bind = Arc::clone(&self.bind);
        SinkAllocator::new(move |buffer_size, properties| {
            let mut bind = bind.lock();
            match bind.properties {
                None => {
                    bind.properties = Some(properties);
                    bind.pool = Some(FramePool::new(properties.channels, buffer_size));
                }
                Some(expected) => {
                    if expected.sample_rate != properties.sample_rate {
                        return Err(MixError::DifferentSampleRates.into());
                    }
                    if expected.channels != properties.channels {
                        return Err(MixError::DifferentChannels.into());
                    }
                }
            }
            let pool = bind.pool.clone().expect("pool is created with the first sink");
            let (read_tx, read_rx) = bounded(1);
            let (write_tx, write_rx) = bounded(1);
            write_tx.send(()).expect("fresh token channel has capacity");
            let staging = Arc::new(Mutex::new(Some(pool.acquire())));
            bind.inputs.push(InputHandle {
                read: read_rx,
                write: write_tx,
                staging: Arc::clone(&staging),
            });
            Ok(Box::new(MixerSink {
                write: write_rx,
                read: Some(read_tx),
                staging,
                cancel: None,
            }))
        })
    }

    /// Returns the source allocator for the mixed signal. Only a single
    /// source per mixer is supported, and it must be bound after at least
    /// one sink; otherwise allocation fails with
    /// [`MixError::SourceBeforeSink`].
    pub fn source(&self) -> SourceAllocator {
        let bind = Arc::clone(&self.bind);
        SourceAllocator::new(move |_buffer_size| {
            let mut bind = bind.lock();
            let properties = bind.properties.ok_or(MixError::SourceBeforeSink)?;
            let pool = bind.pool.clone().expect("pool is created with the first sink");
            let inputs = std::mem::take(&mut bind.inputs);
            let mut accumulator = pool.acquire();
            accumulator.zero();
            Ok((
                Box::new(MixerSource {
                    inputs,
                    pool,
                    accumulator: Some(accumulator),
                    cancel: None,
                }) as Box<dyn Source>,
                properties,
            ))
        })
    }
}

struct MixerSink {
    write: Receiver<()>,
    read: Option<Sender<()>>,
    staging: Arc<Mutex<Option<Frame>>>,
    cancel: Option<CancelToken>,
}

impl Sink for MixerSink {
    fn start(&mut self, cancel: &CancelToken) -> Result<()> {
        self.cancel = Some(cancel.clone());
        Ok(())
    }

    fn process(&mut self, input: &Frame) -> Result<()> {
        let cancel = self.cancel.as_ref().expect("sink started before process");
        select! {
            recv(self.write) -> token => {
                if token.is_err() {
                    // Consumer is gone; the line is tearing down.
                    return Ok(());
                }
                let mut staging = self.staging.lock();
                if let Some(frame) = staging.as_mut() {
                    frame.reset();
                    frame.copy_from(input);
                }
                drop(staging);
                if let Some(read) = &self.read {
                    let _ = read.send(());
                }
            }
            recv(cancel.channel()) -> _ => {}
        }
        Ok(())
    }

    fn flush(&mut self, _cancel: &CancelToken) -> Result<()> {
        // Closing the read token tells the consumer this input is done.
        self.read = None;
        Ok(())
    }
}

enum Wait {
    Ready,
    Flushed,
    Cancelled,
}

struct MixerSource {
    inputs: Vec<InputHandle>,
    pool: Arc<FramePool>,
    accumulator: Option<Frame>,
    cancel: Option<CancelToken>,
}

impl Source for MixerSource {
    fn start(&mut self, cancel: &CancelToken) -> Result<()> {
        self.cancel = Some(cancel.clone());
        Ok(())
    }

    fn process(&mut self, out: &mut Frame) -> Result<Option<usize>> {
        let cancel = self
            .cancel
            .clone()
            .expect("source started before process");
        let Some(accumulator) = self.accumulator.as_mut() else {
            return Ok(None);
        };

        let mut commit = 0usize;
        let mut index = 0;
        while index < self.inputs.len() {
            let wait = {
                let input = &self.inputs[index];
                select! {
                    recv(input.read) -> token => match token {
                        Ok(()) => Wait::Ready,
                        Err(_) => Wait::Flushed,
                    },
                    recv(cancel.channel()) -> _ => Wait::Cancelled,
                }
            };
            match wait {
                Wait::Ready => {
                    let input = &self.inputs[index];
                    let staging = input.staging.lock();
                    if let Some(frame) = staging.as_ref() {
                        commit = commit.max(frame.len());
                        accumulator.mix_from(frame);
                    }
                    drop(staging);
                    let _ = input.write.send(());
                    index += 1;
                }
                Wait::Flushed => {
                    let input = self.inputs.remove(index);
                    let taken = input.staging.lock().take();
                    if let Some(frame) = taken {
                        self.pool.release(frame);
                    }
                }
                Wait::Cancelled => return Ok(None),
            }
        }

        if self.inputs.is_empty() {
            return Ok(None);
        }

        let live = self.inputs.len() as f32;
        for ch in 0..accumulator.channels() {
            for sample in &mut accumulator.plane_mut(ch)[..commit] {
                *sample /= live;
            }
        }

        let written = commit.min(out.len());
        out.truncate(written);
        for ch in 0..out.channels() {
            out.plane_mut(ch)
                .copy_from_slice(&accumulator.plane(ch)[..written]);
        }

        accumulator.zero();
        Ok(Some(written))
    }

    fn flush(&mut self, _cancel: &CancelToken) -> Result<()> {
        if let Some(accumulator) = self.accumulator.take() {
            self.pool.release(accumulator);
        }
        for input in self.inputs.drain(..) {
            if let Some(frame) = input.staging.lock().take() {
                self.pool.release(frame);
            }
        }
        Ok(())
    }
}
