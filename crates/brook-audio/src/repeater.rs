//! Fan-out node: broadcasts one producer line to M consumer lines.
//!
//! Every consumer registers a capacity-1 mailbox. The sink copies each
//! incoming frame into a pool buffer, shares it with all mailboxes behind
//! an atomic descending refcount, and blocks when any mailbox is full, so
//! back-pressure reaches the producer uniformly. The last consumer to read
//! a frame returns it to the pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use brook_pipe::{
    CancelToken, Line, Mutation, SignalProperties, Sink, SinkAllocator, Source, SourceAllocator,
};
use brook_signal::{Frame, FramePool};

/// Sinks a signal and sources it to multiple pipelines.
#[derive(Default, Clone)]
pub struct Repeater {
    shared: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    properties: Option<SignalProperties>,
    pool: Option<Arc<FramePool>>,
    mailboxes: Vec<Sender<Arc<Broadcast>>>,
    flushed: bool,
}

/// One frame shared between all mailboxes of a single delivery.
struct Broadcast {
    remaining: AtomicUsize,
    frame: RwLock<Option<Frame>>,
}

impl Broadcast {
    fn new(shares: usize, frame: Frame) -> Self {
        Self {
            remaining: AtomicUsize::new(shares),
            frame: RwLock::new(Some(frame)),
        }
    }

    /// Gives up `shares` references; the last one returns the frame to the
    /// pool.
    fn consume(&self, shares: usize, pool: &FramePool) {
        if shares == 0 {
            return;
        }
        if self.remaining.fetch_sub(shares, Ordering::AcqRel) == shares {
            if let Some(frame) = self.frame.write().take() {
                pool.release(frame);
            }
        }
    }
}

impl Repeater {
    /// Returns the sink allocator. Must be bound once per repeater, before
    /// any of its sources.
    pub fn sink(&self) -> SinkAllocator {
        let shared = Arc::clone(&self.shared);
        SinkAllocator::new(move |buffer_size, properties| {
            let mut state = shared.lock();
            state.properties = Some(properties);
            state.pool = Some(FramePool::new(properties.channels, buffer_size));
            drop(state);
            Ok(Box::new(RepeaterSink {
                shared,
                cancel: None,
            }))
        })
    }

    /// Registers a mailbox and returns its source allocator. May be called
    /// any number of times; a source registered after the sink flushed
    /// observes end of stream immediately.
    pub fn source(&self) -> SourceAllocator {
        let (sender, mailbox) = bounded(1);
        {
            let mut state = self.shared.lock();
            if !state.flushed {
                state.mailboxes.push(sender);
            }
        }
        let shared = Arc::clone(&self.shared);
        SourceAllocator::new(move |_buffer_size| {
            let state = shared.lock();
            let properties = state
                .properties
                .ok_or_else(|| anyhow!("repeater source bound before sink"))?;
            let pool = state
                .pool
                .clone()
                .ok_or_else(|| anyhow!("repeater source bound before sink"))?;
            drop(state);
            Ok((
                Box::new(RepeaterSource {
                    mailbox,
                    pool,
                    cancel: None,
                }) as Box<dyn Source>,
                properties,
            ))
        })
    }

    /// Returns a mutation that attaches a new consumer line while the pipe
    /// is live: the mailbox registration and the line start happen in the
    /// runner's mutation phase.
    pub fn add_output(&self, sink: SinkAllocator) -> Mutation {
        let repeater = self.clone();
        Mutation::new(move |spawner| {
            tracing::debug!("attaching repeater output");
            spawner.spawn_line(Line::new(repeater.source(), sink))
        })
    }

    /// The pool backing broadcast frames, once the sink is bound. Exposed
    /// so callers can audit frame usage after a run.
    pub fn pool(&self) -> Option<Arc<FramePool>> {
        self.shared.lock().pool.clone()
    }
}

struct RepeaterSink {
    shared: Arc<Mutex<State>>,
    cancel: Option<CancelToken>,
}

enum Delivery {
    Sent,
    Gone,
    Cancelled,
}

impl Sink for RepeaterSink {
    fn start(&mut self, cancel: &CancelToken) -> Result<()> {
        self.cancel = Some(cancel.clone());
        Ok(())
    }

    fn process(&mut self, input: &Frame) -> Result<()> {
        let cancel = self.cancel.as_ref().expect("sink started before process");
        let mut state = self.shared.lock();
        let pool = state.pool.clone().expect("pool is created at sink allocation");

        let mut frame = pool.acquire();
        frame.copy_from(input);

        let fanout = state.mailboxes.len();
        if fanout == 0 {
            pool.release(frame);
            return Ok(());
        }

        let message = Arc::new(Broadcast::new(fanout, frame));
        let mut delivered = 0usize;
        let mut dropped = 0usize;
        let mut index = 0;
        while index < state.mailboxes.len() {
            let mailbox = state.mailboxes[index].clone();
            let delivery = select! {
                send(mailbox, Arc::clone(&message)) -> sent => {
                    if sent.is_ok() { Delivery::Sent } else { Delivery::Gone }
                }
                recv(cancel.channel()) -> _ => Delivery::Cancelled,
            };
            match delivery {
                Delivery::Sent => {
                    delivered += 1;
                    index += 1;
                }
                Delivery::Gone => {
                    state.mailboxes.remove(index);
                    dropped += 1;
                    message.consume(1, &pool);
                }
                Delivery::Cancelled => {
                    message.consume(fanout - delivered - dropped, &pool);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self, _cancel: &CancelToken) -> Result<()> {
        let mut state = self.shared.lock();
        state.mailboxes.clear();
        state.flushed = true;
        tracing::debug!("repeater mailboxes closed");
        Ok(())
    }
}

struct RepeaterSource {
    mailbox: Receiver<Arc<Broadcast>>,
    pool: Arc<FramePool>,
    cancel: Option<CancelToken>,
}

impl Source for RepeaterSource {
    fn start(&mut self, cancel: &CancelToken) -> Result<()> {
        self.cancel = Some(cancel.clone());
        Ok(())
    }

    fn process(&mut self, out: &mut Frame) -> Result<Option<usize>> {
        let cancel = self.cancel.as_ref().expect("source started before process");
        let message = select! {
            recv(self.mailbox) -> message => match message {
                Ok(message) => message,
                Err(_) => return Ok(None),
            },
            recv(cancel.channel()) -> _ => return Ok(None),
        };
        let read = {
            let frame = message.frame.read();
            match frame.as_ref() {
                Some(frame) => out.copy_from(frame),
                None => 0,
            }
        };
        message.consume(1, &self.pool);
        Ok(Some(read))
    }
}
