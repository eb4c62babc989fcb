use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use brook_signal::FramePool;

use crate::cancel::{cancellation, CancelToken, Canceller};
use crate::line::{Line, Processor, SignalProperties, Sink, Source};

#[derive(Debug, Error)]
pub enum PipeError {
    #[error("buffer size must be positive")]
    InvalidBufferSize,
    #[error("pipe is no longer accepting mutations")]
    Finished,
}

/// A deferred change to a running pipe, applied by the runner between
/// frame processings. Used to attach new lines to live fan-out nodes.
pub struct Mutation(Box<dyn FnOnce(&mut LineSpawner) -> Result<()> + Send>);

impl Mutation {
    pub fn new<F>(apply: F) -> Self
    where
        F: FnOnce(&mut LineSpawner) -> Result<()> + Send + 'static,
    {
        Self(Box::new(apply))
    }

    fn apply(self, spawner: &mut LineSpawner) -> Result<()> {
        (self.0)(spawner)
    }
}

struct BoundLine {
    source: Box<dyn Source>,
    source_properties: SignalProperties,
    processors: Vec<(Box<dyn Processor>, SignalProperties)>,
    sink: Box<dyn Sink>,
}

fn bind_line(buffer_size: usize, line: Line) -> Result<BoundLine> {
    let (source, source_properties) = line.source.allocate(buffer_size)?;
    let mut properties = source_properties;
    let mut processors = Vec::with_capacity(line.processors.len());
    for allocator in line.processors {
        let (processor, output) = allocator.allocate(buffer_size, properties)?;
        processors.push((processor, output));
        properties = output;
    }
    let sink = line.sink.allocate(buffer_size, properties)?;
    Ok(BoundLine {
        source,
        source_properties,
        processors,
        sink,
    })
}

/// A bound pipeline, ready to run. Lines are bound in the order given, so
/// nodes that require a bind order (a mixer's sinks before its source) are
/// satisfied by listing their lines accordingly.
pub struct Pipe {
    buffer_size: usize,
    lines: Vec<BoundLine>,
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("buffer_size", &self.buffer_size)
            .field("lines", &self.lines.len())
            .finish()
    }
}

impl Pipe {
    pub fn new(buffer_size: usize, lines: Vec<Line>) -> Result<Self> {
        if buffer_size == 0 {
            return Err(PipeError::InvalidBufferSize.into());
        }
        let mut bound = Vec::with_capacity(lines.len());
        for (index, line) in lines.into_iter().enumerate() {
            bound.push(
                bind_line(buffer_size, line).with_context(|| format!("binding line {index}"))?,
            );
        }
        Ok(Self {
            buffer_size,
            lines: bound,
        })
    }

    /// Spawns one thread per line plus a supervisor that applies pushed
    /// mutations and joins everything on [`RunningPipe::wait`].
    pub fn run(self) -> RunningPipe {
        let (canceller, token) = cancellation();
        let (mutations, mutation_queue) = unbounded();
        let mut spawner = LineSpawner {
            buffer_size: self.buffer_size,
            token,
            canceller: canceller.clone(),
            handles: Vec::new(),
            next_index: 0,
            failure: None,
        };
        for line in self.lines {
            spawner.spawn_bound(line);
        }
        let supervisor = thread::Builder::new()
            .name("brook-pipe".into())
            .spawn(move || supervise(spawner, mutation_queue))
            .expect("failed to spawn pipe supervisor");
        RunningPipe {
            mutations,
            supervisor,
            canceller,
        }
    }
}

/// Handle to a live pipe.
pub struct RunningPipe {
    mutations: Sender<Mutation>,
    supervisor: JoinHandle<Result<()>>,
    canceller: Canceller,
}

impl RunningPipe {
    /// Queues a mutation for the runner to apply.
    pub fn push(&self, mutation: Mutation) -> Result<(), PipeError> {
        self.mutations
            .send(mutation)
            .map_err(|_| PipeError::Finished)
    }

    /// Requests cooperative shutdown; blocked nodes return without error
    /// and every line flushes.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Waits for every line to finish and returns the first error, if any.
    pub fn wait(self) -> Result<()> {
        let RunningPipe {
            mutations,
            supervisor,
            canceller: _,
        } = self;
        drop(mutations);
        match supervisor.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow!("pipe supervisor panicked")),
        }
    }
}

/// Binds and launches lines on behalf of the runner; handed to mutations
/// so fan-out nodes can attach consumers while the pipe is live.
pub struct LineSpawner {
    buffer_size: usize,
    token: CancelToken,
    canceller: Canceller,
    handles: Vec<JoinHandle<Result<()>>>,
    next_index: usize,
    failure: Option<anyhow::Error>,
}

impl LineSpawner {
    pub fn spawn_line(&mut self, line: Line) -> Result<()> {
        let bound = bind_line(self.buffer_size, line)?;
        self.spawn_bound(bound);
        Ok(())
    }

    fn spawn_bound(&mut self, line: BoundLine) {
        let index = self.next_index;
        self.next_index += 1;
        let buffer_size = self.buffer_size;
        let token = self.token.clone();
        let canceller = self.canceller.clone();
        let handle = thread::Builder::new()
            .name(format!("brook-line-{index}"))
            .spawn(move || run_line(line, buffer_size, token, canceller, index))
            .expect("failed to spawn line thread");
        self.handles.push(handle);
    }

    fn join(&mut self) -> Result<()> {
        let mut first = self.failure.take();
        for handle in self.handles.drain(..) {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    first.get_or_insert(err);
                }
                Err(_) => {
                    first.get_or_insert_with(|| anyhow!("line thread panicked"));
                }
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn supervise(mut spawner: LineSpawner, mutations: Receiver<Mutation>) -> Result<()> {
    while let Ok(mutation) = mutations.recv() {
        if let Err(err) = mutation.apply(&mut spawner) {
            tracing::warn!(error = %err, "pipe mutation failed");
            spawner.canceller.cancel();
            spawner.failure.get_or_insert(err);
        }
    }
    spawner.join()
}

fn run_line(
    mut line: BoundLine,
    buffer_size: usize,
    cancel: CancelToken,
    canceller: Canceller,
    index: usize,
) -> Result<()> {
    tracing::debug!(line = index, "line started");
    let result = execute(&mut line, buffer_size, &cancel);
    if let Err(err) = &result {
        tracing::error!(line = index, error = %err, "line failed");
        canceller.cancel();
    }
    let flushed = flush(&mut line, &cancel);
    tracing::debug!(line = index, "line finished");
    result.and(flushed)
}

fn execute(line: &mut BoundLine, buffer_size: usize, cancel: &CancelToken) -> Result<()> {
    line.source.start(cancel)?;
    for (processor, _) in &mut line.processors {
        processor.start(cancel)?;
    }
    line.sink.start(cancel)?;

    let source_pool = FramePool::new(line.source_properties.channels, buffer_size);
    let stage_pools: Vec<Arc<FramePool>> = line
        .processors
        .iter()
        .map(|(_, properties)| FramePool::new(properties.channels, buffer_size))
        .collect();

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let mut frame = source_pool.acquire();
        let written = match line.source.process(&mut frame)? {
            Some(written) => written,
            None => {
                source_pool.release(frame);
                return Ok(());
            }
        };
        frame.truncate(written);

        let mut current = frame;
        let mut current_pool = Arc::clone(&source_pool);
        for (stage, (processor, _)) in line.processors.iter_mut().enumerate() {
            let mut output = stage_pools[stage].acquire();
            let written = processor.process(&current, &mut output)?;
            output.truncate(written);
            current_pool.release(current);
            current = output;
            current_pool = Arc::clone(&stage_pools[stage]);
        }

        line.sink.process(&current)?;
        current_pool.release(current);
    }
}

fn flush(line: &mut BoundLine, cancel: &CancelToken) -> Result<()> {
    let mut result = line.source.flush(cancel);
    for (processor, _) in &mut line.processors {
        let flushed = processor.flush(cancel);
        result = result.and(flushed);
    }
    let flushed = line.sink.flush(cancel);
    result.and(flushed)
}
