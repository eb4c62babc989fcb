//! Capture sink: records a line into memory for later slicing and replay.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use brook_pipe::{CancelToken, Sink, SinkAllocator};
use brook_signal::{Audio, Frame};

/// A sink that accumulates the received signal in a growable buffer. After
/// the pipe finishes, [`Asset::audio`] exposes the captured data, ready to
/// be sliced into track clips or streamed back with [`crate::source`].
#[derive(Default, Clone)]
pub struct Asset {
    inner: Arc<Mutex<Captured>>,
}

#[derive(Default)]
struct Captured {
    sample_rate: Option<u32>,
    audio: Option<Audio>,
}

impl Asset {
    pub fn sink(&self) -> SinkAllocator {
        let inner = Arc::clone(&self.inner);
        SinkAllocator::new(move |_buffer_size, properties| {
            inner.lock().sample_rate = Some(properties.sample_rate);
            Ok(Box::new(AssetSink {
                inner,
                planes: vec![Vec::new(); properties.channels],
            }))
        })
    }

    /// The captured audio, available once the sink has flushed.
    pub fn audio(&self) -> Option<Audio> {
        self.inner.lock().audio.clone()
    }

    /// Sample rate of the captured signal, set at sink allocation.
    pub fn sample_rate(&self) -> Option<u32> {
        self.inner.lock().sample_rate
    }
}

struct AssetSink {
    inner: Arc<Mutex<Captured>>,
    planes: Vec<Vec<f32>>,
}

impl Sink for AssetSink {
    fn process(&mut self, input: &Frame) -> Result<()> {
        for (ch, plane) in self.planes.iter_mut().enumerate() {
            plane.extend_from_slice(input.plane(ch));
        }
        Ok(())
    }

    fn flush(&mut self, _cancel: &CancelToken) -> Result<()> {
        let planes = std::mem::take(&mut self.planes);
        self.inner.lock().audio = Some(Audio::from_planes(planes));
        Ok(())
    }
}
