//! Source for pre-loaded audio data.

use anyhow::Result;

use brook_pipe::{SignalProperties, Source, SourceAllocator};
use brook_signal::{Audio, Frame};

/// Streams `audio` frame by frame at the given sample rate, ending the
/// stream after the last sample.
pub fn source(sample_rate: u32, audio: Audio) -> SourceAllocator {
    SourceAllocator::new(move |_buffer_size| {
        let properties = SignalProperties {
            sample_rate,
            channels: audio.channels(),
        };
        Ok((
            Box::new(AudioSource { audio, position: 0 }) as Box<dyn Source>,
            properties,
        ))
    })
}

struct AudioSource {
    audio: Audio,
    position: usize,
}

impl Source for AudioSource {
    fn process(&mut self, out: &mut Frame) -> Result<Option<usize>> {
        if self.position == self.audio.len() {
            return Ok(None);
        }
        let written = out.len().min(self.audio.len() - self.position);
        out.truncate(written);
        for ch in 0..out.channels() {
            out.plane_mut(ch)
                .copy_from_slice(&self.audio.plane(ch)[self.position..self.position + written]);
        }
        self.position += written;
        Ok(Some(written))
    }
}
