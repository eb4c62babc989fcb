use std::sync::Arc;

/// A planar block of `f32` samples with a fixed capacity per channel and a
/// current length that may be narrowed for tail frames.
///
/// Storage is a single allocation of `channels * capacity` samples; channel
/// `ch` occupies the plane starting at `ch * capacity`. Narrowing with
/// [`Frame::truncate`] is a view adjustment and never copies or frees.
#[derive(Debug)]
pub struct Frame {
    channels: usize,
    capacity: usize,
    len: usize,
    data: Vec<f32>,
}

impl Frame {
    /// Allocates a frame of `channels * capacity` zeroed samples with the
    /// length set to the full capacity.
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            channels,
            capacity,
            len: capacity,
            data: vec![0.0; channels * capacity],
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current length in samples per channel.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total sample count across all channels (`len * channels`).
    pub fn total_samples(&self) -> usize {
        self.len * self.channels
    }

    /// Narrows the frame to `len` samples per channel.
    pub fn truncate(&mut self, len: usize) {
        self.len = len.min(self.capacity);
    }

    /// Restores the full capacity view.
    pub fn reset(&mut self) {
        self.len = self.capacity;
    }

    /// Zeroes the visible samples of every channel.
    pub fn zero(&mut self) {
        for ch in 0..self.channels {
            let base = ch * self.capacity;
            self.data[base..base + self.len].fill(0.0);
        }
    }

    pub fn plane(&self, channel: usize) -> &[f32] {
        let base = channel * self.capacity;
        &self.data[base..base + self.len]
    }

    pub fn plane_mut(&mut self, channel: usize) -> &mut [f32] {
        let base = channel * self.capacity;
        &mut self.data[base..base + self.len]
    }

    /// Reads one sample by linear channel-major index.
    pub fn sample(&self, index: usize) -> f32 {
        assert!(index < self.total_samples(), "sample index out of bounds");
        let channel = index / self.len;
        let offset = index % self.len;
        self.data[channel * self.capacity + offset]
    }

    /// Writes one sample by linear channel-major index.
    pub fn set_sample(&mut self, index: usize, value: f32) {
        assert!(index < self.total_samples(), "sample index out of bounds");
        let channel = index / self.len;
        let offset = index % self.len;
        self.data[channel * self.capacity + offset] = value;
    }

    /// Copies `source` into this frame, narrowing it to the copied length.
    /// Returns the number of samples copied per channel.
    pub fn copy_from(&mut self, source: &Frame) -> usize {
        debug_assert_eq!(self.channels, source.channels);
        let copied = self.len.min(source.len);
        for ch in 0..self.channels {
            let base = ch * self.capacity;
            self.data[base..base + copied].copy_from_slice(&source.plane(ch)[..copied]);
        }
        self.len = copied;
        copied
    }

    /// Adds `source` into this frame sample-wise, up to the shorter of the
    /// two lengths. The frame's own length is unchanged.
    pub fn mix_from(&mut self, source: &Frame) {
        debug_assert_eq!(self.channels, source.channels);
        let mixed = self.len.min(source.len);
        for ch in 0..self.channels {
            let base = ch * self.capacity;
            for (acc, sample) in self.data[base..base + mixed]
                .iter_mut()
                .zip(&source.plane(ch)[..mixed])
            {
                *acc += sample;
            }
        }
    }
}

/// Immutable audio data shared behind an `Arc`, with an `(offset, len)`
/// window so slicing is O(1).
#[derive(Debug, Clone)]
pub struct Audio {
    planes: Arc<Vec<Vec<f32>>>,
    offset: usize,
    len: usize,
}

impl Audio {
    /// Wraps planar channel data. Shorter planes are padded with silence to
    /// the longest plane.
    pub fn from_planes(planes: Vec<Vec<f32>>) -> Self {
        let len = planes.iter().map(Vec::len).max().unwrap_or(0);
        let planes = planes
            .into_iter()
            .map(|mut plane| {
                plane.resize(len, 0.0);
                plane
            })
            .collect();
        Self {
            planes: Arc::new(planes),
            offset: 0,
            len,
        }
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Length in samples per channel.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.planes.is_empty()
    }

    /// Returns the `[low, high)` window over the same storage.
    pub fn slice(&self, low: usize, high: usize) -> Audio {
        assert!(low <= high && high <= self.len, "audio slice out of bounds");
        Audio {
            planes: Arc::clone(&self.planes),
            offset: self.offset + low,
            len: high - low,
        }
    }

    pub fn plane(&self, channel: usize) -> &[f32] {
        &self.planes[channel][self.offset..self.offset + self.len]
    }

    pub fn sample(&self, index: usize) -> f32 {
        assert!(index < self.len * self.channels(), "sample index out of bounds");
        let channel = index / self.len;
        let offset = index % self.len;
        self.plane(channel)[offset]
    }
}
