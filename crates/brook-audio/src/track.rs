//! A timeline of non-overlapping audio clips with a windowed, gap-filling
//! source.
//!
//! Clips are kept in strictly increasing order of position and never
//! overlap: inserting into occupied space truncates or removes the old
//! material, and when an old clip extended past both edges of the new one
//! its tail is split off and re-inserted. Newer writes win within their
//! own extent. Reads stream an exact window of the timeline with silence
//! in the gaps.

use anyhow::Result;
use thiserror::Error;

use brook_pipe::{SignalProperties, Source, SourceAllocator};
use brook_signal::{Audio, Frame};

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid read interval [{start}, {end})")]
    InvalidInterval { start: i64, end: i64 },
}

/// A sequence of clips on an absolute sample timeline.
#[derive(Debug, Clone)]
pub struct Track {
    sample_rate: u32,
    channels: usize,
    links: Vec<Link>,
}

#[derive(Debug, Clone)]
struct Link {
    at: i64,
    data: Audio,
}

impl Link {
    fn end(&self) -> i64 {
        self.at + self.data.len() as i64
    }
}

impl Track {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            links: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Position one past the last sample of the last clip.
    pub fn end_index(&self) -> i64 {
        self.links.last().map(Link::end).unwrap_or(0)
    }

    /// Inserts a clip starting at `at`. Empty clips are ignored. Clips
    /// overlapped by the new one are truncated, removed or split so the
    /// timeline stays strictly non-overlapping.
    ///
    /// # Panics
    ///
    /// Panics when the clip's channel count differs from the track's.
    pub fn add_clip(&mut self, at: i64, data: Audio) {
        if data.is_empty() {
            return;
        }
        assert_eq!(
            data.channels(),
            self.channels,
            "clip channel count does not match track"
        );

        // First link that ends after `at`; insert before it when it starts
        // after `at`, otherwise right after it.
        let right = self.links.partition_point(|link| link.end() <= at);
        let index = if right < self.links.len() && self.links[right].at <= at {
            right + 1
        } else {
            right
        };
        self.links.insert(index, Link { at, data });
        self.align_next(index);
        self.align_previous(index);
    }

    /// Truncates or removes successors overlapped by the link at `index`.
    fn align_next(&mut self, index: usize) {
        while index + 1 < self.links.len() {
            let end = self.links[index].end();
            let next = &mut self.links[index + 1];
            let overlap = end - next.at;
            if overlap <= 0 {
                return;
            }
            if (next.data.len() as i64) > overlap {
                next.data = next.data.slice(overlap as usize, next.data.len());
                next.at += overlap;
                return;
            }
            self.links.remove(index + 1);
        }
    }

    /// Truncates the predecessor's right edge; when the old clip reached
    /// past the new link's end, re-inserts the part beyond it.
    fn align_previous(&mut self, index: usize) {
        if index == 0 {
            return;
        }
        let at = self.links[index].at;
        let len = self.links[index].data.len() as i64;
        let previous = &mut self.links[index - 1];
        let overlap = previous.end() - at;
        if overlap <= 0 {
            return;
        }
        let original = previous.data.clone();
        let kept = original.len() as i64 - overlap;
        if kept > 0 {
            previous.data = original.slice(0, kept as usize);
        } else {
            self.links.remove(index - 1);
        }
        if overlap > len {
            let tail_offset = (kept + len) as usize;
            let tail = original.slice(tail_offset, original.len());
            self.add_clip(at + len, tail);
        }
    }

    /// Returns a source streaming `[start, end)` of the timeline, exactly
    /// `end - start` samples per channel with silence in the gaps.
    /// `end == 0` means "to the last clip's end". Allocation fails with
    /// [`TrackError::InvalidInterval`] when `start` is negative or `end`
    /// precedes `start`.
    pub fn source(&self, start: i64, end: i64) -> SourceAllocator {
        let properties = SignalProperties {
            sample_rate: self.sample_rate,
            channels: self.channels,
        };
        let links = self.links.clone();
        let end_index = self.end_index();
        SourceAllocator::new(move |_buffer_size| {
            if start < 0 || (end != 0 && end < start) {
                return Err(TrackError::InvalidInterval { start, end }.into());
            }
            let end = if end == 0 { end_index.max(start) } else { end };
            Ok((
                Box::new(TrackSource {
                    links,
                    cursor: 0,
                    position: start,
                    end,
                }) as Box<dyn Source>,
                properties,
            ))
        })
    }

    #[cfg(any(test, fuzzing))]
    fn check_invariants(&self) {
        for pair in self.links.windows(2) {
            assert!(pair[0].at < pair[1].at, "links out of order");
            assert!(pair[0].end() <= pair[1].at, "links overlap");
        }
        for link in &self.links {
            assert!(!link.data.is_empty(), "zero-length link stored");
        }
    }
}

struct TrackSource {
    links: Vec<Link>,
    cursor: usize,
    position: i64,
    end: i64,
}

impl Source for TrackSource {
    fn process(&mut self, out: &mut Frame) -> Result<Option<usize>> {
        if self.position >= self.end {
            return Ok(None);
        }
        let want = (out.len() as i64).min(self.end - self.position) as usize;
        out.truncate(want);
        out.zero();
        let window_end = self.position + want as i64;

        while self.cursor < self.links.len() && self.links[self.cursor].end() <= self.position {
            self.cursor += 1;
        }
        let mut index = self.cursor;
        while index < self.links.len() {
            let link = &self.links[index];
            if link.at >= window_end {
                break;
            }
            let from = self.position.max(link.at);
            let until = window_end.min(link.end());
            let copy_start = (from - link.at) as usize;
            let copy_end = (until - link.at) as usize;
            let offset = (from - self.position) as usize;
            for ch in 0..out.channels() {
                let source = &link.data.plane(ch)[copy_start..copy_end];
                out.plane_mut(ch)[offset..offset + source.len()].copy_from_slice(source);
            }
            index += 1;
        }

        self.position = window_end;
        Ok(Some(want))
    }
}

/// Drives random clip insertions from fuzzer input and checks the
/// timeline invariants plus a full read pass.
pub fn fuzz_track_inserts(data: &[u8]) {
    let mut track = Track::new(44_100, 1);
    let source = Audio::from_planes(vec![(0..64).map(|v| v as f32).collect()]);
    for chunk in data.chunks_exact(3) {
        let at = chunk[0] as i64;
        let low = (chunk[1] % 64) as usize;
        let high = (low + chunk[2] as usize % 16).min(64);
        track.add_clip(at, source.slice(low, high));
        #[cfg(any(test, fuzzing))]
        track.check_invariants();
    }
    let allocator = track.source(0, 0);
    if let Ok((mut reader, _)) = allocator.allocate(8) {
        let mut frame = Frame::new(1, 8);
        loop {
            frame.reset();
            match reader.process(&mut frame) {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(base: f32) -> Audio {
        Audio::from_planes(vec![(0..10).map(|v| base + v as f32).collect()])
    }

    fn layout(track: &Track) -> Vec<(i64, usize)> {
        track
            .links
            .iter()
            .map(|link| (link.at, link.data.len()))
            .collect()
    }

    #[test]
    fn keeps_links_ordered_and_disjoint() {
        let mut track = Track::new(44_100, 1);
        let audio = ramp(10.0);
        track.add_clip(5, audio.slice(0, 4));
        track.add_clip(0, audio.slice(0, 3));
        track.add_clip(12, audio.slice(0, 2));
        track.check_invariants();
        assert_eq!(layout(&track), vec![(0, 3), (5, 4), (12, 2)]);
    }

    #[test]
    fn ignores_empty_clips() {
        let mut track = Track::new(44_100, 1);
        track.add_clip(3, ramp(0.0).slice(2, 2));
        assert!(track.is_empty());
        assert_eq!(track.end_index(), 0);
    }

    #[test]
    #[should_panic(expected = "channel count")]
    fn rejects_channel_mismatch() {
        let mut track = Track::new(44_100, 2);
        track.add_clip(0, ramp(0.0).slice(0, 4));
    }

    #[test]
    fn truncates_overlapped_successor() {
        let mut track = Track::new(44_100, 1);
        track.add_clip(3, ramp(10.0).slice(3, 6));
        track.add_clip(2, ramp(20.0).slice(5, 7));
        track.check_invariants();
        assert_eq!(layout(&track), vec![(2, 2), (4, 2)]);
        assert_eq!(track.links[0].data.plane(0), &[25.0, 26.0]);
        assert_eq!(track.links[1].data.plane(0), &[14.0, 15.0]);
    }

    #[test]
    fn removes_consumed_successors() {
        let mut track = Track::new(44_100, 1);
        track.add_clip(2, ramp(10.0).slice(3, 5));
        track.add_clip(5, ramp(10.0).slice(5, 7));
        track.add_clip(1, ramp(20.0).slice(1, 9));
        track.check_invariants();
        assert_eq!(layout(&track), vec![(1, 8)]);
    }

    #[test]
    fn splits_previous_on_interior_insert() {
        let mut track = Track::new(44_100, 1);
        track.add_clip(2, ramp(10.0).slice(0, 10));
        track.add_clip(4, ramp(20.0).slice(0, 3));
        track.check_invariants();
        assert_eq!(layout(&track), vec![(2, 2), (4, 3), (7, 5)]);
        assert_eq!(track.links[0].data.plane(0), &[10.0, 11.0]);
        assert_eq!(track.links[2].data.plane(0), &[15.0, 16.0, 17.0, 18.0, 19.0]);
    }

    #[test]
    fn drops_fully_covered_previous_and_keeps_tail() {
        let mut track = Track::new(44_100, 1);
        track.add_clip(2, ramp(10.0).slice(0, 10));
        track.add_clip(2, ramp(20.0).slice(0, 3));
        track.check_invariants();
        assert_eq!(layout(&track), vec![(2, 3), (5, 7)]);
        assert_eq!(track.links[1].data.plane(0), &[13.0, 14.0, 15.0, 16.0, 17.0, 18.0, 19.0]);
    }

    #[test]
    fn fuzz_harness_accepts_arbitrary_bytes() {
        fuzz_track_inserts(&[7, 3, 9, 1, 60, 15, 0, 0, 0, 255, 63, 15, 12, 5]);
    }
}
