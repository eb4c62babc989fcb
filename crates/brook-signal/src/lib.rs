//! Sample buffers shared across the brook workspace.
//!
//! [`Frame`] is the unit of exchange between pipeline stages: a planar,
//! fixed-capacity block of `f32` samples whose effective length may be
//! narrowed for tail frames. [`Audio`] is immutable audio data behind an
//! `Arc`, sliceable without copying, used for clips and captured assets.
//! [`FramePool`] recycles frames of one `(channels, capacity)` shape.

mod frame;
mod pool;

pub use frame::{Audio, Frame};
pub use pool::FramePool;
