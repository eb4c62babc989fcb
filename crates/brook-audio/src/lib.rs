//! Reusable audio nodes for [`brook_pipe`] pipelines.
//!
//! [`Mixer`] sums any number of producer lines into one consumer line with
//! per-frame averaging and strict frame alignment. [`Repeater`] broadcasts
//! one producer line to any number of consumer lines through refcounted
//! pool buffers. [`Track`] assembles non-overlapping clips on a timeline
//! and streams any window of it with silence in the gaps. [`Asset`]
//! captures a line into memory, and [`source`] streams captured or
//! pre-built [`brook_signal::Audio`] back into a pipeline.

pub mod asset;
pub mod mixer;
pub mod repeater;
pub mod source;
pub mod track;

pub use asset::Asset;
pub use mixer::{MixError, Mixer};
pub use repeater::Repeater;
pub use source::source;
pub use track::{Track, TrackError};
