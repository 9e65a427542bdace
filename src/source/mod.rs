//! Frame sources
//!
//! A [`FrameSource`] is the expensive thing the relay keeps switched off
//! while nobody is watching: a camera, a decoder, a screen grabber. Each
//! producer run asks the source for a fresh [`FrameStream`] and pulls frames
//! from it until the stream ends or the relay goes idle, at which point the
//! stream is closed.
//!
//! This crate ships two sources:
//! - [`IterSource`]: a finite list of payloads, optionally paced
//! - [`IntervalSource`]: an endless periodic generator

use std::future::Future;

use crate::error::SourceError;
use crate::frame::Frame;

pub mod interval;
pub mod iter;

pub use interval::{IntervalSource, IntervalStream};
pub use iter::{IterSource, IterStream};

/// A lazy, possibly infinite, cancellable sequence of frames
pub trait FrameStream: Send + 'static {
    /// Produce the next frame
    ///
    /// `None` ends the sequence. An error also ends it; the producer logs it
    /// and stops.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<Frame, SourceError>>> + Send;

    /// Cancel the sequence early and release its resources
    ///
    /// After this returns the stream must not yield further frames.
    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Factory for frame streams, one per producer run
pub trait FrameSource: Send + Sync + 'static {
    /// Stream type produced by this source
    type Stream: FrameStream;

    /// Open a new frame stream
    fn frames(&self) -> Self::Stream;
}
