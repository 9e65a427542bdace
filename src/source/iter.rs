//! Finite frame source backed by a list of payloads

use std::time::Duration;

use bytes::Bytes;

use crate::error::SourceError;
use crate::frame::Frame;

use super::{FrameSource, FrameStream};

/// Source replaying a fixed list of payloads
///
/// Every stream yields the full list, spaced `interval` apart, then ends.
#[derive(Debug, Clone)]
pub struct IterSource {
    payloads: Vec<Bytes>,
    interval: Duration,
}

impl IterSource {
    /// Create a source yielding `payloads` back to back
    pub fn new<I, B>(payloads: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            payloads: payloads.into_iter().map(Into::into).collect(),
            interval: Duration::ZERO,
        }
    }

    /// Space consecutive frames `interval` apart
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of payloads per stream
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Whether the source yields nothing
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl FrameSource for IterSource {
    type Stream = IterStream;

    fn frames(&self) -> IterStream {
        IterStream {
            payloads: self.payloads.clone().into_iter(),
            interval: self.interval,
            started: false,
        }
    }
}

/// Stream over an [`IterSource`]'s payloads
#[derive(Debug)]
pub struct IterStream {
    payloads: std::vec::IntoIter<Bytes>,
    interval: Duration,
    started: bool,
}

impl FrameStream for IterStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, SourceError>> {
        let payload = self.payloads.next()?;

        if self.started && !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        self.started = true;

        Some(Ok(Frame::now(payload)))
    }

    async fn close(&mut self) {
        self.payloads = Vec::new().into_iter();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_yields_all_payloads_then_ends() {
        let source = IterSource::new(vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(source.len(), 2);

        let mut stream = source.frames();
        assert_eq!(stream.next_frame().await.unwrap().unwrap().data, "a");
        assert_eq!(stream.next_frame().await.unwrap().unwrap().data, "b");
        assert!(stream.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_each_stream_starts_over() {
        let source = IterSource::new(vec![Bytes::from_static(b"x")]);

        let mut first = source.frames();
        assert!(first.next_frame().await.is_some());
        assert!(first.next_frame().await.is_none());

        let mut second = source.frames();
        assert!(second.next_frame().await.is_some());
    }

    #[tokio::test]
    async fn test_close_stops_yielding() {
        let source = IterSource::new(vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
        let mut stream = source.frames();

        stream.next_frame().await;
        stream.close().await;

        assert!(stream.next_frame().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_spacing() {
        let source =
            IterSource::new(vec![&b"a"[..], &b"b"[..]]).with_interval(Duration::from_millis(100));
        let mut stream = source.frames();

        let a = stream.next_frame().await.unwrap().unwrap();
        let b = stream.next_frame().await.unwrap().unwrap();

        assert!(b.captured_at - a.captured_at >= Duration::from_millis(100));
    }
}
