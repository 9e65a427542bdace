//! Endless periodic frame source

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::SourceError;
use crate::frame::Frame;

use super::{FrameSource, FrameStream};

type Generator = dyn Fn(u64) -> Result<Bytes, SourceError> + Send + Sync;

/// Shortest accepted frame period; `tokio::time::interval` rejects zero
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Source producing one frame per `period` from a generator closure
///
/// The generator receives the 0-based frame index of the current stream.
/// Returning an error ends the stream.
pub struct IntervalSource {
    period: Duration,
    generator: Arc<Generator>,
    open_streams: Arc<AtomicUsize>,
}

impl IntervalSource {
    /// Create a periodic source
    ///
    /// Periods shorter than [`MIN_PERIOD`] are raised to it.
    pub fn new<F>(period: Duration, generator: F) -> Self
    where
        F: Fn(u64) -> Result<Bytes, SourceError> + Send + Sync + 'static,
    {
        Self {
            period: period.max(MIN_PERIOD),
            generator: Arc::new(generator),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frame period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of streams currently open (not yet closed or dropped)
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for IntervalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalSource")
            .field("period", &self.period)
            .field("open_streams", &self.open_streams())
            .finish()
    }
}

impl FrameSource for IntervalSource {
    type Stream = IntervalStream;

    fn frames(&self) -> IntervalStream {
        self.open_streams.fetch_add(1, Ordering::AcqRel);

        IntervalStream {
            period: self.period,
            ticker: None,
            index: 0,
            generator: Arc::clone(&self.generator),
            open_streams: Some(Arc::clone(&self.open_streams)),
        }
    }
}

/// Stream over an [`IntervalSource`]
pub struct IntervalStream {
    period: Duration,
    /// Created on first poll so `frames()` needs no runtime
    ticker: Option<Interval>,
    index: u64,
    generator: Arc<Generator>,
    /// Present while the stream is open
    open_streams: Option<Arc<AtomicUsize>>,
}

impl IntervalStream {
    fn release(&mut self) {
        if let Some(counter) = self.open_streams.take() {
            counter.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl FrameStream for IntervalStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, SourceError>> {
        self.open_streams.as_ref()?;

        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let captured_at = ticker.tick().await;

        let index = self.index;
        self.index += 1;

        match (self.generator)(index) {
            Ok(data) => Some(Ok(Frame::new(data, captured_at))),
            Err(e) => {
                self.release();
                Some(Err(e))
            }
        }
    }

    async fn close(&mut self) {
        self.ticker = None;
        self.release();
    }
}

impl Drop for IntervalStream {
    fn drop(&mut self) {
        self.release();
    }
}
