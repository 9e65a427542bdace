//! Lifecycle controller
//!
//! [`FrameRelay`] owns the single producer for one frame source. Connecting
//! a session starts the producer on demand; the producer stops by itself once
//! sessions stop asking for frames.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::frame::{ConsumerId, Frame};
use crate::producer::ProducerState;
use crate::session::ConsumerSession;
use crate::source::FrameSource;
use crate::stats::RelayStats;

/// Shared handle to a lazily started frame producer
///
/// Cloning is cheap; all clones drive the same producer.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
///
/// use bytes::Bytes;
/// use framecast::{FrameRelay, IntervalSource};
///
/// # async fn example() -> framecast::Result<()> {
/// let source = IntervalSource::new(Duration::from_millis(33), |i| {
///     Ok(Bytes::from(format!("frame {}", i)))
/// });
/// let relay = FrameRelay::new(source);
///
/// let mut session = relay.connect_with_delay(Duration::from_millis(100)).await?;
/// let frame = session.get_frame().await;
/// println!("got {} bytes", frame.len());
/// # Ok(())
/// # }
/// ```
pub struct FrameRelay<S: FrameSource> {
    source: Arc<S>,
    state: Arc<ProducerState>,
}

impl<S: FrameSource> FrameRelay<S> {
    /// Create a relay with default configuration
    pub fn new(source: S) -> Self {
        Self::with_config(source, RelayConfig::default())
    }

    /// Create a relay with custom configuration
    pub fn with_config(source: S, config: RelayConfig) -> Self {
        Self {
            source: Arc::new(source),
            state: Arc::new(ProducerState::new(config)),
        }
    }

    /// Get the relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.state.config
    }

    /// Get the frame source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Current broadcast throttle interval
    pub fn delay(&self) -> Duration {
        self.state.delay()
    }

    /// Connect a new session using the current throttle interval
    ///
    /// If no producer is running, one is started and this waits until it
    /// has broadcast its first frame, so the session's first `get_frame`
    /// returns without waiting for another broadcast. If a producer is
    /// already running it is reused.
    ///
    /// Returns [`Error::ProducerStopped`] if a freshly started producer stops
    /// before broadcasting anything (e.g. an empty or failing source).
    pub async fn connect(&self) -> Result<ConsumerSession> {
        let id = ConsumerId::next();
        let session = ConsumerSession::new(id, Arc::clone(&self.state));

        if !self.state.start_if_stopped(&self.source, id).await {
            tracing::debug!(consumer = %id, "Session connected to running producer");
            return Ok(session);
        }

        let mut running = self.state.subscribe_running();
        let first_frame = tokio::select! {
            biased;
            _ = self.state.broadcaster.wait(id) => true,
            _ = running.wait_for(|running| !*running) => false,
        };

        if first_frame {
            tracing::debug!(consumer = %id, "Session connected, first frame ready");
            Ok(session)
        } else {
            tracing::warn!(consumer = %id, "Producer stopped before first frame");
            Err(Error::ProducerStopped)
        }
    }

    /// Record a new throttle interval, then [`connect`](Self::connect)
    ///
    /// The interval applies to the shared producer, so it affects every
    /// session.
    pub async fn connect_with_delay(&self, delay: Duration) -> Result<ConsumerSession> {
        self.state.set_delay(delay);
        self.connect().await
    }

    /// Whether a producer is currently running
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Most recently produced frame
    pub async fn current_frame(&self) -> Option<Frame> {
        self.state.current_frame().await
    }

    /// Snapshot of relay statistics
    pub async fn stats(&self) -> RelayStats {
        self.state.stats().await
    }

    /// Wait until no producer is running
    pub async fn wait_stopped(&self) {
        let mut running = self.state.subscribe_running();
        // The sender lives in `self.state`, so this cannot fail
        let _ = running.wait_for(|running| !*running).await;
    }

    /// Stop the producer and wait until it has closed its stream
    ///
    /// Returns false if none was running. Sessions stay valid; the next
    /// `connect` starts a new producer.
    pub async fn shutdown(&self) -> bool {
        self.state.shutdown().await
    }
}

impl<S: FrameSource> Clone for FrameRelay<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: FrameSource> std::fmt::Debug for FrameRelay<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRelay")
            .field("config", &self.state.config)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::error::SourceError;
    use crate::source::{IntervalSource, IterSource};

    fn ticking_relay(period_ms: u64) -> FrameRelay<IntervalSource> {
        FrameRelay::new(IntervalSource::new(
            Duration::from_millis(period_ms),
            |i| Ok(Bytes::from(i.to_be_bytes().to_vec())),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_starts_producer() {
        let relay = ticking_relay(20);
        assert!(!relay.is_running());

        let _session = relay.connect().await.unwrap();

        assert!(relay.is_running());
        assert!(relay.current_frame().await.is_some());
        assert_eq!(relay.stats().await.producer_starts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_reuses_producer() {
        let relay = ticking_relay(20);

        let _a = relay.connect().await.unwrap();
        let _b = relay.connect().await.unwrap();
        let _c = relay.clone().connect().await.unwrap();

        assert_eq!(relay.stats().await.producer_starts, 1);
        assert_eq!(relay.source().open_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_with_delay_updates_throttle() {
        let relay = ticking_relay(20);
        assert_eq!(relay.delay(), Duration::ZERO);

        let _session = relay
            .connect_with_delay(Duration::from_millis(80))
            .await
            .unwrap();

        assert_eq!(relay.delay(), Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_source_fails_connect() {
        let relay = FrameRelay::new(IterSource::new(Vec::<Bytes>::new()));

        let result = relay.connect().await;

        assert!(matches!(result, Err(Error::ProducerStopped)));
        assert!(!relay.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_source_fails_connect() {
        let relay = FrameRelay::new(IntervalSource::new(Duration::from_millis(10), |_| {
            Err(SourceError::new("no camera"))
        }));

        assert!(matches!(relay.connect().await, Err(Error::ProducerStopped)));
        assert_eq!(relay.stats().await.frames_produced, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_source_fails_connect_then_recovers() {
        let crashed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&crashed);
        let relay = FrameRelay::new(IntervalSource::new(Duration::from_millis(10), move |i| {
            if !flag.swap(true, Ordering::AcqRel) {
                panic!("camera driver crashed");
            }
            Ok(Bytes::from(i.to_be_bytes().to_vec()))
        }));

        assert!(matches!(relay.connect().await, Err(Error::ProducerStopped)));
        assert!(crashed.load(Ordering::Acquire));
        assert!(!relay.is_running());

        let mut session = relay.connect().await.unwrap();
        assert_eq!(session.get_frame().await.sequence, 1);
        assert_eq!(relay.stats().await.producer_starts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_session_unregisters() {
        let relay = ticking_relay(20);

        let session = relay.connect().await.unwrap();
        assert_eq!(relay.stats().await.consumers, 1);

        drop(session);
        assert_eq!(relay.stats().await.consumers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_counts_dropped_frames() {
        let relay = ticking_relay(10);
        let _session = relay.connect().await.unwrap();

        // Depth 1: every new frame pushes the unread one out
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stats = relay.stats().await;
        assert!(stats.frames_dropped >= 5);
        assert!(stats.frames_dropped < stats.frames_produced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown() {
        let relay = ticking_relay(20);
        let _session = relay.connect().await.unwrap();

        assert!(relay.shutdown().await);
        assert!(!relay.is_running());

        assert_eq!(relay.source().open_streams(), 0);

        relay.connect().await.unwrap();
        assert!(relay.is_running());
        assert_eq!(relay.stats().await.producer_starts, 2);
    }
}
