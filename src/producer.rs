//! Producer loop and shared producer state
//!
//! Exactly one producer task runs per [`FrameRelay`](crate::FrameRelay) at
//! any time. It pulls frames from the source, fans them out into every
//! consumer's buffer, and wakes consumers no more often than the configured
//! delay allows:
//!
//! ```text
//!   FrameSource ──next_frame()──► ProducerLoop ──publish()──► per-consumer buffers
//!                                     │
//!                                     └── delay elapsed? ──notify_all()──► consumers
//! ```
//!
//! The loop stops itself when no consumer has asked for a frame within the
//! idle timeout, or when the source ends or fails. Start and stop both run
//! under the lifecycle mutex, so a consumer connecting at the same moment
//! the producer decides to stop either keeps it alive or starts a new one.
//!
//! Each run is spawned under a supervisor task. If the source panics the
//! supervisor marks the run stopped, so the next `connect` starts over.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::broadcast::Broadcaster;
use crate::config::RelayConfig;
use crate::frame::{ConsumerId, Frame};
use crate::source::{FrameSource, FrameStream};
use crate::stats::{RelayCounters, RelayStats};

/// Why a producer run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// No consumer activity within the idle timeout
    Idle,
    /// The source sequence ended
    SourceEnded,
    /// The source reported an error
    SourceFailed,
    /// The relay asked the producer to stop
    Shutdown,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Idle => write!(f, "idle"),
            StopReason::SourceEnded => write!(f, "source ended"),
            StopReason::SourceFailed => write!(f, "source failed"),
            StopReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Last consumer access, lock-free
struct ActivityClock {
    epoch: Instant,
    /// Microseconds since `epoch`
    last: AtomicU64,
}

impl ActivityClock {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let micros = Instant::now().saturating_duration_since(self.epoch).as_micros();
        self.last
            .fetch_max(u64::try_from(micros).unwrap_or(u64::MAX), Ordering::AcqRel);
    }

    fn idle_for(&self, now: Instant) -> Duration {
        let last = self.epoch + Duration::from_micros(self.last.load(Ordering::Acquire));
        now.saturating_duration_since(last)
    }
}

struct Lifecycle {
    /// Supervisor of the current run
    handle: Option<JoinHandle<()>>,
    /// Asks the current run to close its stream and exit
    halt: Option<Arc<Notify>>,
    generation: u64,
}

/// State shared by the producer task, the relay handle and every session
pub(crate) struct ProducerState {
    pub(crate) config: RelayConfig,
    pub(crate) broadcaster: Broadcaster,
    delay_ms: AtomicU64,
    current: RwLock<Option<Frame>>,
    activity: ActivityClock,
    running: watch::Sender<bool>,
    lifecycle: Mutex<Lifecycle>,
    counters: RelayCounters,
}

impl ProducerState {
    pub(crate) fn new(config: RelayConfig) -> Self {
        let (running, _) = watch::channel(false);

        Self {
            broadcaster: Broadcaster::with_config(&config),
            delay_ms: AtomicU64::new(duration_to_millis(config.delay)),
            current: RwLock::new(None),
            activity: ActivityClock::new(),
            running,
            lifecycle: Mutex::new(Lifecycle {
                handle: None,
                halt: None,
                generation: 0,
            }),
            counters: RelayCounters::default(),
            config,
        }
    }

    pub(crate) fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(duration_to_millis(delay), Ordering::Relaxed);
    }

    /// Record consumer activity, keeping the producer alive
    pub(crate) fn touch(&self) {
        self.activity.touch();
    }

    pub(crate) fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub(crate) fn subscribe_running(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    pub(crate) async fn current_frame(&self) -> Option<Frame> {
        self.current.read().await.clone()
    }

    pub(crate) async fn stats(&self) -> RelayStats {
        let consumers = self.broadcaster.consumer_count().await;
        self.counters.snapshot(consumers, self.is_running())
    }

    /// Spawn a producer unless one is already running
    ///
    /// `bootstrap` is registered before the task starts so it is included
    /// in the first broadcast. Returns true if a new producer was started.
    pub(crate) async fn start_if_stopped<S: FrameSource>(
        self: &Arc<Self>,
        source: &Arc<S>,
        bootstrap: ConsumerId,
    ) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        self.touch();

        if self.is_running() {
            return false;
        }

        self.broadcaster.register(bootstrap).await;

        lifecycle.generation += 1;
        let generation = lifecycle.generation;
        self.running.send_replace(true);
        self.counters.producer_started();

        let halt = Arc::new(Notify::new());
        let task = tokio::spawn(run(
            Arc::clone(source),
            Arc::clone(self),
            generation,
            Arc::clone(&halt),
        ));

        let state = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Err(e) = task.await {
                state.abandon(generation, e).await;
            }
        });

        lifecycle.handle = Some(handle);
        lifecycle.halt = Some(halt);
        true
    }

    /// Stop the running producer, if any, and wait for it to close its stream
    pub(crate) async fn shutdown(&self) -> bool {
        let (handle, generation) = {
            let mut lifecycle = self.lifecycle.lock().await;
            let Some(handle) = lifecycle.handle.take() else {
                return false;
            };
            if let Some(halt) = lifecycle.halt.take() {
                halt.notify_one();
            }
            self.running.send_replace(false);
            (handle, lifecycle.generation)
        };

        if let Err(e) = handle.await {
            tracing::warn!(generation, error = %e, "Producer supervisor failed");
        }
        tracing::info!(generation, "Producer shut down");
        true
    }

    /// End a run: close its stream and, if it is still the current run,
    /// mark the producer stopped
    ///
    /// An idle stop is skipped when a consumer touched the relay while we
    /// waited for the lock.
    async fn stop<T: FrameStream>(
        &self,
        stream: &mut T,
        reason: StopReason,
        generation: u64,
    ) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;

        if reason == StopReason::Idle && !self.idle_expired() {
            return false;
        }

        stream.close().await;

        // A later run owns the lifecycle after shutdown and restart
        if lifecycle.generation == generation {
            lifecycle.handle = None;
            lifecycle.halt = None;
            self.running.send_replace(false);
        }

        tracing::info!(generation, reason = %reason, "Producer stopped");
        true
    }

    /// Clean up after a run that panicked
    async fn abandon(&self, generation: u64, error: JoinError) {
        let mut lifecycle = self.lifecycle.lock().await;
        tracing::error!(generation, error = %error, "Producer task failed");

        if lifecycle.generation == generation {
            lifecycle.handle = None;
            lifecycle.halt = None;
            self.running.send_replace(false);
        }
    }

    fn idle_expired(&self) -> bool {
        self.activity.idle_for(Instant::now()) > self.config.idle_timeout
    }
}

fn duration_to_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Body of the producer task
async fn run<S: FrameSource>(
    source: Arc<S>,
    state: Arc<ProducerState>,
    generation: u64,
    halt: Arc<Notify>,
) {
    tracing::info!(
        generation,
        delay_ms = duration_to_millis(state.delay()),
        "Starting producer"
    );

    let mut stream = source.frames();
    let mut sequence = 0u64;
    let mut last_captured: Option<Instant> = None;
    // Capture time of the oldest frame published since the last broadcast
    let mut pending_since: Option<Instant> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = halt.notified() => None,
            next = stream.next_frame() => Some(next),
        };

        let frame = match next {
            Some(Some(Ok(frame))) => frame,
            Some(Some(Err(e))) => {
                tracing::warn!(generation, error = %e, "Frame source failed");
                state.stop(&mut stream, StopReason::SourceFailed, generation).await;
                return;
            }
            Some(None) => {
                state.stop(&mut stream, StopReason::SourceEnded, generation).await;
                return;
            }
            None => {
                state.stop(&mut stream, StopReason::Shutdown, generation).await;
                return;
            }
        };

        sequence += 1;
        let frame = frame.sequenced(sequence, last_captured);
        last_captured = Some(frame.captured_at);

        *state.current.write().await = Some(frame.clone());
        let published = state.broadcaster.publish(&frame).await;
        state.counters.frame_produced(published.dropped);

        let oldest = *pending_since.get_or_insert(frame.captured_at);
        if Instant::now().saturating_duration_since(oldest) >= state.delay() {
            let report = state.broadcaster.notify_all().await;
            state.counters.broadcast(report.evicted.len());
            pending_since = None;

            if !report.evicted.is_empty() {
                tracing::info!(
                    generation,
                    evicted = report.evicted.len(),
                    "Evicted stale consumers"
                );
            }
            tracing::trace!(generation, sequence, signaled = report.signaled, "Broadcast");
        }

        tokio::task::yield_now().await;

        if state.idle_expired()
            && state
                .stop(&mut stream, StopReason::Idle, generation)
                .await
        {
            return;
        }
    }
}
