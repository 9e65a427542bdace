//! Consumer registration state

use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::buffer::FrameBuffer;
use crate::frame::{ConsumerId, Frame};

/// Observable state of a registered consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Waiting for (or about to wait for) the next broadcast
    NotSignaled,
    /// Woken by a broadcast and not yet cleared
    Signaled,
}

/// Outcome of one [`notify_all`](super::Broadcaster::notify_all) pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Consumers moved from not-signaled to signaled
    pub signaled: usize,
    /// Consumers removed as stale
    pub evicted: Vec<ConsumerId>,
}

/// Outcome of one [`publish`](super::Broadcaster::publish) pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Consumers whose buffer received the frame
    pub delivered: usize,
    /// Older frames pushed out of full buffers
    pub dropped: usize,
}

/// Outcome of signaling a single registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SignalOutcome {
    /// Registration went from not-signaled to signaled
    Woken,
    /// Already signaled and still within the stale threshold
    Pending,
    /// Already signaled for longer than the stale threshold
    Stale,
}

struct RegistrationState {
    signaled: bool,
    last_signal: Instant,
    buffer: FrameBuffer,
}

/// One consumer's wake flag and frame buffer
pub(super) struct Registration {
    state: Mutex<RegistrationState>,
    wake: Notify,
}

impl Registration {
    pub(super) fn new(buffer_depth: usize) -> Self {
        Self {
            state: Mutex::new(RegistrationState {
                signaled: false,
                last_signal: Instant::now(),
                buffer: FrameBuffer::with_capacity(buffer_depth),
            }),
            wake: Notify::new(),
        }
    }

    /// Block until signaled
    ///
    /// `notify_one` stores a permit when nobody is parked yet, so a signal
    /// landing between the flag check and the park is not lost.
    pub(super) async fn wait(&self) {
        loop {
            if self.state.lock().await.signaled {
                return;
            }
            self.wake.notified().await;
        }
    }

    pub(super) async fn signal(&self, now: Instant, stale_threshold: Duration) -> SignalOutcome {
        let mut state = self.state.lock().await;

        if !state.signaled {
            state.signaled = true;
            state.last_signal = now;
            drop(state);
            self.wake.notify_one();
            return SignalOutcome::Woken;
        }

        if now.saturating_duration_since(state.last_signal) > stale_threshold {
            SignalOutcome::Stale
        } else {
            SignalOutcome::Pending
        }
    }

    pub(super) async fn is_stale(&self, now: Instant, stale_threshold: Duration) -> bool {
        let state = self.state.lock().await;
        state.signaled && now.saturating_duration_since(state.last_signal) > stale_threshold
    }

    pub(super) async fn clear(&self) {
        self.state.lock().await.signaled = false;
    }

    pub(super) async fn consumer_state(&self) -> ConsumerState {
        if self.state.lock().await.signaled {
            ConsumerState::Signaled
        } else {
            ConsumerState::NotSignaled
        }
    }

    pub(super) async fn push(&self, frame: Frame) -> usize {
        self.state.lock().await.buffer.publish(frame)
    }

    pub(super) async fn take_frame(&self) -> Option<Frame> {
        self.state.lock().await.buffer.take_oldest_unconsumed()
    }

    pub(super) async fn buffered(&self) -> usize {
        self.state.lock().await.buffer.len()
    }
}
