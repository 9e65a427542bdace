//! Consumer sessions
//!
//! A session is one independent reader. Every call to
//! [`get_frame`](ConsumerSession::get_frame) runs the hand-off protocol:
//!
//! 1. refresh the relay's last-access time (keeps the producer alive)
//! 2. wait until the broadcaster signals this session
//! 3. clear the signal
//! 4. take the oldest unconsumed frame from this session's own buffer
//!
//! Sessions never coordinate with each other; a slow session only drops
//! frames from its own bounded buffer.

use std::sync::Arc;

use crate::broadcast::ConsumerState;
use crate::frame::{ConsumerId, Frame};
use crate::producer::ProducerState;

/// An independent frame reader
pub struct ConsumerSession {
    id: ConsumerId,
    state: Arc<ProducerState>,
}

impl ConsumerSession {
    pub(crate) fn new(id: ConsumerId, state: Arc<ProducerState>) -> Self {
        Self { id, state }
    }

    /// This session's consumer id
    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Wait for the next broadcast and return the frame owed to this session
    ///
    /// Blocks without timeout. If the producer has stopped, this only
    /// returns once a later [`connect`](crate::FrameRelay::connect) restarts it.
    pub async fn get_frame(&mut self) -> Frame {
        loop {
            self.state.touch();

            self.state.broadcaster.wait(self.id).await;
            self.state.broadcaster.clear(self.id).await;

            if let Some(frame) = self.state.broadcaster.take_frame(self.id).await {
                return frame;
            }

            // Registered after the publish that preceded this broadcast
            if let Some(frame) = self.state.current_frame().await {
                return frame;
            }
        }
    }

    /// Frames waiting in this session's buffer
    pub async fn buffered(&self) -> usize {
        self.state.broadcaster.buffered(self.id).await
    }

    /// Broadcaster state of this session, `None` if not registered
    pub async fn state(&self) -> Option<ConsumerState> {
        self.state.broadcaster.state(self.id).await
    }
}

impl std::fmt::Debug for ConsumerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerSession").field("id", &self.id).finish()
    }
}

/// Dropping a session removes its registration right away. Only leaked
/// sessions are left for stale eviction.
impl Drop for ConsumerSession {
    fn drop(&mut self) {
        if self.state.broadcaster.try_unregister(self.id).is_ok() {
            return;
        }

        // Map is locked right now; finish in the background if we can,
        // otherwise stale eviction cleans up
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let state = Arc::clone(&self.state);
            let id = self.id;
            handle.spawn(async move {
                state.broadcaster.unregister(id).await;
            });
        }
    }
}
