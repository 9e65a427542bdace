//! Broadcaster implementation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, TryLockError};
use tokio::time::Instant;

use crate::config::{RelayConfig, DEFAULT_BUFFER_DEPTH, DEFAULT_STALE_THRESHOLD};
use crate::frame::{ConsumerId, Frame};

use super::entry::{ConsumerState, NotifyReport, PublishReport, Registration, SignalOutcome};

/// Wakes every registered consumer when a new frame is available
pub struct Broadcaster {
    /// Registrations keyed by consumer id
    registrations: RwLock<HashMap<ConsumerId, Arc<Registration>>>,

    /// Signaled-but-unconsumed age after which a consumer is evicted
    stale_threshold: Duration,

    /// Depth of each registration's frame buffer
    buffer_depth: usize,
}

impl Broadcaster {
    /// Create a broadcaster with default thresholds
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_STALE_THRESHOLD, DEFAULT_BUFFER_DEPTH)
    }

    /// Create a broadcaster using the thresholds from a relay config
    pub fn with_config(config: &RelayConfig) -> Self {
        Self::with_settings(config.stale_threshold, config.buffer_depth)
    }

    /// Create a broadcaster with explicit settings
    pub fn with_settings(stale_threshold: Duration, buffer_depth: usize) -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
            stale_threshold,
            buffer_depth: buffer_depth.max(1),
        }
    }

    async fn registration(&self, id: ConsumerId) -> Arc<Registration> {
        if let Some(reg) = self.registrations.read().await.get(&id) {
            return Arc::clone(reg);
        }

        let mut registrations = self.registrations.write().await;
        let reg = registrations.entry(id).or_insert_with(|| {
            tracing::debug!(consumer = %id, "Consumer registered");
            Arc::new(Registration::new(self.buffer_depth))
        });
        Arc::clone(reg)
    }

    /// Register a consumer without waiting
    ///
    /// Idempotent. Registering before the first broadcast guarantees the
    /// consumer is included in it.
    pub async fn register(&self, id: ConsumerId) {
        self.registration(id).await;
    }

    /// Block until `id` is signaled
    ///
    /// Registers the consumer on first use. There is no timeout.
    pub async fn wait(&self, id: ConsumerId) {
        let reg = self.registration(id).await;
        reg.wait().await;
    }

    /// Reset `id` to not-signaled after it consumed a frame
    ///
    /// Returns false if the consumer is not registered (never waited, or
    /// already evicted).
    pub async fn clear(&self, id: ConsumerId) -> bool {
        let reg = self.registrations.read().await.get(&id).cloned();
        match reg {
            Some(reg) => {
                reg.clear().await;
                true
            }
            None => false,
        }
    }

    /// Push a frame into every registered consumer's buffer
    pub async fn publish(&self, frame: &Frame) -> PublishReport {
        let registrations = self.registrations.read().await;
        let mut report = PublishReport {
            delivered: registrations.len(),
            dropped: 0,
        };

        for reg in registrations.values() {
            let dropped = reg.push(frame.clone()).await;
            if dropped > 0 {
                tracing::trace!(sequence = frame.sequence, dropped, "Consumer buffer overflow");
                report.dropped += dropped;
            }
        }

        report
    }

    /// Take the oldest unconsumed frame from `id`'s buffer
    pub async fn take_frame(&self, id: ConsumerId) -> Option<Frame> {
        let reg = self.registrations.read().await.get(&id).cloned()?;
        reg.take_frame().await
    }

    /// Signal every consumer that is not already signaled
    ///
    /// Consumers still signaled from an earlier broadcast are checked for
    /// staleness instead; every one found older than the stale threshold is
    /// evicted.
    pub async fn notify_all(&self) -> NotifyReport {
        let now = Instant::now();
        let mut report = NotifyReport::default();
        let mut stale = Vec::new();

        {
            let registrations = self.registrations.read().await;
            for (id, reg) in registrations.iter() {
                match reg.signal(now, self.stale_threshold).await {
                    SignalOutcome::Woken => report.signaled += 1,
                    SignalOutcome::Pending => {}
                    SignalOutcome::Stale => stale.push(*id),
                }
            }
        }

        if stale.is_empty() {
            return report;
        }

        let mut registrations = self.registrations.write().await;
        for id in stale {
            // The consumer may have cleared between the scan and the write lock
            let still_stale = match registrations.get(&id) {
                Some(reg) => reg.is_stale(now, self.stale_threshold).await,
                None => false,
            };

            if still_stale {
                registrations.remove(&id);
                tracing::debug!(consumer = %id, "Stale consumer evicted");
                report.evicted.push(id);
            }
        }

        report
    }

    /// Remove a consumer's registration
    pub async fn unregister(&self, id: ConsumerId) -> bool {
        self.registrations.write().await.remove(&id).is_some()
    }

    /// Remove a consumer's registration without waiting for the lock
    ///
    /// Fails if the registration map is currently locked.
    pub fn try_unregister(&self, id: ConsumerId) -> Result<bool, TryLockError> {
        let mut registrations = self.registrations.try_write()?;
        Ok(registrations.remove(&id).is_some())
    }

    /// Current state of a consumer, `None` if unregistered or evicted
    pub async fn state(&self, id: ConsumerId) -> Option<ConsumerState> {
        let reg = self.registrations.read().await.get(&id).cloned()?;
        Some(reg.consumer_state().await)
    }

    /// Frames waiting in a consumer's buffer
    pub async fn buffered(&self, id: ConsumerId) -> usize {
        let reg = self.registrations.read().await.get(&id).cloned();
        match reg {
            Some(reg) => reg.buffered().await,
            None => 0,
        }
    }

    /// Number of registered consumers
    pub async fn consumer_count(&self) -> usize {
        self.registrations.read().await.len()
    }

    /// Whether `id` is registered
    pub async fn is_registered(&self, id: ConsumerId) -> bool {
        self.registrations.read().await.contains_key(&id)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}
