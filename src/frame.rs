//! Frame and consumer identity types
//!
//! Frames are produced once and shared by every consumer. The payload is a
//! `bytes::Bytes`, so handing the same frame to many consumers only bumps a
//! reference count.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::time::Instant;

/// Identity of one consumer session
///
/// Each [`ConsumerSession`](crate::ConsumerSession) gets its own id, so the
/// broadcaster can track wake state per reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// Allocate a fresh, process-unique consumer id
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// A captured frame
///
/// Cheap to clone due to `Bytes` reference counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opaque payload (e.g. an encoded JPEG)
    pub data: Bytes,
    /// Capture time
    pub captured_at: Instant,
    /// Position in the producer's output, starting at 1 per producer run.
    /// Sources leave this at 0; the producer assigns it.
    pub sequence: u64,
}

impl Frame {
    /// Create a frame captured at the given instant
    pub fn new(data: impl Into<Bytes>, captured_at: Instant) -> Self {
        Self {
            data: data.into(),
            captured_at,
            sequence: 0,
        }
    }

    /// Create a frame captured now
    pub fn now(data: impl Into<Bytes>) -> Self {
        Self::new(data, Instant::now())
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn sequenced(self, sequence: u64, not_before: Option<Instant>) -> Self {
        let captured_at = match not_before {
            Some(floor) if self.captured_at < floor => floor,
            _ => self.captured_at,
        };
        Self {
            data: self.data,
            captured_at,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_consumer_ids_are_unique() {
        let a = ConsumerId::next();
        let b = ConsumerId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
        assert_eq!(a.to_string(), format!("consumer-{}", a.as_u64()));
    }

    #[test]
    fn test_frame_payload() {
        let frame = Frame::now(Bytes::from_static(b"jpeg"));
        assert_eq!(frame.len(), 4);
        assert!(!frame.is_empty());
        assert_eq!(frame.sequence, 0);
    }

    #[test]
    fn test_sequenced_clamps_backwards_timestamps() {
        let base = Instant::now();
        let later = base + Duration::from_millis(40);

        let frame = Frame::new(Bytes::from_static(b"x"), base).sequenced(7, Some(later));
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.captured_at, later);

        let frame = Frame::new(Bytes::from_static(b"y"), later).sequenced(8, Some(base));
        assert_eq!(frame.captured_at, later);
    }
}
