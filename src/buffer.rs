//! Per-consumer frame buffer
//!
//! Every consumer registration owns one of these, so a frame taken by one
//! reader is still available to all the others. The buffer is bounded: when
//! the producer outpaces a consumer the oldest entries are dropped, since a
//! fresh frame is worth more than a complete history.

use std::collections::VecDeque;

use tokio::time::Instant;

use crate::config::DEFAULT_BUFFER_DEPTH;
use crate::frame::Frame;

/// Bounded newest-first frame queue
///
/// Invariant: capture timestamps are non-increasing from head (newest) to
/// tail (oldest).
#[derive(Debug)]
pub struct FrameBuffer {
    /// Maximum number of frames held
    capacity: usize,
    /// Frames, newest at the front
    frames: VecDeque<Frame>,
    /// Frames dropped to stay within capacity
    dropped: u64,
}

impl FrameBuffer {
    /// Create a buffer with the default depth
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_DEPTH)
    }

    /// Create a buffer holding at most `capacity` frames (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            frames: VecDeque::with_capacity(capacity),
            dropped: 0,
        }
    }

    /// Insert a frame at the head
    ///
    /// Returns the number of old frames dropped to make room. A frame older
    /// than the current head is stored with the head's timestamp so the
    /// ordering invariant holds.
    pub fn publish(&mut self, frame: Frame) -> usize {
        let frame = match self.frames.front() {
            Some(head) if frame.captured_at < head.captured_at => Frame {
                captured_at: head.captured_at,
                ..frame
            },
            _ => frame,
        };

        self.frames.push_front(frame);

        let mut dropped = 0;
        while self.frames.len() > self.capacity {
            self.frames.pop_back();
            dropped += 1;
        }
        self.dropped += dropped as u64;
        dropped
    }

    /// Remove and return the oldest frame not yet consumed
    pub fn take_oldest_unconsumed(&mut self) -> Option<Frame> {
        self.frames.pop_back()
    }

    /// Most recently published frame
    pub fn newest(&self) -> Option<&Frame> {
        self.frames.front()
    }

    /// Oldest frame still buffered
    pub fn oldest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Drop all buffered frames
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Number of buffered frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Maximum number of frames held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total frames dropped on overflow
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Capture time of the oldest and newest buffered frames
    pub fn timestamp_range(&self) -> Option<(Instant, Instant)> {
        let oldest = self.frames.back()?.captured_at;
        let newest = self.frames.front()?.captured_at;
        Some((oldest, newest))
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    fn make_frame(base: Instant, offset_ms: u64, sequence: u64) -> Frame {
        Frame {
            data: Bytes::from(vec![sequence as u8; 4]),
            captured_at: base + Duration::from_millis(offset_ms),
            sequence,
        }
    }

    #[test]
    fn test_buffer_default() {
        let buffer = FrameBuffer::default();
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.is_empty());
        assert!(buffer.timestamp_range().is_none());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let buffer = FrameBuffer::with_capacity(0);
        assert_eq!(buffer.capacity(), 1);
    }

    #[test]
    fn test_take_oldest_first() {
        let base = Instant::now();
        let mut buffer = FrameBuffer::with_capacity(3);

        buffer.publish(make_frame(base, 0, 1));
        buffer.publish(make_frame(base, 33, 2));
        buffer.publish(make_frame(base, 66, 3));

        assert_eq!(buffer.newest().unwrap().sequence, 3);
        assert_eq!(buffer.oldest().unwrap().sequence, 1);

        assert_eq!(buffer.take_oldest_unconsumed().unwrap().sequence, 1);
        assert_eq!(buffer.take_oldest_unconsumed().unwrap().sequence, 2);
        assert_eq!(buffer.take_oldest_unconsumed().unwrap().sequence, 3);
        assert!(buffer.take_oldest_unconsumed().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let base = Instant::now();
        let mut buffer = FrameBuffer::with_capacity(2);

        assert_eq!(buffer.publish(make_frame(base, 0, 1)), 0);
        assert_eq!(buffer.publish(make_frame(base, 33, 2)), 0);
        assert_eq!(buffer.publish(make_frame(base, 66, 3)), 1);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.take_oldest_unconsumed().unwrap().sequence, 2);
    }

    #[test]
    fn test_depth_one_keeps_freshest() {
        let base = Instant::now();
        let mut buffer = FrameBuffer::new();

        for seq in 1..=5 {
            buffer.publish(make_frame(base, seq * 10, seq));
        }

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.dropped(), 4);
        assert_eq!(buffer.take_oldest_unconsumed().unwrap().sequence, 5);
    }

    #[test]
    fn test_timestamps_never_increase_toward_tail() {
        let base = Instant::now();
        let mut buffer = FrameBuffer::with_capacity(3);

        buffer.publish(make_frame(base, 50, 1));
        // Older capture time than the head
        buffer.publish(make_frame(base, 10, 2));

        let (oldest, newest) = buffer.timestamp_range().unwrap();
        assert!(newest >= oldest);
        assert_eq!(buffer.newest().unwrap().sequence, 2);
        assert_eq!(
            buffer.newest().unwrap().captured_at,
            base + Duration::from_millis(50)
        );
    }

    #[test]
    fn test_clear() {
        let base = Instant::now();
        let mut buffer = FrameBuffer::with_capacity(4);
        buffer.publish(make_frame(base, 0, 1));
        buffer.publish(make_frame(base, 10, 2));

        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped(), 0);
    }
}
