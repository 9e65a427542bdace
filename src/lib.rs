//! Lazily started single-producer frame broadcaster
//!
//! `framecast` fans a continuously produced sequence of frames (typically
//! camera images) out to any number of independent consumers. Each consumer
//! polls at its own pace; the producer never blocks on a slow one.
//!
//! The frame source is expensive, so it only runs while somebody watches:
//! the first [`FrameRelay::connect`] starts the producer, and the producer
//! stops itself once no session has asked for a frame within the idle
//! timeout.
//!
//! # Architecture
//!
//! ```text
//!                           FrameRelay (Arc<ProducerState>)
//!                     ┌──────────────────────────────────────┐
//!                     │ current frame, running flag,         │
//!                     │ last access, delay                   │
//!                     │ Broadcaster {                        │
//!                     │   id → { signaled, last_signal,      │
//!                     │          FrameBuffer }               │
//!                     │ }                                    │
//!                     └──────────────────┬───────────────────┘
//!                                        │
//!         ┌──────────────────────────────┼─────────────────────────┐
//!         │                              │                         │
//!         ▼                              ▼                         ▼
//!   [ProducerLoop]               [ConsumerSession]          [ConsumerSession]
//!   publish() + notify_all()     wait/clear/take            wait/clear/take
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use framecast::{FrameRelay, IntervalSource};
//!
//! # async fn example() -> framecast::Result<()> {
//! let relay = FrameRelay::new(IntervalSource::new(Duration::from_millis(33), |i| {
//!     Ok(Bytes::from(i.to_be_bytes().to_vec()))
//! }));
//!
//! let mut session = relay.connect().await?;
//! loop {
//!     let frame = session.get_frame().await;
//!     println!("frame #{} ({} bytes)", frame.sequence, frame.len());
//! }
//! # }
//! ```

pub mod broadcast;
pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod relay;
pub mod session;
pub mod source;
pub mod stats;

mod producer;

pub use broadcast::{Broadcaster, ConsumerState, NotifyReport, PublishReport};
pub use buffer::FrameBuffer;
pub use config::{parse_delay_ms, RelayConfig};
pub use error::{Error, Result, SourceError};
pub use frame::{ConsumerId, Frame};
pub use relay::FrameRelay;
pub use session::ConsumerSession;
pub use source::{FrameSource, FrameStream, IntervalSource, IterSource};
pub use stats::RelayStats;
