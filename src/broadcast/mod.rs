//! Per-consumer broadcast and wake
//!
//! The producer announces "a new frame exists" to every registered consumer
//! independently. Each consumer has its own edge-triggered signal: it is set
//! by [`Broadcaster::notify_all`] and must be reset by the consumer with
//! [`Broadcaster::clear`] after it has read its frame.
//!
//! # Lifecycle of one registration
//!
//! ```text
//!   Unregistered ──wait()──► NotSignaled ──notify_all()──► Signaled
//!                                 ▲                            │
//!                                 └──────────clear()───────────┘
//!                                                              │
//!                           notify_all() sees it stale (> 5s)  ▼
//!                                                           Evicted
//! ```
//!
//! Eviction is only ever decided by the producer side. A consumer that was
//! signaled and never came back is assumed gone.
//!
//! # Locking
//!
//! The registration map sits behind a `tokio::sync::RwLock` and is only
//! write-locked to insert or remove entries. Each registration carries its
//! own mutex, so the producer and a consumer contend per entry rather than
//! on one global lock.

pub mod entry;
pub mod store;

pub use entry::{ConsumerState, NotifyReport, PublishReport};
pub use store::Broadcaster;
