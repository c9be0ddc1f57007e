//! Offline-durable remote delivery for isaac.
//!
//! Commands bound for another device go through the [`RemoteRouter`]. What
//! cannot be delivered right away lands in the SQLite-backed
//! [`DurableQueue`], and the [`SyncWorker`] drains it in the background
//! once the [`RemoteLink`] reports the remote side reachable again.

pub mod link;
pub mod router;
pub mod store;
pub mod worker;

pub use link::{link_from_config, Delivery, DeliveryError, HttpLink, OfflineLink, RemoteLink};
pub use router::RemoteRouter;
pub use store::{CommandType, DurableQueue, QueueStatus, QueueSummary, QueuedCommand};
pub use worker::{Backoff, CompletionCallback, CycleReport, SyncHandle, SyncSettings, SyncWorker};
