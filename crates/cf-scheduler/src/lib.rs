//! # CFDP Transfer Scheduler
//!
//! Scheduling and queue layer of a CFDP file delivery service. The protocol
//! state machines live in an external engine; this crate decides which files
//! the engine sends, in what order, over which output channel, and keeps the
//! bookkeeping operators see.
//!
//! ## Queues
//!
//! | Queue | Scope | Entered on | Left on |
//! |-------|-------|------------|---------|
//! | Pending | per channel | enqueue command, directory scan | engine allocation, refusal |
//! | Active | per channel | engine allocation | deallocation |
//! | History | per channel | deallocation, failed start | eviction past depth |
//! | Uplink active | system | receiver allocation | deallocation |
//! | Uplink history | system | deallocation | eviction past depth |
//!
//! Every record lives on exactly one queue. Records are drawn from a fixed
//! [`RecordPool`](domain::RecordPool); handles carry a generation so a
//! released record can never be touched through an old handle.
//!
//! ## Outbound Lifecycle
//!
//! ```text
//! [PENDING] ──offer──→ [PUT_REQ_ISSUED] ──MachineAllocated──→ [ACTIVE]
//!     │                      │                                   │
//!     │ file active          │ engine refuses                    │ MachineDeallocated
//!     ▼                      ▼                                   ▼
//! [ALRDY_ACTIVE]       [PUT_REQ_FAILED]              [SUCCESSFUL | CANCELLED | ...]
//!     └──────────────────────┴───────────→ history ←─────────────┘
//! ```
//!
//! A channel sends file data for one transaction at a time. It is
//! *blasting* from allocation until EOF is sent, and no new file starts
//! while it blasts.
//!
//! ## Engine Interaction
//!
//! The engine never calls back into the scheduler. After each engine call
//! the scheduler drains [`TransferEngine::take_indications`] and reacts.
//! Suspends requested by the auto-suspend policy are deferred until that
//! drain completes.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - LocalFileStore, SemaphoreToken                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - SchedulerApi trait                         │
//! │  ports/outbound.rs - TransferEngine, FileStore, PduSink,        │
//! │                      HandshakeToken traits                      │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/pool.rs   - RecordPool arena                            │
//! │  domain/queue.rs  - Queue engine and pending sort               │
//! │  domain/entities.rs - TransactionRecord, status codes           │
//! │  application/     - FileScheduler                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use cf_scheduler::{FileScheduler, LocalFileStore, SchedulerApi, SchedulerConfig};
//!
//! let config = SchedulerConfig::load("cf_config.json")?;
//! let mut scheduler = FileScheduler::new(config, engine, LocalFileStore::new(), sink)?;
//! scheduler.enqueue_playback(request)?;
//! loop {
//!     scheduler.wakeup();
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use adapters::{LocalFileStore, SemaphoreToken};
pub use application::FileScheduler;
pub use config::{ChannelConfig, PollDirConfig, SchedulerConfig};
pub use domain::*;
pub use ports::inbound::*;
pub use ports::outbound::{DirEntry, FileStore, HandshakeToken, PduSink, TransferEngine};
