//! # Domain Layer - Transfer Scheduler
//!
//! Pure data and algorithms: records, the pool arena, the queue engine,
//! engine indications, housekeeping counters and snapshot encoding.
//!
//! ## Components
//!
//! - `entities`: TransactionRecord, status and condition codes, requests
//! - `value_objects`: EntityId, TransactionId, queue selectors, engine requests
//! - `pool`: RecordPool arena with generation-checked handles
//! - `queue`: doubly-linked queue engine and pending priority sort
//! - `indication`: engine event model
//! - `deferred`: auto-suspend side buffer
//! - `telemetry`: housekeeping counters
//! - `snapshot`: queue dump encoding
//! - `errors`: SchedulerError and port error enums

pub mod deferred;
pub mod entities;
pub mod errors;
pub mod indication;
pub mod pool;
pub mod queue;
pub mod snapshot;
pub mod telemetry;
pub mod value_objects;

pub use deferred::*;
pub use entities::*;
pub use errors::*;
pub use indication::*;
pub use pool::*;
pub use queue::*;
pub use snapshot::*;
pub use telemetry::*;
pub use value_objects::*;
