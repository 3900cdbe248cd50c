//! # CF Runtime
//!
//! Host process for the transfer scheduler.
//!
//! ## Modules
//!
//! - `settings` - environment-driven runtime settings
//! - `loopback` - in-process engine that delivers files to a local directory
//! - `output` - PDU sink and output flushing through the scheduler's gate
//!
//! ## Wakeup Loop
//!
//! ```text
//! interval tick ──→ scheduler.wakeup() ──→ flush_output()
//!                        │                      │
//!                        ▼                      ▼
//!               polls, starts, cycles     gate → sink → permit back
//! ```

pub mod loopback;
pub mod output;
pub mod settings;

pub use loopback::{LoopbackEngine, OutgoingPdu};
pub use output::{flush_output, TracingSink};
pub use settings::RuntimeSettings;
