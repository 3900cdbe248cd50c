//! Ports layer - hexagonal architecture interfaces.
//!
//! - `inbound`: SchedulerApi, the command surface
//! - `outbound`: TransferEngine, FileStore, PduSink, HandshakeToken

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
