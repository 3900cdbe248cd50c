//! Application layer: the scheduler service and its command surface.
//!
//! - `scheduler`: state, queue plumbing, engine pump and wakeup
//! - `playback`: enqueue, directory scans, starting files
//! - `uplink`: incoming transaction tracking
//! - `indication`: engine event dispatch
//! - `output`: PDU flow control
//! - `commands`: `SchedulerApi` implementation

mod commands;
mod indication;
mod output;
mod playback;
pub mod scheduler;
mod uplink;

pub use scheduler::FileScheduler;
