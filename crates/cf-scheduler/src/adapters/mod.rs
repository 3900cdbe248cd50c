//! Adapters layer for the transfer scheduler.
//!
//! Provides a local file system store and a semaphore-backed handshake token.

pub mod filesystem;
pub mod handshake;

pub use filesystem::LocalFileStore;
pub use handshake::SemaphoreToken;
