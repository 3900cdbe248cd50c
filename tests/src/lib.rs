//! # Transfer Scheduler Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs    # Loopback harness in a temp directory
//!     └── flows.rs      # Playback, polling, suspend and cancel flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cf-tests
//! cargo test -p cf-tests integration::flows::
//! ```

pub mod integration;
