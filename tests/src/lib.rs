//! # Messenger Test Suite
//!
//! End-to-end request/reply flows over the in-memory bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Bus + dispatcher + client wiring, wire monitor
//! └── integration/
//!     ├── flows.rs      # Query outcomes: reply, failure, timeout, cancel
//!     └── routing.rs    # Unroutable requests, channel isolation, wire format
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p messenger-tests
//! cargo test -p messenger-tests integration::flows::
//! ```

pub mod harness;
pub mod integration;
