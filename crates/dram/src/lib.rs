//! Cycle-accurate DRAM memory controller library.
//!
//! This crate implements the per-channel controller core of a DRAM timing
//! simulator with the following:
//! 1. **Controller:** Transaction buffers, write draining, read-after-write
//!    forwarding, MRS prioritization, and the completion pipeline.
//! 2. **Channel state:** Per-bank state machines and the command-to-command
//!    timing tracker deciding when a command may issue.
//! 3. **Scheduling:** Per-bank command queues with first-ready FCFS pick
//!    and refresh obligations injected on the configured interval.
//! 4. **Power:** Self-refresh entry/exit for idle ranks and HBM-style
//!    dual-command issue.
//! 5. **System:** A multi-channel fan-out and an ideal fixed-latency
//!    baseline, plus configuration and statistics.

/// Per-channel controller internals (state, queues, refresh, controller).
pub mod channel;
/// Command, address, and transaction types.
pub mod common;
/// Simulator configuration and address mapping.
pub mod config;
/// Per-channel statistics collection and reporting.
pub mod stats;
/// Multi-channel and ideal memory systems.
pub mod system;
/// Collaborator traits for external back-ends.
pub mod traits;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Per-channel controller; drive it with `clock_tick`.
pub use crate::channel::Controller;
/// Multi-channel top level; construct with `MemorySystem::new`.
pub use crate::system::MemorySystem;
