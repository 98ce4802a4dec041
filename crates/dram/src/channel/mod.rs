//! Per-channel controller internals.
//!
//! This module organizes the components one channel is made of: the bank
//! state and timing tracker, the command queues, the refresh counter, the
//! optional on-DIMM buffer, and the controller that drives them all.

/// On-DIMM data buffer model (LRDIMM).
pub mod bob;

/// The per-channel memory controller.
pub mod controller;

/// Per-bank (or per-rank) command queues.
pub mod queue;

/// Refresh interval tracking.
pub mod refresh;

/// Bank state machines and the timing tracker.
pub mod state;

/// Command-to-command timing constraints.
pub mod timing;

pub use controller::Controller;
pub use state::{BankFsm, ChannelState};
