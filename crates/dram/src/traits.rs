//! Collaborator traits for external back-ends.
//!
//! Power, thermal, and trace consumers observe the controller without owning
//! any of its state: they are injected at construction and notified during
//! the tick. Observers must not drive the controller re-entrantly.

use crate::common::Command;

/// An external collaborator notified of controller activity.
pub trait CommandObserver {
    /// Called for every issued command, before channel state updates.
    fn command_issued(&mut self, cmd: &Command, clk: u64);

    /// Called once at the end of every tick.
    fn post_tick(&mut self, _clk: u64) {}
}
