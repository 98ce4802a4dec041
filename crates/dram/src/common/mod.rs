//! Common types shared across the controller internals.

/// DRAM command and decoded address types.
pub mod command;

/// Host-visible transaction types.
pub mod transaction;

pub use command::{Address, Command, CommandType, NUM_COMMAND_TYPES};
pub use transaction::{Transaction, TransactionKind};
