//! DRAM command and address types.
//!
//! A `Command` is the unit of work on the DRAM command bus: one low-level
//! operation targeting one decoded location. Commands are produced from
//! host transactions by the controller and from refresh/power policy by the
//! channel internals.

use std::fmt;

/// A decoded DRAM location.
///
/// Every command targets one (rank, bankgroup, bank, row, column) tuple
/// within a channel. Rank-level commands (refresh, self-refresh entry/exit,
/// mode-register writes) only use the `rank` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Address {
    /// Channel index within the memory system.
    pub channel: usize,
    /// Rank index within the channel.
    pub rank: usize,
    /// Bankgroup index within the rank.
    pub bankgroup: usize,
    /// Bank index within the bankgroup.
    pub bank: usize,
    /// Row index within the bank.
    pub row: u64,
    /// Column index within the row.
    pub column: u64,
}

impl Address {
    /// An address naming only a rank, for rank-level commands.
    pub fn rank_only(rank: usize) -> Self {
        Self {
            rank,
            ..Self::default()
        }
    }
}

/// Low-level DRAM command types.
///
/// The discriminant doubles as an index into per-bank timing tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Open a row in a bank.
    Activate,
    /// Close the open row in a bank.
    Precharge,
    /// Column read from the open row.
    Read,
    /// Column write to the open row.
    Write,
    /// Column read with auto-precharge.
    ReadPrecharge,
    /// Column write with auto-precharge.
    WritePrecharge,
    /// Rank-level refresh.
    Refresh,
    /// Single-bank refresh.
    RefreshBank,
    /// Self-refresh entry (rank).
    SrefEnter,
    /// Self-refresh exit (rank).
    SrefExit,
    /// Mode register set (rank).
    Mrs,
}

/// Number of distinct command types; sizes the per-bank timing tables.
pub const NUM_COMMAND_TYPES: usize = 11;

impl CommandType {
    /// Timing-table index for this command type.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            CommandType::Activate => "ACTIVATE",
            CommandType::Precharge => "PRECHARGE",
            CommandType::Read => "READ",
            CommandType::Write => "WRITE",
            CommandType::ReadPrecharge => "READ_PRECHARGE",
            CommandType::WritePrecharge => "WRITE_PRECHARGE",
            CommandType::Refresh => "REFRESH",
            CommandType::RefreshBank => "REFRESH_BANK",
            CommandType::SrefEnter => "SREF_ENTER",
            CommandType::SrefExit => "SREF_EXIT",
            CommandType::Mrs => "MRS",
        }
    }
}

/// A scheduled DRAM command.
///
/// `hex_addr` carries the originating transaction's opaque address and is the
/// identity key used to settle pending-read/pending-write bookkeeping when
/// the command issues. Synthesized commands (precursors, refresh, power
/// transitions) carry `hex_addr == 0`; they never touch the pending maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    /// Operation on the command bus.
    pub cmd_type: CommandType,
    /// Decoded target location.
    pub addr: Address,
    /// Opaque address of the originating transaction.
    pub hex_addr: u64,
}

impl Command {
    /// Creates a command.
    pub fn new(cmd_type: CommandType, addr: Address, hex_addr: u64) -> Self {
        Self {
            cmd_type,
            addr,
            hex_addr,
        }
    }

    /// True for column reads (with or without auto-precharge).
    #[inline]
    pub fn is_read(&self) -> bool {
        matches!(
            self.cmd_type,
            CommandType::Read | CommandType::ReadPrecharge
        )
    }

    /// True for column writes (with or without auto-precharge).
    #[inline]
    pub fn is_write(&self) -> bool {
        matches!(
            self.cmd_type,
            CommandType::Write | CommandType::WritePrecharge
        )
    }

    /// True for any data-phase command.
    #[inline]
    pub fn is_read_write(&self) -> bool {
        self.is_read() || self.is_write()
    }

    /// True for rank-level or bank-level refresh.
    #[inline]
    pub fn is_refresh(&self) -> bool {
        matches!(
            self.cmd_type,
            CommandType::Refresh | CommandType::RefreshBank
        )
    }

    /// True for commands addressed to a whole rank rather than one bank.
    #[inline]
    pub fn is_rank_level(&self) -> bool {
        matches!(
            self.cmd_type,
            CommandType::Refresh
                | CommandType::SrefEnter
                | CommandType::SrefExit
                | CommandType::Mrs
        )
    }

    /// Target rank.
    #[inline]
    pub fn rank(&self) -> usize {
        self.addr.rank
    }

    /// Target bankgroup.
    #[inline]
    pub fn bankgroup(&self) -> usize {
        self.addr.bankgroup
    }

    /// Target bank.
    #[inline]
    pub fn bank(&self) -> usize {
        self.addr.bank
    }
}

impl fmt::Display for Command {
    /// Stable textual form, one token per field, used by the command trace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:>2} {:>2} {:>2} {:>2} {:#x} {:#x}",
            self.cmd_type.name(),
            self.addr.channel,
            self.addr.rank,
            self.addr.bankgroup,
            self.addr.bank,
            self.addr.row,
            self.addr.column
        )
    }
}
