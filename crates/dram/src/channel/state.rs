//! Per-bank state machines and the channel timing tracker.
//!
//! `ChannelState` owns one `BankState` per (rank, bankgroup, bank) plus the
//! derived timing table. It answers two questions for the command queue:
//! 1. **Legality:** Given a desired command, what may actually issue right
//!    now? Either the command itself, a precursor (activate, precharge,
//!    self-refresh exit), or nothing yet.
//! 2. **Aftereffects:** When a command issues, which banks' earliest-legal
//!    clocks move, and which state machines transition?
//!
//! It also carries the channel's refresh obligations and the per-rank power
//! accounting state the controller reads each tick.

use std::cmp::max;
use std::collections::VecDeque;

use crate::common::{Address, Command, CommandType, NUM_COMMAND_TYPES};
use crate::config::Config;

use super::timing::Timing;

/// Finite state of one bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankFsm {
    /// No row open.
    Closed,
    /// The given row is open in the row buffer.
    Open(u64),
    /// The rank is in self-refresh.
    SelfRefresh,
    /// The rank is powered down. No policy enters this state; commands
    /// reaching a powered-down bank are a contract violation.
    PowerDown,
}

/// One bank: FSM, earliest-legal-clock table, row-hit counter.
struct BankState {
    fsm: BankFsm,
    /// Earliest clock at which each command type may issue to this bank.
    cmd_timing: [u64; NUM_COMMAND_TYPES],
    /// Column accesses served by the currently open row.
    row_hit_count: u32,
}

impl BankState {
    fn new() -> Self {
        Self {
            fsm: BankFsm::Closed,
            cmd_timing: [0; NUM_COMMAND_TYPES],
            row_hit_count: 0,
        }
    }

    /// The command that must issue next to make progress toward `want`.
    ///
    /// Returns `want` itself when the FSM permits it directly, otherwise the
    /// precursor (activate, precharge, or self-refresh exit).
    fn required_command(&self, want: CommandType, row: u64) -> CommandType {
        use CommandType::*;
        match want {
            Read | Write | ReadPrecharge | WritePrecharge => match self.fsm {
                BankFsm::Closed => Activate,
                BankFsm::Open(open) if open == row => want,
                BankFsm::Open(_) => Precharge,
                BankFsm::SelfRefresh => SrefExit,
                BankFsm::PowerDown => panic!("column command to a powered-down rank"),
            },
            Activate => match self.fsm {
                BankFsm::Closed => Activate,
                BankFsm::Open(_) => Precharge,
                BankFsm::SelfRefresh => SrefExit,
                BankFsm::PowerDown => panic!("activate to a powered-down rank"),
            },
            Precharge => match self.fsm {
                BankFsm::Closed | BankFsm::Open(_) => Precharge,
                BankFsm::SelfRefresh => SrefExit,
                BankFsm::PowerDown => panic!("precharge to a powered-down rank"),
            },
            Refresh | RefreshBank | SrefEnter | Mrs => match self.fsm {
                BankFsm::Closed => want,
                BankFsm::Open(_) => Precharge,
                BankFsm::SelfRefresh => SrefExit,
                BankFsm::PowerDown => panic!("rank command to a powered-down rank"),
            },
            SrefExit => match self.fsm {
                BankFsm::SelfRefresh => SrefExit,
                _ => panic!("self-refresh exit for a rank that is not self-refreshing"),
            },
        }
    }

    #[inline]
    fn ready(&self, cmd_type: CommandType, clk: u64) -> bool {
        clk >= self.cmd_timing[cmd_type.index()]
    }

    /// Applies a constraint list; timers only ever move forward.
    fn apply(&mut self, constraints: &[(CommandType, u64)], clk: u64) {
        for &(cmd_type, delay) in constraints {
            let slot = &mut self.cmd_timing[cmd_type.index()];
            *slot = max(*slot, clk + delay);
        }
    }
}

/// Bank FSMs, timing tracker, refresh obligations, and power accounting for
/// one channel.
pub struct ChannelState {
    ranks: usize,
    bankgroups: usize,
    banks_per_group: usize,
    timing: Timing,
    /// Flat `[rank][bankgroup][bank]` bank array.
    banks: Vec<BankState>,
    /// Consecutive cycles each rank has had every bank idle. The controller
    /// resets and advances this during its per-tick power accounting.
    pub rank_idle_cycles: Vec<u64>,
    rank_is_sref: Vec<bool>,
    /// Refresh commands owed to the channel, oldest first.
    refresh_q: VecDeque<Command>,
}

impl ChannelState {
    /// Builds the tracker for `config`'s geometry and timing.
    pub fn new(config: &Config) -> Self {
        let ranks = config.dram.ranks;
        let num_banks = ranks * config.dram.banks_per_rank();
        Self {
            ranks,
            bankgroups: config.dram.bankgroups,
            banks_per_group: config.dram.banks_per_group,
            timing: Timing::new(&config.timing),
            banks: (0..num_banks).map(|_| BankState::new()).collect(),
            rank_idle_cycles: vec![0; ranks],
            rank_is_sref: vec![false; ranks],
            refresh_q: VecDeque::new(),
        }
    }

    #[inline]
    fn bank_index(&self, rank: usize, bankgroup: usize, bank: usize) -> usize {
        (rank * self.bankgroups + bankgroup) * self.banks_per_group + bank
    }

    #[inline]
    fn rank_range(&self, rank: usize) -> std::ops::Range<usize> {
        let banks_per_rank = self.bankgroups * self.banks_per_group;
        rank * banks_per_rank..(rank + 1) * banks_per_rank
    }

    /// Resolves a desired command against the bank FSMs and timing.
    ///
    /// Returns the command itself when legal now, the precursor that must
    /// issue first when one is needed and legal, or `None` while timing
    /// blocks any progress.
    pub fn get_ready_command(&self, cmd: &Command, clk: u64) -> Option<Command> {
        if cmd.is_rank_level() {
            self.get_ready_rank_command(cmd, clk)
        } else {
            let bank =
                &self.banks[self.bank_index(cmd.rank(), cmd.bankgroup(), cmd.bank())];
            let required = bank.required_command(cmd.cmd_type, cmd.addr.row);
            if required == CommandType::SrefExit {
                let exit = Command::new(
                    CommandType::SrefExit,
                    Address::rank_only(cmd.rank()),
                    0,
                );
                return bank.ready(CommandType::SrefExit, clk).then_some(exit);
            }
            bank.ready(required, clk)
                .then(|| Command::new(required, cmd.addr, cmd.hex_addr))
        }
    }

    /// Rank-level resolution: every bank of the rank must permit the
    /// command; the first legal precursor wins otherwise.
    fn get_ready_rank_command(&self, cmd: &Command, clk: u64) -> Option<Command> {
        let rank = cmd.rank();
        let banks_per_rank = self.bankgroups * self.banks_per_group;
        let mut precursor_needed = false;

        for offset in 0..banks_per_rank {
            let bankgroup = offset / self.banks_per_group;
            let bank_idx = offset % self.banks_per_group;
            let bank = &self.banks[self.rank_range(rank).start + offset];
            let required = bank.required_command(cmd.cmd_type, cmd.addr.row);
            if required == cmd.cmd_type {
                continue;
            }
            precursor_needed = true;
            match required {
                CommandType::SrefExit => {
                    if bank.ready(CommandType::SrefExit, clk) {
                        return Some(Command::new(
                            CommandType::SrefExit,
                            Address::rank_only(rank),
                            0,
                        ));
                    }
                }
                CommandType::Precharge => {
                    if bank.ready(CommandType::Precharge, clk) {
                        let addr = Address {
                            rank,
                            bankgroup,
                            bank: bank_idx,
                            ..Address::default()
                        };
                        return Some(Command::new(CommandType::Precharge, addr, 0));
                    }
                }
                other => panic!(
                    "unexpected precursor {:?} for rank-level {:?}",
                    other, cmd.cmd_type
                ),
            }
        }

        if precursor_needed {
            return None;
        }
        let all_ready = self
            .banks[self.rank_range(rank)]
            .iter()
            .all(|b| b.ready(cmd.cmd_type, clk));
        all_ready.then_some(*cmd)
    }

    /// Applies an issued command's timing to every affected bank and
    /// transitions the target FSMs. Timer updates are monotone, so replaying
    /// the same command at the same clock is harmless.
    pub fn update_timing_and_states(&mut self, cmd: &Command, clk: u64) {
        self.update_states(cmd);
        self.update_timing(cmd, clk);
    }

    fn update_states(&mut self, cmd: &Command) {
        use CommandType::*;
        match cmd.cmd_type {
            Activate => {
                let bank = self.bank_mut(cmd);
                bank.fsm = BankFsm::Open(cmd.addr.row);
                bank.row_hit_count = 0;
            }
            Read | Write => {
                let bank = self.bank_mut(cmd);
                match bank.fsm {
                    BankFsm::Open(_) => bank.row_hit_count += 1,
                    other => panic!("column command to bank in state {:?}", other),
                }
            }
            ReadPrecharge | WritePrecharge => {
                let bank = self.bank_mut(cmd);
                match bank.fsm {
                    BankFsm::Open(_) => {
                        bank.fsm = BankFsm::Closed;
                        bank.row_hit_count = 0;
                    }
                    other => panic!("auto-precharge column command to bank in state {:?}", other),
                }
            }
            Precharge => {
                let bank = self.bank_mut(cmd);
                bank.fsm = BankFsm::Closed;
                bank.row_hit_count = 0;
            }
            Refresh => {
                let range = self.rank_range(cmd.rank());
                for bank in &self.banks[range] {
                    assert_eq!(
                        bank.fsm,
                        BankFsm::Closed,
                        "refresh issued to rank {} with an open bank",
                        cmd.rank()
                    );
                }
                self.retire_refresh(cmd);
            }
            RefreshBank => {
                let rank = cmd.rank();
                let bank = self.bank_mut(cmd);
                assert_eq!(
                    bank.fsm,
                    BankFsm::Closed,
                    "bank refresh issued to rank {} with the bank open",
                    rank
                );
                self.retire_refresh(cmd);
            }
            SrefEnter => {
                let range = self.rank_range(cmd.rank());
                for bank in &mut self.banks[range] {
                    bank.fsm = BankFsm::SelfRefresh;
                }
                self.rank_is_sref[cmd.rank()] = true;
            }
            SrefExit => {
                let range = self.rank_range(cmd.rank());
                for bank in &mut self.banks[range] {
                    bank.fsm = BankFsm::Closed;
                }
                self.rank_is_sref[cmd.rank()] = false;
            }
            Mrs => {}
        }
    }

    fn update_timing(&mut self, cmd: &Command, clk: u64) {
        if cmd.is_rank_level() {
            let idx = cmd.cmd_type.index();
            let same_rank = std::mem::take(&mut self.timing.same_rank[idx]);
            let other_ranks = std::mem::take(&mut self.timing.other_ranks[idx]);
            for rank in 0..self.ranks {
                let list = if rank == cmd.rank() {
                    &same_rank
                } else {
                    &other_ranks
                };
                let range = self.rank_range(rank);
                for bank in &mut self.banks[range] {
                    bank.apply(list, clk);
                }
            }
            self.timing.same_rank[idx] = same_rank;
            self.timing.other_ranks[idx] = other_ranks;
            return;
        }

        let idx = cmd.cmd_type.index();
        let same_bank = std::mem::take(&mut self.timing.same_bank[idx]);
        let same_bg = std::mem::take(&mut self.timing.other_banks_same_bankgroup[idx]);
        let same_rank = std::mem::take(&mut self.timing.other_bankgroups_same_rank[idx]);
        let other_ranks = std::mem::take(&mut self.timing.other_ranks[idx]);

        for rank in 0..self.ranks {
            for bankgroup in 0..self.bankgroups {
                for bank in 0..self.banks_per_group {
                    let list = if rank != cmd.rank() {
                        &other_ranks
                    } else if bankgroup != cmd.bankgroup() {
                        &same_rank
                    } else if bank != cmd.bank() {
                        &same_bg
                    } else {
                        &same_bank
                    };
                    let i = self.bank_index(rank, bankgroup, bank);
                    self.banks[i].apply(list, clk);
                }
            }
        }

        self.timing.same_bank[idx] = same_bank;
        self.timing.other_banks_same_bankgroup[idx] = same_bg;
        self.timing.other_bankgroups_same_rank[idx] = same_rank;
        self.timing.other_ranks[idx] = other_ranks;
    }

    #[inline]
    fn bank_mut(&mut self, cmd: &Command) -> &mut BankState {
        let idx = self.bank_index(cmd.rank(), cmd.bankgroup(), cmd.bank());
        &mut self.banks[idx]
    }

    /// Drops the oldest refresh obligation satisfied by `cmd`.
    fn retire_refresh(&mut self, cmd: &Command) {
        let pos = self.refresh_q.iter().position(|r| {
            r.cmd_type == cmd.cmd_type
                && r.rank() == cmd.rank()
                && (r.cmd_type == CommandType::Refresh
                    || (r.bankgroup() == cmd.bankgroup() && r.bank() == cmd.bank()))
        });
        if let Some(pos) = pos {
            self.refresh_q.remove(pos);
        }
    }

    /// Registers (or clears) a rank-level refresh obligation.
    pub fn rank_need_refresh(&mut self, rank: usize, need: bool) {
        let cmd = Command::new(CommandType::Refresh, Address::rank_only(rank), 0);
        if need {
            self.refresh_q.push_back(cmd);
        } else {
            self.retire_refresh(&cmd);
        }
    }

    /// Registers (or clears) a single-bank refresh obligation.
    pub fn bank_need_refresh(&mut self, rank: usize, bankgroup: usize, bank: usize, need: bool) {
        let addr = Address {
            rank,
            bankgroup,
            bank,
            ..Address::default()
        };
        let cmd = Command::new(CommandType::RefreshBank, addr, 0);
        if need {
            self.refresh_q.push_back(cmd);
        } else {
            self.retire_refresh(&cmd);
        }
    }

    /// True while any refresh obligation is outstanding.
    #[inline]
    pub fn is_refresh_waiting(&self) -> bool {
        !self.refresh_q.is_empty()
    }

    /// The oldest outstanding refresh obligation.
    #[inline]
    pub fn pending_ref_command(&self) -> Option<&Command> {
        self.refresh_q.front()
    }

    /// The row currently open in a bank, if any.
    pub fn open_row(&self, rank: usize, bankgroup: usize, bank: usize) -> Option<u64> {
        match self.banks[self.bank_index(rank, bankgroup, bank)].fsm {
            BankFsm::Open(row) => Some(row),
            _ => None,
        }
    }

    /// Column accesses served by the row currently open in a bank.
    pub fn row_hit_count(&self, rank: usize, bankgroup: usize, bank: usize) -> u32 {
        self.banks[self.bank_index(rank, bankgroup, bank)].row_hit_count
    }

    /// Current FSM state of a bank.
    pub fn bank_fsm(&self, rank: usize, bankgroup: usize, bank: usize) -> BankFsm {
        self.banks[self.bank_index(rank, bankgroup, bank)].fsm
    }

    /// True while the rank is in self-refresh.
    #[inline]
    pub fn is_rank_self_refreshing(&self, rank: usize) -> bool {
        self.rank_is_sref[rank]
    }

    /// True when every bank of the rank is closed.
    pub fn is_all_bank_idle_in_rank(&self, rank: usize) -> bool {
        self.banks[self.rank_range(rank)]
            .iter()
            .all(|b| b.fsm == BankFsm::Closed)
    }

    /// Number of ranks in the channel.
    #[inline]
    pub fn ranks(&self) -> usize {
        self.ranks
    }
}
