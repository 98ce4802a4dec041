//! The per-channel memory controller.
//!
//! One `Controller` instance drives one channel. Each externally-driven
//! `clock_tick` it:
//! 1. Advances refresh counters and the on-DIMM buffer (when modeled).
//! 2. Picks and issues at most one DRAM command (plus one dual-command
//!    companion on HBM-style parts), refresh-advancing commands first.
//! 3. Updates per-rank power accounting and considers self-refresh
//!    entry/exit when nothing issued.
//! 4. Promotes at most one buffered transaction into the command queues.
//!
//! Completions flow back through an insertion-ordered return queue the host
//! drains with `return_done_trans`. Writes are posted (acknowledged the
//! cycle after admission) and reads admitted behind a pending write to the
//! same address are served from the write's payload without touching DRAM.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufWriter, Write};

use log::debug;

use crate::common::{Address, Command, CommandType, Transaction, TransactionKind};
use crate::config::{AddressMapping, Config, RowBufPolicy};
use crate::stats::ChannelStats;
use crate::traits::CommandObserver;

use super::bob::BufferOnBoard;
use super::queue::CommandQueue;
use super::refresh::Refresh;
use super::state::ChannelState;

/// Which transaction buffer the scheduler drains this tick.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Source {
    Unified,
    Writes,
    Reads,
}

/// Memory controller for one channel.
pub struct Controller {
    channel_id: usize,
    clk: u64,
    mapping: AddressMapping,

    read_delay: u64,
    write_delay: u64,
    lrdimm_read_offset: u64,
    is_unified_queue: bool,
    is_lrdimm: bool,
    row_buf_policy: RowBufPolicy,
    trans_queue_size: usize,
    enable_self_refresh: bool,
    sref_threshold: u64,
    enable_hbm_dual_cmd: bool,

    stats: ChannelStats,
    channel_state: ChannelState,
    cmd_queue: CommandQueue,
    refresh: Refresh,
    bob: Option<BufferOnBoard>,
    observers: Vec<Box<dyn CommandObserver>>,
    cmd_trace: Option<BufWriter<File>>,

    last_trans_clk: u64,
    /// Writes left to promote in the current drain burst.
    write_draining: usize,

    unified_queue: Vec<Transaction>,
    read_queue: Vec<Transaction>,
    write_buffer: Vec<Transaction>,
    mrs_buffer: Vec<Transaction>,
    /// Reads awaiting their DRAM command; many reads may coalesce onto one.
    pending_rd_q: HashMap<u64, VecDeque<Transaction>>,
    /// At most one pending write per address; newer writes merge payloads.
    pending_wr_q: HashMap<u64, Transaction>,
    return_queue: Vec<Transaction>,
    /// Read payloads awaiting `get_response_data` (on-DIMM buffer mode).
    resp_data: VecDeque<Vec<u8>>,
}

impl Controller {
    /// Builds the controller for channel `channel_id` of `config`.
    ///
    /// # Panics
    ///
    /// Panics when command tracing is enabled and the trace file cannot be
    /// created.
    pub fn new(channel_id: usize, config: &Config) -> Self {
        let cmd_trace = config.general.cmd_trace.then(|| {
            let path = format!("{}ch_{}cmd.trace", config.general.output_prefix, channel_id);
            let file = File::create(&path)
                .unwrap_or_else(|e| panic!("cannot create command trace {}: {}", path, e));
            BufWriter::new(file)
        });

        let bob = config
            .lrdimm
            .enabled
            .then(|| BufferOnBoard::new(&config.lrdimm, config.dram.ranks));

        Self {
            channel_id,
            clk: 0,
            mapping: AddressMapping::new(&config.dram, config.general.channels),
            read_delay: config.timing.read_delay,
            write_delay: config.timing.write_delay,
            lrdimm_read_offset: if config.lrdimm.enabled {
                config.lrdimm.read_offset()
            } else {
                0
            },
            is_unified_queue: config.sched.unified_queue,
            is_lrdimm: config.lrdimm.enabled,
            row_buf_policy: config.sched.row_buf_policy,
            trans_queue_size: config.sched.trans_queue_size,
            enable_self_refresh: config.power.enable_self_refresh,
            sref_threshold: config.power.sref_threshold,
            enable_hbm_dual_cmd: config.power.enable_hbm_dual_cmd,
            stats: ChannelStats::new(channel_id, config.dram.ranks),
            channel_state: ChannelState::new(config),
            cmd_queue: CommandQueue::new(config),
            refresh: Refresh::new(config),
            bob,
            observers: Vec::new(),
            cmd_trace,
            last_trans_clk: 0,
            write_draining: 0,
            unified_queue: Vec::new(),
            read_queue: Vec::new(),
            write_buffer: Vec::new(),
            mrs_buffer: Vec::new(),
            pending_rd_q: HashMap::new(),
            pending_wr_q: HashMap::new(),
            return_queue: Vec::new(),
            resp_data: VecDeque::new(),
        }
    }

    /// Registers an external collaborator (power, thermal, trace consumer).
    pub fn add_observer(&mut self, observer: Box<dyn CommandObserver>) {
        self.observers.push(observer);
    }

    /// Advances the channel by one cycle.
    pub fn clock_tick(&mut self) {
        self.refresh.clock_tick(&mut self.channel_state);

        if let Some(bob) = &mut self.bob {
            bob.tick(self.clk);
            if let Some((addr, payload)) = bob.take_read_response() {
                let entry = self
                    .return_queue
                    .iter_mut()
                    .find(|t| t.addr == addr)
                    .unwrap_or_else(|| {
                        panic!(
                            "on-DIMM read response for {:#x} has no waiting transaction",
                            addr
                        )
                    });
                entry.update_payload(&payload);
            }
        }

        // While a refresh is owed, only a refresh-advancing command (the
        // refresh itself, or a precharge clearing the way) may issue.
        let cmd = if self.channel_state.is_refresh_waiting() {
            self.cmd_queue.finish_refresh(&self.channel_state, self.clk)
        } else {
            self.cmd_queue
                .get_command_to_issue(&self.channel_state, self.clk)
        };

        let mut cmd_issued = false;
        if let Some(cmd) = cmd {
            self.issue_command(cmd);
            cmd_issued = true;
            if let Some(bob) = &mut self.bob {
                bob.record_command(&cmd, self.clk);
            }

            if self.enable_hbm_dual_cmd && !self.channel_state.is_refresh_waiting() {
                if let Some(second) = self
                    .cmd_queue
                    .get_command_to_issue(&self.channel_state, self.clk)
                {
                    if second.is_read_write() != cmd.is_read_write() {
                        self.issue_command(second);
                        self.stats.hbm_dual_cmds += 1;
                        if let Some(bob) = &mut self.bob {
                            bob.record_command(&second, self.clk);
                        }
                    }
                }
            }
        }

        for rank in 0..self.channel_state.ranks() {
            if self.channel_state.is_rank_self_refreshing(rank) {
                self.stats.sref_cycles[rank] += 1;
            } else if self.channel_state.is_all_bank_idle_in_rank(rank) {
                self.stats.all_bank_idle_cycles[rank] += 1;
                self.channel_state.rank_idle_cycles[rank] += 1;
            } else {
                self.stats.rank_active_cycles[rank] += 1;
                self.channel_state.rank_idle_cycles[rank] = 0;
            }
        }

        if self.enable_self_refresh && !cmd_issued {
            self.consider_self_refresh();
        }

        self.schedule_transaction();
        self.clk += 1;
        self.stats.num_cycles += 1;
        for observer in &mut self.observers {
            observer.post_tick(self.clk);
        }
    }

    /// Moves at most one rank into or out of self-refresh.
    fn consider_self_refresh(&mut self) {
        for rank in 0..self.channel_state.ranks() {
            if self.channel_state.is_rank_self_refreshing(rank) {
                // Wake up as soon as work arrives for this rank.
                if !self.cmd_queue.rank_q_empty(rank) {
                    let exit =
                        Command::new(CommandType::SrefExit, Address::rank_only(rank), 0);
                    if let Some(ready) = self.channel_state.get_ready_command(&exit, self.clk) {
                        self.issue_command(ready);
                        break;
                    }
                }
            } else if self.cmd_queue.rank_q_empty(rank)
                && self.channel_state.rank_idle_cycles[rank] >= self.sref_threshold
            {
                let enter = Command::new(CommandType::SrefEnter, Address::rank_only(rank), 0);
                if let Some(ready) = self.channel_state.get_ready_command(&enter, self.clk) {
                    self.issue_command(ready);
                    break;
                }
            }
        }
    }

    /// True when the buffer targeted by this transaction has a free slot.
    pub fn will_accept_transaction(&self, _addr: u64, is_write: bool, is_mrs: bool) -> bool {
        if is_mrs {
            self.mrs_buffer.len() < self.trans_queue_size
        } else if self.is_unified_queue {
            self.unified_queue.len() < self.trans_queue_size
        } else if is_write {
            self.write_buffer.len() < self.trans_queue_size
        } else {
            self.read_queue.len() < self.trans_queue_size
        }
    }

    /// Admits a transaction.
    ///
    /// Writes and MRS operations are posted: a completion is queued for the
    /// next cycle regardless of when the DRAM command issues. A read behind
    /// a pending write to the same address is served from the write's
    /// payload and never becomes a DRAM command.
    ///
    /// # Panics
    ///
    /// Panics when the targeted buffer is full; `will_accept_transaction`
    /// must have returned true in the same cycle.
    pub fn add_transaction(&mut self, mut trans: Transaction) -> bool {
        assert!(
            self.will_accept_transaction(trans.addr, trans.is_write(), trans.is_mrs()),
            "transaction for {:#x} admitted without buffer capacity",
            trans.addr
        );

        trans.added_cycle = self.clk;
        self.stats
            .interarrival_latency
            .add(self.clk - self.last_trans_clk);
        self.last_trans_clk = self.clk;

        match trans.kind {
            TransactionKind::ModeRegisterSet => {
                // Every MRS must reach the device, even at a repeated
                // address, so there is no pending map for them.
                debug!("ch{} clk {}: admit MRS {:#x}", self.channel_id, self.clk, trans.addr);
                self.mrs_buffer.push(trans.clone());
                trans.complete_cycle = self.clk + 1;
                self.return_queue.push(trans);
                true
            }
            TransactionKind::Write => {
                debug!("ch{} clk {}: admit W {:#x}", self.channel_id, self.clk, trans.addr);
                if let Some(pending) = self.pending_wr_q.get_mut(&trans.addr) {
                    // Coalesce: the pending write will carry the newest data.
                    pending.update_payload(&trans.payload);
                } else {
                    self.pending_wr_q.insert(trans.addr, trans.clone());
                    if self.is_unified_queue {
                        self.unified_queue.push(trans.clone());
                    } else {
                        self.write_buffer.push(trans.clone());
                    }
                }
                trans.complete_cycle = self.clk + 1;
                self.return_queue.push(trans);
                true
            }
            TransactionKind::Read => {
                debug!("ch{} clk {}: admit R {:#x}", self.channel_id, self.clk, trans.addr);
                if let Some(pending) = self.pending_wr_q.get(&trans.addr) {
                    // Forward the pending write's data; no DRAM read needed.
                    trans.complete_cycle = self.clk + 1;
                    let payload = pending.payload.clone();
                    trans.update_payload(&payload);
                    self.return_queue.push(trans);
                    return true;
                }
                let waiters = self.pending_rd_q.entry(trans.addr).or_default();
                waiters.push_back(trans.clone());
                if waiters.len() == 1 {
                    if self.is_unified_queue {
                        self.unified_queue.push(trans);
                    } else {
                        self.read_queue.push(trans);
                    }
                }
                true
            }
        }
    }

    /// Promotes at most one buffered transaction into the command queues.
    fn schedule_transaction(&mut self) {
        // Arm a write drain when the buffer fills, or when it is backing up
        // while the command queues have gone idle.
        if self.write_draining == 0 && !self.is_unified_queue {
            if self.write_buffer.len() >= self.trans_queue_size
                || (self.write_buffer.len() > 8 && self.cmd_queue.queue_empty())
            {
                self.write_draining = self.write_buffer.len();
            }
        }

        // MRS operations have absolute priority and drain strictly FIFO
        // through the single-slot station.
        if !self.mrs_buffer.is_empty() {
            if self.cmd_queue.will_accept_mrs() {
                let cmd = self.trans_to_command(&self.mrs_buffer[0]);
                debug!("ch{} clk {}: promote {}", self.channel_id, self.clk, cmd);
                self.cmd_queue.add_command(cmd);
                self.mrs_buffer.remove(0);
            }
            return;
        }

        let source = if self.is_unified_queue {
            Source::Unified
        } else if self.write_draining > 0 {
            Source::Writes
        } else {
            Source::Reads
        };

        let mut idx = 0;
        loop {
            let (cmd, addr) = {
                let buffer = self.source_buffer(source);
                if idx >= buffer.len() {
                    return;
                }
                let trans = &buffer[idx];
                (self.trans_to_command(trans), trans.addr)
            };

            if self
                .cmd_queue
                .will_accept(cmd.rank(), cmd.bankgroup(), cmd.bank())
            {
                if !self.is_unified_queue && cmd.is_write() {
                    if self.pending_rd_q.contains_key(&addr) {
                        // A read for this address is already queued; the
                        // write must not overtake it. Stop the drain.
                        self.write_draining = 0;
                        return;
                    }
                    self.write_draining -= 1;
                }
                debug!("ch{} clk {}: promote {}", self.channel_id, self.clk, cmd);
                self.cmd_queue.add_command(cmd);
                self.source_buffer_mut(source).remove(idx);
                return;
            }
            idx += 1;
        }
    }

    fn source_buffer(&self, source: Source) -> &Vec<Transaction> {
        match source {
            Source::Unified => &self.unified_queue,
            Source::Writes => &self.write_buffer,
            Source::Reads => &self.read_queue,
        }
    }

    fn source_buffer_mut(&mut self, source: Source) -> &mut Vec<Transaction> {
        match source {
            Source::Unified => &mut self.unified_queue,
            Source::Writes => &mut self.write_buffer,
            Source::Reads => &mut self.read_queue,
        }
    }

    /// The DRAM command a buffered transaction becomes.
    fn trans_to_command(&self, trans: &Transaction) -> Command {
        let addr = self.mapping.decode(trans.addr);
        let cmd_type = match trans.kind {
            TransactionKind::ModeRegisterSet => CommandType::Mrs,
            TransactionKind::Write => match self.row_buf_policy {
                RowBufPolicy::OpenPage => CommandType::Write,
                RowBufPolicy::ClosePage => CommandType::WritePrecharge,
            },
            TransactionKind::Read => match self.row_buf_policy {
                RowBufPolicy::OpenPage => CommandType::Read,
                RowBufPolicy::ClosePage => CommandType::ReadPrecharge,
            },
        };
        Command::new(cmd_type, addr, trans.addr)
    }

    /// Retires an issued command: settles pending read/write bookkeeping,
    /// notifies collaborators, updates stats, then applies timing and state.
    ///
    /// # Panics
    ///
    /// Panics when a column read or write issues with no matching entry in
    /// the pending maps.
    fn issue_command(&mut self, cmd: Command) {
        debug!("ch{} clk {}: issue {}", self.channel_id, self.clk, cmd);
        if let Some(trace) = &mut self.cmd_trace {
            writeln!(trace, "{:<18} {}", self.clk, cmd).expect("command trace write");
        }
        for observer in &mut self.observers {
            observer.command_issued(&cmd, self.clk);
        }

        if cmd.is_read() {
            let waiters = self.pending_rd_q.remove(&cmd.hex_addr).unwrap_or_else(|| {
                panic!("read command for {:#x} with no pending read", cmd.hex_addr)
            });
            // Every read coalesced onto this command completes together.
            for mut trans in waiters {
                trans.complete_cycle = self.clk + self.read_delay + self.lrdimm_read_offset;
                self.return_queue.push(trans);
            }
        } else if cmd.is_write() {
            let trans = self.pending_wr_q.remove(&cmd.hex_addr).unwrap_or_else(|| {
                panic!("write command for {:#x} with no pending write", cmd.hex_addr)
            });
            if let Some(bob) = &mut self.bob {
                bob.enqueue_write(cmd.rank(), cmd.hex_addr, &trans.payload);
            }
            self.stats
                .write_latency
                .add(self.clk - trans.added_cycle + self.write_delay);
        }
        // MRS: the return slot was posted at admission; nothing pending.

        // Stats first: row-hit classification must see the state prior to
        // this access.
        self.update_command_stats(&cmd);
        self.channel_state.update_timing_and_states(&cmd, self.clk);
    }

    fn update_command_stats(&mut self, cmd: &Command) {
        match cmd.cmd_type {
            CommandType::Read | CommandType::ReadPrecharge => {
                self.stats.num_read_cmds += 1;
                if self
                    .channel_state
                    .row_hit_count(cmd.rank(), cmd.bankgroup(), cmd.bank())
                    != 0
                {
                    self.stats.num_read_row_hits += 1;
                }
            }
            CommandType::Write | CommandType::WritePrecharge => {
                self.stats.num_write_cmds += 1;
                if self
                    .channel_state
                    .row_hit_count(cmd.rank(), cmd.bankgroup(), cmd.bank())
                    != 0
                {
                    self.stats.num_write_row_hits += 1;
                }
            }
            CommandType::Activate => self.stats.num_act_cmds += 1,
            CommandType::Precharge => self.stats.num_pre_cmds += 1,
            CommandType::Refresh => self.stats.num_ref_cmds += 1,
            CommandType::RefreshBank => self.stats.num_refb_cmds += 1,
            CommandType::SrefEnter => self.stats.num_srefe_cmds += 1,
            CommandType::SrefExit => self.stats.num_srefx_cmds += 1,
            CommandType::Mrs => self.stats.num_mrs_cmds += 1,
        }
    }

    /// Releases the first return-queue entry whose completion has passed.
    ///
    /// Returns `(addr, is_write)`, or `None` when nothing is ready. One
    /// transaction is retired per call.
    pub fn return_done_trans(&mut self, clk: u64) -> Option<(u64, bool)> {
        let pos = self
            .return_queue
            .iter()
            .position(|t| clk >= t.complete_cycle)?;
        let trans = self.return_queue.remove(pos);
        match trans.kind {
            TransactionKind::ModeRegisterSet => self.stats.num_mrs_done += 1,
            TransactionKind::Write => self.stats.num_writes_done += 1,
            TransactionKind::Read => {
                self.stats.num_reads_done += 1;
                self.stats.read_latency.add(clk - trans.added_cycle);
            }
        }
        if self.is_lrdimm && trans.kind == TransactionKind::Read {
            assert!(
                !trans.payload.is_empty(),
                "read {:#x} retired without data from the on-DIMM buffer",
                trans.addr
            );
            self.resp_data.push_back(trans.payload.clone());
        }
        Some((trans.addr, trans.is_write()))
    }

    /// Hands back the payload of the most recently retired read.
    ///
    /// # Panics
    ///
    /// Only meaningful in on-DIMM buffer mode; panics when no read response
    /// is queued.
    pub fn get_response_data(&mut self) -> Vec<u8> {
        self.resp_data
            .pop_front()
            .expect("no queued read response data")
    }

    /// Commands currently waiting in the command queues.
    pub fn queue_usage(&self) -> usize {
        self.cmd_queue.queue_usage()
    }

    /// Prints counters accumulated since the previous epoch.
    pub fn print_epoch_stats(&mut self) {
        self.stats.print_epoch();
    }

    /// Prints the end-of-run report and flushes the command trace.
    pub fn print_final_stats(&mut self) {
        if let Some(trace) = &mut self.cmd_trace {
            trace.flush().expect("command trace flush");
        }
        self.stats.print_final();
    }

    /// Current clock value.
    #[inline]
    pub fn clk(&self) -> u64 {
        self.clk
    }

    /// Read-only view of the channel's counters.
    #[inline]
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    /// Read-only view of the bank/timing tracker.
    #[inline]
    pub fn channel_state(&self) -> &ChannelState {
        &self.channel_state
    }
}
