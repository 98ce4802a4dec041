//! Per-bank (or per-rank) command queues and the issue pick.
//!
//! Decoded commands wait here until the channel state lets them issue.
//! Selection is first-ready, first-come-first-served: queues are walked
//! round-robin from just past the last queue that issued, and within a queue
//! entries that hit the open row win over older entries that miss. A
//! mode-register command occupies a dedicated single-slot station drained at
//! highest priority.

use std::collections::VecDeque;

use crate::common::{Command, CommandType};
use crate::config::{Config, QueueStructure};

use super::state::ChannelState;

/// Pending-command queues for one channel.
pub struct CommandQueue {
    structure: QueueStructure,
    bankgroups: usize,
    banks_per_group: usize,
    queue_size: usize,
    row_hit_limit: u32,
    queues: Vec<VecDeque<Command>>,
    /// Single-slot station for the next mode-register command.
    mrs_station: Option<Command>,
    /// Round-robin cursor; advanced past whichever queue last issued.
    next_queue: usize,
}

impl CommandQueue {
    /// Builds the queues for `config`'s geometry.
    pub fn new(config: &Config) -> Self {
        let num_queues = match config.sched.queue_structure {
            QueueStructure::PerBank => config.dram.ranks * config.dram.banks_per_rank(),
            QueueStructure::PerRank => config.dram.ranks,
        };
        Self {
            structure: config.sched.queue_structure,
            bankgroups: config.dram.bankgroups,
            banks_per_group: config.dram.banks_per_group,
            queue_size: config.sched.cmd_queue_size,
            row_hit_limit: config.sched.row_hit_limit,
            queues: (0..num_queues).map(|_| VecDeque::new()).collect(),
            mrs_station: None,
            next_queue: 0,
        }
    }

    #[inline]
    fn queue_index(&self, rank: usize, bankgroup: usize, bank: usize) -> usize {
        match self.structure {
            QueueStructure::PerBank => {
                (rank * self.bankgroups + bankgroup) * self.banks_per_group + bank
            }
            QueueStructure::PerRank => rank,
        }
    }

    #[inline]
    fn queues_per_rank(&self) -> usize {
        match self.structure {
            QueueStructure::PerBank => self.bankgroups * self.banks_per_group,
            QueueStructure::PerRank => 1,
        }
    }

    /// True when the queue for this bank has a free slot.
    pub fn will_accept(&self, rank: usize, bankgroup: usize, bank: usize) -> bool {
        self.queues[self.queue_index(rank, bankgroup, bank)].len() < self.queue_size
    }

    /// True when the mode-register station is free.
    #[inline]
    pub fn will_accept_mrs(&self) -> bool {
        self.mrs_station.is_none()
    }

    /// Enqueues a decoded command.
    ///
    /// # Panics
    ///
    /// Panics when the target queue (or the MRS station) is full; callers
    /// must gate on `will_accept` / `will_accept_mrs`.
    pub fn add_command(&mut self, cmd: Command) {
        if cmd.cmd_type == CommandType::Mrs {
            assert!(
                self.mrs_station.is_none(),
                "MRS command added while the station is occupied"
            );
            self.mrs_station = Some(cmd);
            return;
        }
        let idx = self.queue_index(cmd.rank(), cmd.bankgroup(), cmd.bank());
        assert!(
            self.queues[idx].len() < self.queue_size,
            "command added to a full queue (rank {} bg {} bank {})",
            cmd.rank(),
            cmd.bankgroup(),
            cmd.bank()
        );
        self.queues[idx].push_back(cmd);
    }

    /// Picks the next issuable command, if any.
    ///
    /// The MRS station is tried first; otherwise queues are scanned
    /// round-robin. A data command is removed from its queue when picked;
    /// precursors (activate, precharge, self-refresh exit) leave the queue
    /// entry in place for a later tick.
    pub fn get_command_to_issue(&mut self, state: &ChannelState, clk: u64) -> Option<Command> {
        if let Some(mrs) = self.mrs_station {
            if let Some(ready) = state.get_ready_command(&mrs, clk) {
                if ready.cmd_type == CommandType::Mrs {
                    self.mrs_station = None;
                }
                return Some(ready);
            }
        }

        let num_queues = self.queues.len();
        for i in 0..num_queues {
            let qi = (self.next_queue + i) % num_queues;
            if let Some((pos, ready)) = self.first_ready_from_queue(qi, state, clk) {
                if ready.is_read_write() {
                    self.queues[qi].remove(pos);
                }
                self.next_queue = (qi + 1) % num_queues;
                return Some(ready);
            }
        }
        None
    }

    /// FR-FCFS within one queue: the oldest open-row hit issuable as-is
    /// wins; otherwise the oldest entry with any legal step.
    fn first_ready_from_queue(
        &self,
        qi: usize,
        state: &ChannelState,
        clk: u64,
    ) -> Option<(usize, Command)> {
        let queue = &self.queues[qi];

        for (pos, cmd) in queue.iter().enumerate() {
            if state.open_row(cmd.rank(), cmd.bankgroup(), cmd.bank()) == Some(cmd.addr.row) {
                if let Some(ready) = state.get_ready_command(cmd, clk) {
                    if ready.cmd_type == cmd.cmd_type {
                        return Some((pos, ready));
                    }
                }
            }
        }

        for (pos, cmd) in queue.iter().enumerate() {
            if let Some(ready) = state.get_ready_command(cmd, clk) {
                if ready.cmd_type == CommandType::Precharge
                    && cmd.cmd_type != CommandType::Precharge
                    && self.keep_row_open(qi, state, &ready)
                {
                    continue;
                }
                return Some((pos, ready));
            }
        }
        None
    }

    /// Suppress a synthesized precharge while the open row still has queued
    /// hits and has not exhausted its row-hit allowance.
    fn keep_row_open(&self, qi: usize, state: &ChannelState, pre: &Command) -> bool {
        let open = match state.open_row(pre.rank(), pre.bankgroup(), pre.bank()) {
            Some(row) => row,
            None => return false,
        };
        if state.row_hit_count(pre.rank(), pre.bankgroup(), pre.bank()) >= self.row_hit_limit {
            return false;
        }
        self.queues[qi].iter().any(|c| {
            c.rank() == pre.rank()
                && c.bankgroup() == pre.bankgroup()
                && c.bank() == pre.bank()
                && c.addr.row == open
        })
    }

    /// The next command advancing the oldest refresh obligation: a
    /// precharge while banks are open, else the refresh itself.
    pub fn finish_refresh(&self, state: &ChannelState, clk: u64) -> Option<Command> {
        let pending = *state.pending_ref_command()?;
        state.get_ready_command(&pending, clk)
    }

    /// True when every command queue is empty (the MRS station is ignored).
    pub fn queue_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    /// True when every queue belonging to `rank` is empty.
    pub fn rank_q_empty(&self, rank: usize) -> bool {
        let per_rank = self.queues_per_rank();
        self.queues[rank * per_rank..(rank + 1) * per_rank]
            .iter()
            .all(|q| q.is_empty())
    }

    /// Total commands waiting, including an occupied MRS station.
    pub fn queue_usage(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum::<usize>()
            + usize::from(self.mrs_station.is_some())
    }
}
