//! Multi-channel memory systems.
//!
//! This module provides the top level a host model plugs into:
//! 1. **MemorySystem:** One controller per channel; transactions fan out by
//!    the decoded channel field and completions flow back through
//!    registered read/write callbacks.
//! 2. **IdealMemorySystem:** Infinite bandwidth and a fixed latency, as a
//!    baseline for what a perfect memory standard could do.

use crate::channel::Controller;
use crate::common::Transaction;
use crate::config::{AddressMapping, Config};

/// Completion callback; receives the transaction's opaque address.
pub type Callback = Box<dyn FnMut(u64)>;

/// A multi-channel DRAM system.
pub struct MemorySystem {
    mapping: AddressMapping,
    clk: u64,
    ctrls: Vec<Controller>,
    read_callback: Option<Callback>,
    write_callback: Option<Callback>,
}

impl MemorySystem {
    /// Builds one controller per configured channel.
    pub fn new(config: &Config) -> Self {
        let ctrls = (0..config.general.channels)
            .map(|ch| Controller::new(ch, config))
            .collect();
        Self {
            mapping: AddressMapping::new(&config.dram, config.general.channels),
            clk: 0,
            ctrls,
            read_callback: None,
            write_callback: None,
        }
    }

    /// Registers completion callbacks, replacing any previous ones.
    pub fn register_callbacks(&mut self, read_callback: Callback, write_callback: Callback) {
        self.read_callback = Some(read_callback);
        self.write_callback = Some(write_callback);
    }

    /// Channel index an address decodes to.
    pub fn channel_of(&self, hex_addr: u64) -> usize {
        self.mapping.channel_of(hex_addr)
    }

    /// True when the owning channel can accept this transaction.
    pub fn will_accept_transaction(&self, hex_addr: u64, is_write: bool, is_mrs: bool) -> bool {
        self.ctrls[self.channel_of(hex_addr)].will_accept_transaction(hex_addr, is_write, is_mrs)
    }

    /// Routes a transaction to its channel.
    pub fn add_transaction(&mut self, trans: Transaction) -> bool {
        let channel = self.channel_of(trans.addr);
        self.ctrls[channel].add_transaction(trans)
    }

    /// Advances every channel by one cycle, draining one completion per
    /// channel into the callbacks.
    pub fn clock_tick(&mut self) {
        for ctrl in &mut self.ctrls {
            if let Some((addr, is_write)) = ctrl.return_done_trans(self.clk) {
                let callback = if is_write {
                    &mut self.write_callback
                } else {
                    &mut self.read_callback
                };
                if let Some(callback) = callback {
                    callback(addr);
                }
            }
            ctrl.clock_tick();
        }
        self.clk += 1;
    }

    /// Total commands waiting across all channels.
    pub fn queue_usage(&self) -> usize {
        self.ctrls.iter().map(|c| c.queue_usage()).sum()
    }

    /// Prints per-channel epoch statistics.
    pub fn print_epoch_stats(&mut self) {
        for ctrl in &mut self.ctrls {
            ctrl.print_epoch_stats();
        }
    }

    /// Prints per-channel final statistics.
    pub fn print_final_stats(&mut self) {
        for ctrl in &mut self.ctrls {
            ctrl.print_final_stats();
        }
    }

    /// Current clock value.
    #[inline]
    pub fn clk(&self) -> u64 {
        self.clk
    }

    /// Read-only view of one channel's controller.
    pub fn controller(&self, channel: usize) -> &Controller {
        &self.ctrls[channel]
    }
}

/// A memory system with infinite bandwidth and a fixed latency.
pub struct IdealMemorySystem {
    latency: u64,
    clk: u64,
    buffer: Vec<Transaction>,
    read_callback: Option<Callback>,
    write_callback: Option<Callback>,
    /// Read transactions completed.
    pub num_reads_done: u64,
    /// Write transactions completed.
    pub num_writes_done: u64,
}

impl IdealMemorySystem {
    /// Builds the system; every transaction completes `latency` cycles
    /// after admission.
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            clk: 0,
            buffer: Vec::new(),
            read_callback: None,
            write_callback: None,
            num_reads_done: 0,
            num_writes_done: 0,
        }
    }

    /// Registers completion callbacks, replacing any previous ones.
    pub fn register_callbacks(&mut self, read_callback: Callback, write_callback: Callback) {
        self.read_callback = Some(read_callback);
        self.write_callback = Some(write_callback);
    }

    /// Always true: bandwidth is not modeled.
    pub fn will_accept_transaction(&self, _hex_addr: u64, _is_write: bool, _is_mrs: bool) -> bool {
        true
    }

    /// Admits a transaction for completion `latency` cycles from now.
    pub fn add_transaction(&mut self, mut trans: Transaction) -> bool {
        trans.added_cycle = self.clk;
        trans.complete_cycle = self.clk + self.latency;
        self.buffer.push(trans);
        true
    }

    /// Advances one cycle, completing every due transaction.
    pub fn clock_tick(&mut self) {
        let clk = self.clk;
        let mut done = Vec::new();
        self.buffer.retain(|t| {
            if clk >= t.complete_cycle {
                done.push((t.addr, t.is_write()));
                false
            } else {
                true
            }
        });
        for (addr, is_write) in done {
            if is_write {
                self.num_writes_done += 1;
                if let Some(callback) = &mut self.write_callback {
                    callback(addr);
                }
            } else {
                self.num_reads_done += 1;
                if let Some(callback) = &mut self.read_callback {
                    callback(addr);
                }
            }
        }
        self.clk += 1;
    }

    /// Transactions still in flight.
    pub fn queue_usage(&self) -> usize {
        self.buffer.len()
    }
}
