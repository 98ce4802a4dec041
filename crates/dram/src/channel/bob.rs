//! On-DIMM data buffer model (LRDIMM).
//!
//! Load-reduced DIMMs interpose a data buffer between the controller and
//! the devices, re-timing data transfers. The controller drives this model
//! through four hooks: it records every issued command, hands over write
//! data, ticks the buffer once per cycle, and polls for read responses to
//! stitch back into its return queue.

use std::collections::{HashMap, VecDeque};

use crate::common::Command;
use crate::config::LrdimmConfig;

/// Bytes returned for a read the buffer has no recorded data for.
const DATA_BYTES: usize = 64;

/// Per-rank data buffer between controller and DRAM devices.
pub struct BufferOnBoard {
    /// Cycles a read spends crossing the buffer.
    read_offset: u64,
    /// Most recent write data seen per rank, keyed by opaque address.
    write_data: Vec<HashMap<u64, Vec<u8>>>,
    /// Reads in flight through the buffer: (release clock, address, data).
    in_flight: VecDeque<(u64, u64, Vec<u8>)>,
    /// Responses whose release clock has passed.
    ready: VecDeque<(u64, Vec<u8>)>,
}

impl BufferOnBoard {
    /// Builds the buffer model for `ranks` ranks.
    pub fn new(config: &LrdimmConfig, ranks: usize) -> Self {
        Self {
            read_offset: config.read_offset(),
            write_data: vec![HashMap::new(); ranks],
            in_flight: VecDeque::new(),
            ready: VecDeque::new(),
        }
    }

    /// Observes an issued DRAM command.
    ///
    /// Reads start a data transfer through the buffer; the response data is
    /// the last write this buffer carried for the address, or a zero burst.
    pub fn record_command(&mut self, cmd: &Command, clk: u64) {
        if !cmd.is_read() {
            return;
        }
        let payload = self.write_data[cmd.rank()]
            .get(&cmd.hex_addr)
            .cloned()
            .unwrap_or_else(|| vec![0u8; DATA_BYTES]);
        self.in_flight
            .push_back((clk + self.read_offset, cmd.hex_addr, payload));
    }

    /// Accepts write data travelling outward through the buffer.
    pub fn enqueue_write(&mut self, rank: usize, addr: u64, payload: &[u8]) {
        self.write_data[rank].insert(addr, payload.to_vec());
    }

    /// Advances the buffer by one cycle, releasing due responses.
    pub fn tick(&mut self, clk: u64) {
        while let Some(&(release, _, _)) = self.in_flight.front() {
            if release > clk {
                break;
            }
            let (_, addr, payload) = self.in_flight.pop_front().unwrap();
            self.ready.push_back((addr, payload));
        }
    }

    /// The next released read response, oldest first.
    pub fn take_read_response(&mut self) -> Option<(u64, Vec<u8>)> {
        self.ready.pop_front()
    }
}
