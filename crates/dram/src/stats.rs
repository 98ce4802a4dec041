//! Per-channel statistics collection and reporting.
//!
//! This module tracks what one channel controller did. It provides:
//! 1. **Completion counts:** Reads, writes, and MRS operations retired.
//! 2. **Command counts:** Every DRAM command type issued, with row-hit
//!    classification for column commands.
//! 3. **Latencies:** Read, write, and host interarrival accumulators.
//! 4. **Power accounting:** Per-rank self-refresh, all-idle, and active
//!    cycle counters.
//! 5. **Epoch output:** Deltas since the previous epoch dump, plus a final
//!    report.

/// Sum/count accumulator printed as an average.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatencyStat {
    /// Accumulated cycles.
    pub sum: u64,
    /// Number of samples.
    pub count: u64,
}

impl LatencyStat {
    /// Records one sample.
    #[inline]
    pub fn add(&mut self, value: u64) {
        self.sum += value;
        self.count += 1;
    }

    /// Average over all samples, 0.0 when empty.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Counters for one channel.
#[derive(Clone)]
pub struct ChannelStats {
    channel_id: usize,

    /// Epoch dumps emitted so far.
    pub epoch_num: u64,
    /// Simulated cycles elapsed.
    pub num_cycles: u64,

    /// Read transactions retired to the host.
    pub num_reads_done: u64,
    /// Write transactions retired to the host.
    pub num_writes_done: u64,
    /// Mode-register-set transactions retired to the host.
    pub num_mrs_done: u64,

    /// Column read commands issued.
    pub num_read_cmds: u64,
    /// Column write commands issued.
    pub num_write_cmds: u64,
    /// Activate commands issued.
    pub num_act_cmds: u64,
    /// Precharge commands issued.
    pub num_pre_cmds: u64,
    /// Rank refresh commands issued.
    pub num_ref_cmds: u64,
    /// Bank refresh commands issued.
    pub num_refb_cmds: u64,
    /// Self-refresh entries issued.
    pub num_srefe_cmds: u64,
    /// Self-refresh exits issued.
    pub num_srefx_cmds: u64,
    /// Mode-register-set commands issued.
    pub num_mrs_cmds: u64,

    /// Reads that hit an already-open row.
    pub num_read_row_hits: u64,
    /// Writes that hit an already-open row.
    pub num_write_row_hits: u64,
    /// Second commands issued in dual-command ticks.
    pub hbm_dual_cmds: u64,

    /// Cycles each rank spent in self-refresh.
    pub sref_cycles: Vec<u64>,
    /// Cycles each rank had every bank idle.
    pub all_bank_idle_cycles: Vec<u64>,
    /// Cycles each rank had at least one bank active.
    pub rank_active_cycles: Vec<u64>,

    /// Admission-to-retirement read latency.
    pub read_latency: LatencyStat,
    /// Admission-to-data write latency.
    pub write_latency: LatencyStat,
    /// Cycles between consecutive host admissions.
    pub interarrival_latency: LatencyStat,

    /// Counter values at the previous epoch dump.
    snapshot: Option<Box<ChannelStats>>,
}

impl ChannelStats {
    /// Fresh counters for one channel with `ranks` ranks.
    pub fn new(channel_id: usize, ranks: usize) -> Self {
        Self {
            channel_id,
            epoch_num: 0,
            num_cycles: 0,
            num_reads_done: 0,
            num_writes_done: 0,
            num_mrs_done: 0,
            num_read_cmds: 0,
            num_write_cmds: 0,
            num_act_cmds: 0,
            num_pre_cmds: 0,
            num_ref_cmds: 0,
            num_refb_cmds: 0,
            num_srefe_cmds: 0,
            num_srefx_cmds: 0,
            num_mrs_cmds: 0,
            num_read_row_hits: 0,
            num_write_row_hits: 0,
            hbm_dual_cmds: 0,
            sref_cycles: vec![0; ranks],
            all_bank_idle_cycles: vec![0; ranks],
            rank_active_cycles: vec![0; ranks],
            read_latency: LatencyStat::default(),
            write_latency: LatencyStat::default(),
            interarrival_latency: LatencyStat::default(),
            snapshot: None,
        }
    }

    /// Prints counters accumulated since the previous epoch dump.
    pub fn print_epoch(&mut self) {
        self.epoch_num += 1;
        let base = self.snapshot.as_deref();
        let delta = |cur: u64, pick: fn(&ChannelStats) -> u64| {
            cur - base.map_or(0, pick)
        };

        println!(
            "---------- epoch {} (channel {}) ----------",
            self.epoch_num, self.channel_id
        );
        println!(
            "{:<24} {}",
            "cycles",
            delta(self.num_cycles, |s| s.num_cycles)
        );
        println!(
            "{:<24} {}",
            "reads_done",
            delta(self.num_reads_done, |s| s.num_reads_done)
        );
        println!(
            "{:<24} {}",
            "writes_done",
            delta(self.num_writes_done, |s| s.num_writes_done)
        );
        println!(
            "{:<24} {}",
            "read_cmds",
            delta(self.num_read_cmds, |s| s.num_read_cmds)
        );
        println!(
            "{:<24} {}",
            "write_cmds",
            delta(self.num_write_cmds, |s| s.num_write_cmds)
        );
        println!(
            "{:<24} {}",
            "act_cmds",
            delta(self.num_act_cmds, |s| s.num_act_cmds)
        );
        println!(
            "{:<24} {}",
            "ref_cmds",
            delta(self.num_ref_cmds, |s| s.num_ref_cmds)
        );

        let mut snap = self.clone();
        snap.snapshot = None;
        self.snapshot = Some(Box::new(snap));
    }

    /// Prints the full end-of-run report.
    pub fn print_final(&self) {
        println!("==========================================================");
        println!("DRAM CHANNEL {} STATISTICS", self.channel_id);
        println!("==========================================================");
        println!("{:<24} {}", "num_cycles", self.num_cycles);
        println!("{:<24} {}", "num_reads_done", self.num_reads_done);
        println!("{:<24} {}", "num_writes_done", self.num_writes_done);
        println!("{:<24} {}", "num_mrs_done", self.num_mrs_done);
        println!("{:<24} {:.2}", "avg_read_latency", self.read_latency.avg());
        println!(
            "{:<24} {:.2}",
            "avg_write_latency",
            self.write_latency.avg()
        );
        println!(
            "{:<24} {:.2}",
            "avg_interarrival",
            self.interarrival_latency.avg()
        );
        println!("----------------------------------------------------------");
        println!("COMMANDS");
        println!("{:<24} {}", "num_act_cmds", self.num_act_cmds);
        println!("{:<24} {}", "num_pre_cmds", self.num_pre_cmds);
        println!("{:<24} {}", "num_read_cmds", self.num_read_cmds);
        println!("{:<24} {}", "num_write_cmds", self.num_write_cmds);
        println!("{:<24} {}", "num_read_row_hits", self.num_read_row_hits);
        println!("{:<24} {}", "num_write_row_hits", self.num_write_row_hits);
        println!("{:<24} {}", "num_ref_cmds", self.num_ref_cmds);
        println!("{:<24} {}", "num_refb_cmds", self.num_refb_cmds);
        println!("{:<24} {}", "num_srefe_cmds", self.num_srefe_cmds);
        println!("{:<24} {}", "num_srefx_cmds", self.num_srefx_cmds);
        println!("{:<24} {}", "num_mrs_cmds", self.num_mrs_cmds);
        println!("{:<24} {}", "hbm_dual_cmds", self.hbm_dual_cmds);
        println!("----------------------------------------------------------");
        println!("RANK CYCLES");
        for rank in 0..self.sref_cycles.len() {
            println!(
                "  rank {:<2} sref: {:<10} idle: {:<10} active: {}",
                rank,
                self.sref_cycles[rank],
                self.all_bank_idle_cycles[rank],
                self.rank_active_cycles[rank]
            );
        }
        println!("==========================================================");
    }
}
