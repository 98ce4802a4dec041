//! Configuration system for the DRAM simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize a channel. It provides:
//! 1. **Defaults:** Baseline DDR4-like geometry and timing constants.
//! 2. **Structures:** Hierarchical config for general, geometry, scheduling,
//!    timing, power, and on-DIMM buffer settings.
//! 3. **Enums:** Row-buffer policy, command-queue structure, refresh policy.
//! 4. **Address mapping:** The pure physical-address decode function derived
//!    from the geometry and a permutation string.
//!
//! Configuration is supplied as JSON (every field defaults individually, so
//! partial documents work) or via `Config::default()`.

use serde::Deserialize;

use crate::common::Address;

/// Default configuration constants.
///
/// These values define the baseline channel when not explicitly overridden.
mod defaults {
    /// Number of channels in the memory system.
    pub const CHANNELS: usize = 1;

    /// Ranks per channel.
    pub const RANKS: usize = 2;

    /// Bankgroups per rank.
    pub const BANKGROUPS: usize = 4;

    /// Banks per bankgroup.
    pub const BANKS_PER_GROUP: usize = 4;

    /// Rows per bank.
    pub const ROWS: u64 = 1 << 15;

    /// Columns per row.
    pub const COLUMNS: u64 = 1 << 10;

    /// Address-decode field order, most significant field first.
    ///
    /// Two-letter tokens: `ro` row, `ra` rank, `bg` bankgroup, `ba` bank,
    /// `ch` channel, `co` column.
    pub const MAPPING: &str = "rorabgbachco";

    /// Capacity of each transaction buffer.
    pub const TRANS_QUEUE_SIZE: usize = 32;

    /// Capacity of each per-bank (or per-rank) command queue.
    pub const CMD_QUEUE_SIZE: usize = 8;

    /// Consecutive same-row accesses before a pending precharge may preempt
    /// further row hits.
    pub const ROW_HIT_LIMIT: u32 = 4;

    /// Cycles from a column read command to host-visible data.
    pub const READ_DELAY: u64 = 40;

    /// Cycles from a column write command to the write latency accounting
    /// point.
    pub const WRITE_DELAY: u64 = 20;

    /// Idle cycles before an empty rank is put into self-refresh.
    pub const SREF_THRESHOLD: u64 = 1000;

    /// Cycles between epoch statistics dumps (0 disables).
    pub const EPOCH_PERIOD: u64 = 100_000;
}

/// Row-buffer management policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowBufPolicy {
    /// Rows stay open after an access; later hits skip the activate.
    #[default]
    #[serde(alias = "OpenPage")]
    OpenPage,
    /// Every column access auto-precharges its row.
    #[serde(alias = "ClosePage")]
    ClosePage,
}

/// Granularity of the command queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStructure {
    /// One command queue per bank.
    #[default]
    #[serde(alias = "PerBank")]
    PerBank,
    /// One command queue per rank.
    #[serde(alias = "PerRank")]
    PerRank,
}

/// Granularity of injected refresh obligations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshPolicy {
    /// Rank-level REFRESH, ranks walked round-robin.
    #[default]
    #[serde(alias = "RankStaggered")]
    RankStaggered,
    /// Per-bank REFRESH_BANK, banks walked round-robin.
    #[serde(alias = "BankStaggered")]
    BankStaggered,
}

/// Root configuration structure.
///
/// # Examples
///
/// Partial JSON overrides compose with the defaults:
///
/// ```
/// use dram_core::config::{Config, RowBufPolicy};
///
/// let json = r#"{
///     "sched": { "unified_queue": true, "row_buf_policy": "CLOSE_PAGE" },
///     "timing": { "read_delay": 20, "write_delay": 10 }
/// }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert!(config.sched.unified_queue);
/// assert_eq!(config.sched.row_buf_policy, RowBufPolicy::ClosePage);
/// assert_eq!(config.timing.read_delay, 20);
/// assert_eq!(config.dram.ranks, 2);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General simulation settings.
    pub general: GeneralConfig,
    /// Channel geometry and address mapping.
    pub dram: DramConfig,
    /// Transaction and command queue settings.
    pub sched: SchedConfig,
    /// Timing constants and refresh policy.
    pub timing: TimingConfig,
    /// Self-refresh and HBM dual-command settings.
    pub power: PowerConfig,
    /// On-DIMM buffer (LRDIMM) settings.
    pub lrdimm: LrdimmConfig,
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Number of channels in the memory system.
    pub channels: usize,

    /// Prefix for output files (command traces).
    pub output_prefix: String,

    /// Emit one trace line per issued command to
    /// `{output_prefix}ch_{channel}cmd.trace`.
    pub cmd_trace: bool,

    /// Cycles between epoch statistics dumps; 0 disables epoch output.
    pub epoch_period: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            channels: defaults::CHANNELS,
            output_prefix: String::new(),
            cmd_trace: false,
            epoch_period: defaults::EPOCH_PERIOD,
        }
    }
}

/// Channel geometry and address-mapping settings.
///
/// All counts must be powers of two; `AddressMapping::new` validates this.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DramConfig {
    /// Ranks per channel.
    pub ranks: usize,
    /// Bankgroups per rank.
    pub bankgroups: usize,
    /// Banks per bankgroup.
    pub banks_per_group: usize,
    /// Rows per bank.
    pub rows: u64,
    /// Columns per row.
    pub columns: u64,
    /// Address-decode field order, MSB field first (tokens `ro ra bg ba ch co`).
    pub mapping: String,
}

impl DramConfig {
    /// Total banks in one rank.
    #[inline]
    pub fn banks_per_rank(&self) -> usize {
        self.bankgroups * self.banks_per_group
    }
}

impl Default for DramConfig {
    fn default() -> Self {
        Self {
            ranks: defaults::RANKS,
            bankgroups: defaults::BANKGROUPS,
            banks_per_group: defaults::BANKS_PER_GROUP,
            rows: defaults::ROWS,
            columns: defaults::COLUMNS,
            mapping: defaults::MAPPING.to_string(),
        }
    }
}

/// Transaction and command queue settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedConfig {
    /// Capacity of each transaction buffer.
    pub trans_queue_size: usize,
    /// Capacity of each command queue.
    pub cmd_queue_size: usize,
    /// Single transaction queue instead of split read queue / write buffer.
    pub unified_queue: bool,
    /// Row-buffer management policy.
    pub row_buf_policy: RowBufPolicy,
    /// Command queue granularity.
    pub queue_structure: QueueStructure,
    /// Row hits allowed before a pending precharge preempts the open row.
    pub row_hit_limit: u32,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            trans_queue_size: defaults::TRANS_QUEUE_SIZE,
            cmd_queue_size: defaults::CMD_QUEUE_SIZE,
            unified_queue: false,
            row_buf_policy: RowBufPolicy::OpenPage,
            queue_structure: QueueStructure::PerBank,
            row_hit_limit: defaults::ROW_HIT_LIMIT,
        }
    }
}

/// Timing constants (all in channel clock cycles) and refresh policy.
///
/// The constraint lists derived from these values live in
/// [`crate::channel::timing::Timing`]. A zeroed table makes every command
/// legal immediately, which is useful for functional-only runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Cycles from a column read to host-visible data.
    pub read_delay: u64,
    /// Cycles from a column write to the latency accounting point.
    pub write_delay: u64,

    /// Column-to-column, different bankgroup.
    pub t_ccd_s: u64,
    /// Column-to-column, same bankgroup.
    pub t_ccd_l: u64,
    /// Rank-to-rank bus turnaround.
    pub t_rtrs: u64,
    /// Read CAS latency.
    pub t_cl: u64,
    /// Write CAS latency.
    pub t_cwl: u64,
    /// Data burst length on the bus, in cycles.
    pub burst_cycles: u64,
    /// Activate to column command.
    pub t_rcd: u64,
    /// Precharge to activate.
    pub t_rp: u64,
    /// Activate to precharge (row open minimum).
    pub t_ras: u64,
    /// Write recovery before precharge.
    pub t_wr: u64,
    /// Write-to-read turnaround, different bankgroup.
    pub t_wtr_s: u64,
    /// Write-to-read turnaround, same bankgroup.
    pub t_wtr_l: u64,
    /// Read to precharge.
    pub t_rtp: u64,
    /// Activate-to-activate, different bankgroup.
    pub t_rrd_s: u64,
    /// Activate-to-activate, same bankgroup.
    pub t_rrd_l: u64,
    /// Rank refresh cycle time.
    pub t_rfc: u64,
    /// Per-bank refresh cycle time.
    pub t_rfcb: u64,
    /// Rank refresh interval (0 disables refresh).
    pub t_refi: u64,
    /// Per-bank refresh interval (0 disables refresh).
    pub t_refib: u64,
    /// Self-refresh exit to first valid command.
    pub t_xs: u64,
    /// Minimum self-refresh residency.
    pub t_ckesr: u64,
    /// Mode-register-set to mode-register-set.
    pub t_mrd: u64,
    /// Mode-register-set to any other command.
    pub t_mod: u64,

    /// Granularity of injected refresh obligations.
    pub refresh_policy: RefreshPolicy,
}

impl TimingConfig {
    /// A table with every constraint zeroed: commands become legal
    /// immediately and refresh never fires. Data delays keep their
    /// defaults so completion accounting still works.
    pub fn zeroed() -> Self {
        Self {
            read_delay: defaults::READ_DELAY,
            write_delay: defaults::WRITE_DELAY,
            t_ccd_s: 0,
            t_ccd_l: 0,
            t_rtrs: 0,
            t_cl: 0,
            t_cwl: 0,
            burst_cycles: 0,
            t_rcd: 0,
            t_rp: 0,
            t_ras: 0,
            t_wr: 0,
            t_wtr_s: 0,
            t_wtr_l: 0,
            t_rtp: 0,
            t_rrd_s: 0,
            t_rrd_l: 0,
            t_rfc: 0,
            t_rfcb: 0,
            t_refi: 0,
            t_refib: 0,
            t_xs: 0,
            t_ckesr: 0,
            t_mrd: 0,
            t_mod: 0,
            refresh_policy: RefreshPolicy::RankStaggered,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            read_delay: defaults::READ_DELAY,
            write_delay: defaults::WRITE_DELAY,
            t_ccd_s: 4,
            t_ccd_l: 6,
            t_rtrs: 2,
            t_cl: 22,
            t_cwl: 16,
            burst_cycles: 4,
            t_rcd: 22,
            t_rp: 22,
            t_ras: 52,
            t_wr: 24,
            t_wtr_s: 4,
            t_wtr_l: 12,
            t_rtp: 12,
            t_rrd_s: 4,
            t_rrd_l: 8,
            t_rfc: 560,
            t_rfcb: 160,
            t_refi: 12_480,
            t_refib: 1_560,
            t_xs: 576,
            t_ckesr: 8,
            t_mrd: 8,
            t_mod: 24,
            refresh_policy: RefreshPolicy::RankStaggered,
        }
    }
}

/// Self-refresh and HBM dual-command settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Move idle ranks into self-refresh.
    pub enable_self_refresh: bool,
    /// Idle cycles before an empty rank enters self-refresh.
    pub sref_threshold: u64,
    /// Permit a second command of opposite read/write polarity per tick.
    pub enable_hbm_dual_cmd: bool,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            enable_self_refresh: false,
            sref_threshold: defaults::SREF_THRESHOLD,
            enable_hbm_dual_cmd: false,
        }
    }
}

/// On-DIMM buffer (LRDIMM) settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LrdimmConfig {
    /// Model the on-DIMM data buffer; read completions are re-timed and
    /// payloads are handed back through `get_response_data`.
    pub enabled: bool,
    /// Propagation delay through the data buffer, read direction.
    pub t_pdm_rd: u64,
    /// Read preamble added by the buffer.
    pub t_rpre: u64,
}

impl LrdimmConfig {
    /// Extra cycles a read spends crossing the on-DIMM buffer.
    #[inline]
    pub fn read_offset(&self) -> u64 {
        self.t_pdm_rd + self.t_rpre
    }
}

/// One field of the address decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MappingField {
    Channel,
    Rank,
    Bankgroup,
    Bank,
    Row,
    Column,
}

/// The pure physical-address decode function.
///
/// Built once from the geometry and the `mapping` permutation string;
/// deterministic and independent of all controller state. Field widths are
/// `log2` of the corresponding geometry counts.
#[derive(Clone, Debug)]
pub struct AddressMapping {
    /// (field, width in bits), least significant field first.
    fields: Vec<(MappingField, u32)>,
}

impl AddressMapping {
    /// Builds the decode function.
    ///
    /// # Panics
    ///
    /// Panics when a geometry count is not a power of two, or when the
    /// mapping string is not a permutation of the six field tokens.
    pub fn new(dram: &DramConfig, channels: usize) -> Self {
        let width = |n: u64, what: &str| -> u32 {
            assert!(
                n.is_power_of_two(),
                "dram geometry: {} = {} is not a power of two",
                what,
                n
            );
            n.trailing_zeros()
        };

        let width_of = |field: MappingField| match field {
            MappingField::Channel => width(channels as u64, "channels"),
            MappingField::Rank => width(dram.ranks as u64, "ranks"),
            MappingField::Bankgroup => width(dram.bankgroups as u64, "bankgroups"),
            MappingField::Bank => width(dram.banks_per_group as u64, "banks_per_group"),
            MappingField::Row => width(dram.rows, "rows"),
            MappingField::Column => width(dram.columns, "columns"),
        };

        let tokens: Vec<&str> = dram
            .mapping
            .as_bytes()
            .chunks(2)
            .map(|c| std::str::from_utf8(c).unwrap_or(""))
            .collect();
        assert_eq!(
            tokens.len(),
            6,
            "address mapping {:?} must contain exactly six two-letter tokens",
            dram.mapping
        );

        let mut fields = Vec::with_capacity(6);
        // The mapping string lists fields MSB first; decode walks from the LSB.
        for token in tokens.iter().rev() {
            let field = match *token {
                "ch" => MappingField::Channel,
                "ra" => MappingField::Rank,
                "bg" => MappingField::Bankgroup,
                "ba" => MappingField::Bank,
                "ro" => MappingField::Row,
                "co" => MappingField::Column,
                other => panic!("address mapping: unknown field token {:?}", other),
            };
            assert!(
                !fields.iter().any(|(f, _)| *f == field),
                "address mapping: duplicate field token {:?}",
                token
            );
            fields.push((field, width_of(field)));
        }

        Self { fields }
    }

    /// Decodes an opaque address into a DRAM location.
    pub fn decode(&self, hex_addr: u64) -> Address {
        let mut addr = Address::default();
        let mut remaining = hex_addr;
        for &(field, width) in &self.fields {
            let value = remaining & ((1u64 << width) - 1);
            remaining >>= width;
            match field {
                MappingField::Channel => addr.channel = value as usize,
                MappingField::Rank => addr.rank = value as usize,
                MappingField::Bankgroup => addr.bankgroup = value as usize,
                MappingField::Bank => addr.bank = value as usize,
                MappingField::Row => addr.row = value,
                MappingField::Column => addr.column = value,
            }
        }
        addr
    }

    /// Channel index for an opaque address.
    pub fn channel_of(&self, hex_addr: u64) -> usize {
        self.decode(hex_addr).channel
    }
}
