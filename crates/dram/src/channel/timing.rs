//! Precomputed command-to-command timing constraints.
//!
//! For every command type that can issue, this table lists which later
//! commands it delays and by how much, split by blast radius: the same bank,
//! sibling banks in the bankgroup, the other bankgroups of the rank, other
//! ranks, and (for rank-level commands) every bank of the rank. Bank state
//! applies these lists to its earliest-legal-clock table on each issue.

use std::cmp::max;

use crate::common::{CommandType, NUM_COMMAND_TYPES};
use crate::config::TimingConfig;

/// A delay a just-issued command imposes on a future command type.
pub type Constraint = (CommandType, u64);

/// Constraint lists indexed by the issued command's type.
pub struct Timing {
    /// Applied to the issuing bank.
    pub same_bank: Vec<Vec<Constraint>>,
    /// Applied to the other banks of the issuing bankgroup.
    pub other_banks_same_bankgroup: Vec<Vec<Constraint>>,
    /// Applied to the banks of the rank's other bankgroups.
    pub other_bankgroups_same_rank: Vec<Vec<Constraint>>,
    /// Applied to every bank of the other ranks.
    pub other_ranks: Vec<Vec<Constraint>>,
    /// Applied to every bank of the rank, for rank-level commands.
    pub same_rank: Vec<Vec<Constraint>>,
}

impl Timing {
    /// Derives the constraint lists from the raw timing constants.
    ///
    /// With a zeroed `TimingConfig` every list entry is 0 and every command
    /// is legal the cycle it is attempted.
    pub fn new(t: &TimingConfig) -> Self {
        use CommandType::*;

        let burst = t.burst_cycles;

        let read_to_read_l = max(burst, t.t_ccd_l);
        let read_to_read_s = max(burst, t.t_ccd_s);
        let read_to_read_o = burst + t.t_rtrs;
        let read_to_write = (t.t_cl + burst + t.t_rtrs).saturating_sub(t.t_cwl);
        let readp_to_act = t.t_rtp + t.t_rp;

        let write_to_read_l = t.t_cwl + burst + t.t_wtr_l;
        let write_to_read_s = t.t_cwl + burst + t.t_wtr_s;
        let write_to_read_o = (t.t_cwl + burst + t.t_rtrs).saturating_sub(t.t_cl);
        let write_to_write_l = max(burst, t.t_ccd_l);
        let write_to_write_s = max(burst, t.t_ccd_s);
        let write_to_write_o = burst + t.t_rtrs;
        let write_to_precharge = t.t_cwl + burst + t.t_wr;
        let writep_to_act = t.t_cwl + burst + t.t_wr + t.t_rp;

        let act_to_rw = t.t_rcd;
        let act_to_act_same = t.t_ras + t.t_rp;

        let mut timing = Self {
            same_bank: vec![Vec::new(); NUM_COMMAND_TYPES],
            other_banks_same_bankgroup: vec![Vec::new(); NUM_COMMAND_TYPES],
            other_bankgroups_same_rank: vec![Vec::new(); NUM_COMMAND_TYPES],
            other_ranks: vec![Vec::new(); NUM_COMMAND_TYPES],
            same_rank: vec![Vec::new(); NUM_COMMAND_TYPES],
        };

        // Column reads.
        timing.same_bank[Read.index()] = vec![
            (Read, read_to_read_l),
            (ReadPrecharge, read_to_read_l),
            (Write, read_to_write),
            (WritePrecharge, read_to_write),
            (Precharge, t.t_rtp),
        ];
        timing.other_banks_same_bankgroup[Read.index()] = vec![
            (Read, read_to_read_l),
            (ReadPrecharge, read_to_read_l),
            (Write, read_to_write),
            (WritePrecharge, read_to_write),
        ];
        timing.other_bankgroups_same_rank[Read.index()] = vec![
            (Read, read_to_read_s),
            (ReadPrecharge, read_to_read_s),
            (Write, read_to_write),
            (WritePrecharge, read_to_write),
        ];
        timing.other_ranks[Read.index()] = vec![
            (Read, read_to_read_o),
            (ReadPrecharge, read_to_read_o),
            (Write, read_to_write),
            (WritePrecharge, read_to_write),
        ];

        // Reads with auto-precharge: the bank closes by itself, so the
        // same-bank constraints gate the re-open instead.
        timing.same_bank[ReadPrecharge.index()] = vec![
            (Activate, readp_to_act),
            (Refresh, readp_to_act),
            (RefreshBank, readp_to_act),
            (SrefEnter, readp_to_act),
        ];
        timing.other_banks_same_bankgroup[ReadPrecharge.index()] =
            timing.other_banks_same_bankgroup[Read.index()].clone();
        timing.other_bankgroups_same_rank[ReadPrecharge.index()] =
            timing.other_bankgroups_same_rank[Read.index()].clone();
        timing.other_ranks[ReadPrecharge.index()] = timing.other_ranks[Read.index()].clone();

        // Column writes.
        timing.same_bank[Write.index()] = vec![
            (Read, write_to_read_l),
            (ReadPrecharge, write_to_read_l),
            (Write, write_to_write_l),
            (WritePrecharge, write_to_write_l),
            (Precharge, write_to_precharge),
        ];
        timing.other_banks_same_bankgroup[Write.index()] = vec![
            (Read, write_to_read_l),
            (ReadPrecharge, write_to_read_l),
            (Write, write_to_write_l),
            (WritePrecharge, write_to_write_l),
        ];
        timing.other_bankgroups_same_rank[Write.index()] = vec![
            (Read, write_to_read_s),
            (ReadPrecharge, write_to_read_s),
            (Write, write_to_write_s),
            (WritePrecharge, write_to_write_s),
        ];
        timing.other_ranks[Write.index()] = vec![
            (Read, write_to_read_o),
            (ReadPrecharge, write_to_read_o),
            (Write, write_to_write_o),
            (WritePrecharge, write_to_write_o),
        ];

        timing.same_bank[WritePrecharge.index()] = vec![
            (Activate, writep_to_act),
            (Refresh, writep_to_act),
            (RefreshBank, writep_to_act),
            (SrefEnter, writep_to_act),
        ];
        timing.other_banks_same_bankgroup[WritePrecharge.index()] =
            timing.other_banks_same_bankgroup[Write.index()].clone();
        timing.other_bankgroups_same_rank[WritePrecharge.index()] =
            timing.other_bankgroups_same_rank[Write.index()].clone();
        timing.other_ranks[WritePrecharge.index()] = timing.other_ranks[Write.index()].clone();

        // Row open/close.
        timing.same_bank[Activate.index()] = vec![
            (Read, act_to_rw),
            (ReadPrecharge, act_to_rw),
            (Write, act_to_rw),
            (WritePrecharge, act_to_rw),
            (Precharge, t.t_ras),
            (Activate, act_to_act_same),
        ];
        timing.other_banks_same_bankgroup[Activate.index()] = vec![(Activate, t.t_rrd_l)];
        timing.other_bankgroups_same_rank[Activate.index()] = vec![(Activate, t.t_rrd_s)];

        timing.same_bank[Precharge.index()] = vec![
            (Activate, t.t_rp),
            (Refresh, t.t_rp),
            (RefreshBank, t.t_rp),
            (SrefEnter, t.t_rp),
        ];

        // Refresh.
        timing.same_rank[Refresh.index()] = vec![
            (Activate, t.t_rfc),
            (Refresh, t.t_rfc),
            (RefreshBank, t.t_rfc),
            (SrefEnter, t.t_rfc),
            (Mrs, t.t_rfc),
        ];
        timing.same_bank[RefreshBank.index()] = vec![
            (Activate, t.t_rfcb),
            (Refresh, t.t_rfcb),
            (RefreshBank, t.t_rfcb),
            (SrefEnter, t.t_rfcb),
        ];
        timing.other_banks_same_bankgroup[RefreshBank.index()] =
            vec![(Activate, t.t_rrd_l), (RefreshBank, t.t_rrd_l)];
        timing.other_bankgroups_same_rank[RefreshBank.index()] =
            vec![(Activate, t.t_rrd_s), (RefreshBank, t.t_rrd_s)];

        // Self-refresh and mode registers.
        timing.same_rank[SrefEnter.index()] = vec![(SrefExit, t.t_ckesr)];
        timing.same_rank[SrefExit.index()] = vec![
            (Activate, t.t_xs),
            (Refresh, t.t_xs),
            (RefreshBank, t.t_xs),
            (SrefEnter, t.t_xs),
            (Mrs, t.t_xs),
        ];
        timing.same_rank[Mrs.index()] = vec![
            (Mrs, t.t_mrd),
            (Activate, t.t_mod),
            (Refresh, t.t_mod),
            (RefreshBank, t.t_mod),
            (SrefEnter, t.t_mod),
        ];

        timing
    }
}
