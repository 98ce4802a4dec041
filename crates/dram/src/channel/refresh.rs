//! Refresh interval tracking and obligation injection.
//!
//! Counts cycles against the configured refresh interval and, each time it
//! expires, marks the next target (a rank, or a single bank when bank-level
//! refresh is configured) as refresh-waiting in the channel state. Targets
//! are walked round-robin so obligations stagger across the channel. Ranks
//! parked in self-refresh maintain themselves and are skipped.

use crate::config::{Config, RefreshPolicy};

use super::state::ChannelState;

/// Refresh interval counter for one channel.
pub struct Refresh {
    clk: u64,
    policy: RefreshPolicy,
    /// Cycles between injected obligations; 0 disables refresh entirely.
    interval: u64,
    ranks: usize,
    bankgroups: usize,
    banks_per_group: usize,
    next_rank: usize,
    next_bankgroup: usize,
    next_bank: usize,
}

impl Refresh {
    /// Builds the counter for `config`.
    pub fn new(config: &Config) -> Self {
        let policy = config.timing.refresh_policy;
        let interval = match policy {
            RefreshPolicy::RankStaggered => config.timing.t_refi,
            RefreshPolicy::BankStaggered => config.timing.t_refib,
        };
        Self {
            clk: 0,
            policy,
            interval,
            ranks: config.dram.ranks,
            bankgroups: config.dram.bankgroups,
            banks_per_group: config.dram.banks_per_group,
            next_rank: 0,
            next_bankgroup: 0,
            next_bank: 0,
        }
    }

    /// Advances the counter; injects an obligation when the interval expires.
    pub fn clock_tick(&mut self, state: &mut ChannelState) {
        self.clk += 1;
        if self.interval > 0 && self.clk % self.interval == 0 {
            self.insert_refresh(state);
        }
    }

    fn insert_refresh(&mut self, state: &mut ChannelState) {
        match self.policy {
            RefreshPolicy::RankStaggered => {
                if !state.is_rank_self_refreshing(self.next_rank) {
                    state.rank_need_refresh(self.next_rank, true);
                }
                self.next_rank = (self.next_rank + 1) % self.ranks;
            }
            RefreshPolicy::BankStaggered => {
                if !state.is_rank_self_refreshing(self.next_rank) {
                    state.bank_need_refresh(
                        self.next_rank,
                        self.next_bankgroup,
                        self.next_bank,
                        true,
                    );
                }
                self.next_bank += 1;
                if self.next_bank == self.banks_per_group {
                    self.next_bank = 0;
                    self.next_bankgroup += 1;
                    if self.next_bankgroup == self.bankgroups {
                        self.next_bankgroup = 0;
                        self.next_rank = (self.next_rank + 1) % self.ranks;
                    }
                }
            }
        }
    }
}
