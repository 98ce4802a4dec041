//! Channel state tests: precursor synthesis, timing gates, refresh
//! obligations, and the bank FSM.

use dram_core::channel::{BankFsm, ChannelState};
use dram_core::common::{Address, Command, CommandType};
use dram_core::Controller;

use crate::common::functional_config;

fn state() -> ChannelState {
    ChannelState::new(&functional_config())
}

fn bank0(row: u64) -> Address {
    Address {
        row,
        ..Address::default()
    }
}

fn cmd(cmd_type: CommandType, row: u64) -> Command {
    Command::new(cmd_type, bank0(row), 0x1000)
}

// ══════════════════════════════════════════════════════════
// 1. Precursor synthesis
// ══════════════════════════════════════════════════════════

#[test]
fn closed_bank_requires_activate() {
    let state = state();
    let ready = state.get_ready_command(&cmd(CommandType::Read, 5), 0).unwrap();
    assert_eq!(ready.cmd_type, CommandType::Activate);
    assert_eq!(ready.addr.row, 5);
}

#[test]
fn open_row_serves_the_read_directly() {
    let mut state = state();
    state.update_timing_and_states(&cmd(CommandType::Activate, 5), 0);
    let ready = state.get_ready_command(&cmd(CommandType::Read, 5), 1).unwrap();
    assert_eq!(ready.cmd_type, CommandType::Read);
}

#[test]
fn row_conflict_requires_precharge() {
    let mut state = state();
    state.update_timing_and_states(&cmd(CommandType::Activate, 5), 0);
    let ready = state.get_ready_command(&cmd(CommandType::Read, 6), 1).unwrap();
    assert_eq!(ready.cmd_type, CommandType::Precharge);

    state.update_timing_and_states(&ready, 1);
    let ready = state.get_ready_command(&cmd(CommandType::Read, 6), 2).unwrap();
    assert_eq!(ready.cmd_type, CommandType::Activate);
}

// ══════════════════════════════════════════════════════════
// 2. Timing gates
// ══════════════════════════════════════════════════════════

#[test]
fn trcd_gates_the_column_command() {
    let mut config = functional_config();
    config.timing.t_rcd = 5;
    let mut state = ChannelState::new(&config);

    state.update_timing_and_states(&cmd(CommandType::Activate, 5), 0);
    assert!(state.get_ready_command(&cmd(CommandType::Read, 5), 4).is_none());
    let ready = state.get_ready_command(&cmd(CommandType::Read, 5), 5).unwrap();
    assert_eq!(ready.cmd_type, CommandType::Read);
}

#[test]
fn refresh_blocks_the_rank_for_trfc() {
    let mut config = functional_config();
    config.timing.t_rfc = 10;
    let mut state = ChannelState::new(&config);

    let refresh = Command::new(CommandType::Refresh, Address::rank_only(0), 0);
    state.update_timing_and_states(&refresh, 0);

    // Rank 0 cannot activate until tRFC has elapsed.
    assert!(state.get_ready_command(&cmd(CommandType::Read, 1), 5).is_none());
    assert!(state.get_ready_command(&cmd(CommandType::Read, 1), 10).is_some());

    // Rank 1 is unaffected.
    let other = Command::new(
        CommandType::Read,
        Address {
            rank: 1,
            row: 1,
            ..Address::default()
        },
        0x2000,
    );
    assert!(state.get_ready_command(&other, 5).is_some());
}

// ══════════════════════════════════════════════════════════
// 3. Refresh obligations
// ══════════════════════════════════════════════════════════

#[test]
fn refresh_obligation_clears_when_issued() {
    let mut state = state();
    state.rank_need_refresh(0, true);
    assert!(state.is_refresh_waiting());

    let pending = *state.pending_ref_command().unwrap();
    let ready = state.get_ready_command(&pending, 0).unwrap();
    assert_eq!(ready.cmd_type, CommandType::Refresh);

    state.update_timing_and_states(&ready, 0);
    assert!(!state.is_refresh_waiting());
}

#[test]
fn open_bank_precharges_before_refresh() {
    let mut state = state();
    state.update_timing_and_states(&cmd(CommandType::Activate, 3), 0);
    state.rank_need_refresh(0, true);

    let pending = *state.pending_ref_command().unwrap();
    let ready = state.get_ready_command(&pending, 1).unwrap();
    assert_eq!(ready.cmd_type, CommandType::Precharge);

    state.update_timing_and_states(&ready, 1);
    let ready = state.get_ready_command(&pending, 2).unwrap();
    assert_eq!(ready.cmd_type, CommandType::Refresh);
}

// ══════════════════════════════════════════════════════════
// 4. Self-refresh and the bank FSM
// ══════════════════════════════════════════════════════════

#[test]
fn self_refresh_round_trip() {
    let mut state = state();
    let enter = Command::new(CommandType::SrefEnter, Address::rank_only(0), 0);
    let ready = state.get_ready_command(&enter, 0).unwrap();
    assert_eq!(ready.cmd_type, CommandType::SrefEnter);

    state.update_timing_and_states(&ready, 0);
    assert!(state.is_rank_self_refreshing(0));
    assert_eq!(state.bank_fsm(0, 0, 0), BankFsm::SelfRefresh);

    // Work for the rank first requires the exit.
    let ready = state.get_ready_command(&cmd(CommandType::Read, 1), 1).unwrap();
    assert_eq!(ready.cmd_type, CommandType::SrefExit);

    state.update_timing_and_states(&ready, 1);
    assert!(!state.is_rank_self_refreshing(0));
    assert_eq!(state.bank_fsm(0, 0, 0), BankFsm::Closed);
}

#[test]
fn row_hit_count_tracks_column_accesses() {
    let mut state = state();
    state.update_timing_and_states(&cmd(CommandType::Activate, 5), 0);
    assert_eq!(state.row_hit_count(0, 0, 0), 0);

    state.update_timing_and_states(&cmd(CommandType::Read, 5), 1);
    state.update_timing_and_states(&cmd(CommandType::Read, 5), 2);
    assert_eq!(state.row_hit_count(0, 0, 0), 2);

    // Re-activation starts a fresh row.
    state.update_timing_and_states(&cmd(CommandType::Precharge, 5), 3);
    state.update_timing_and_states(&cmd(CommandType::Activate, 7), 4);
    assert_eq!(state.row_hit_count(0, 0, 0), 0);
}

#[test]
fn all_bank_idle_tracks_open_rows() {
    let mut state = state();
    assert!(state.is_all_bank_idle_in_rank(0));
    state.update_timing_and_states(&cmd(CommandType::Activate, 5), 0);
    assert!(!state.is_all_bank_idle_in_rank(0));
    assert!(state.is_all_bank_idle_in_rank(1));
    state.update_timing_and_states(&cmd(CommandType::Precharge, 5), 1);
    assert!(state.is_all_bank_idle_in_rank(0));
}

// A borrowed view is exposed by the controller for power accounting.
#[test]
fn controller_exposes_the_tracker() {
    let ctrl = Controller::new(0, &functional_config());
    assert!(ctrl.channel_state().is_all_bank_idle_in_rank(0));
}
